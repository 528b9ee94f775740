//! `ServingFront`: routes envelopes to endpoints and converts every failure into an
//! error envelope. Nothing an endpoint does escapes as an error or a panic.
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::core::model::ModelLoader;
use crate::core::params::ServeConfig;
use crate::error::{Error, Result};
use crate::io::export::{CommandExportService, ExportService};
use crate::serving::endpoints::{CloudsEndpoint, CropperEndpoint, Endpoint, ParserEndpoint};
use crate::serving::envelope::{InferRequest, InferResponse};
use crate::serving::lifecycle::ModelLifecycle;
use crate::types::PipelineState;

pub struct ServingFront {
    endpoints: BTreeMap<&'static str, Arc<dyn Endpoint>>,
}

impl ServingFront {
    pub fn new(endpoints: Vec<Arc<dyn Endpoint>>) -> Self {
        Self {
            endpoints: endpoints.into_iter().map(|e| (e.name(), e)).collect(),
        }
    }

    /// Standard endpoint set over an existing model lifecycle.
    pub fn with_lifecycle(
        config: &ServeConfig,
        export: Option<Arc<dyn ExportService>>,
        lifecycle: Arc<ModelLifecycle>,
    ) -> Self {
        Self::new(vec![
            Arc::new(ParserEndpoint::new(
                export,
                config.default_download_dir.clone(),
                config.default_scale,
            )),
            Arc::new(CropperEndpoint),
            Arc::new(CloudsEndpoint::new(lifecycle)),
        ])
    }

    /// Bring the service up from configuration.
    ///
    /// The model is loaded here; an unset or absent checkpoint is `CheckpointMissing`
    /// and any load failure aborts start-up.
    pub fn from_config(config: &ServeConfig, loader: &dyn ModelLoader) -> Result<Self> {
        let checkpoint = config
            .checkpoint
            .as_deref()
            .ok_or_else(|| Error::CheckpointMissing(PathBuf::new()))?;

        let export: Option<Arc<dyn ExportService>> = match &config.export_command {
            Some(cmd) => Some(Arc::new(CommandExportService::from_command(cmd)?)),
            None => {
                warn!("No export command configured; parser requests will fail");
                None
            }
        };

        let lifecycle = load_lifecycle(loader, checkpoint)?;
        Ok(Self::with_lifecycle(config, export, lifecycle))
    }

    pub fn endpoint_names(&self) -> Vec<&'static str> {
        self.endpoints.keys().copied().collect()
    }

    pub fn state(&self, endpoint: &str) -> Option<PipelineState> {
        self.endpoints.get(endpoint).map(|e| e.state())
    }

    /// Every endpoint is `Ready`.
    pub fn is_ready(&self) -> bool {
        self.endpoints
            .values()
            .all(|e| e.state() == PipelineState::Ready)
    }

    /// Handle a raw request body.
    pub fn handle(&self, endpoint: &str, body: &[u8]) -> InferResponse {
        match InferRequest::from_slice(body) {
            Ok(request) => self.handle_request(endpoint, &request),
            Err(e) => {
                warn!(endpoint, error = %e, "Rejected request body");
                InferResponse::error(endpoint, e.to_string())
            }
        }
    }

    pub fn handle_request(&self, endpoint: &str, request: &InferRequest) -> InferResponse {
        let request_id = request.id.as_deref().unwrap_or("-");
        let Some(target) = self.endpoints.get(endpoint) else {
            let e = Error::malformed(format!("unknown endpoint: {}", endpoint));
            warn!(endpoint, request_id, "Unknown endpoint");
            return InferResponse::error(endpoint, e.to_string());
        };

        let state = target.state();
        if state != PipelineState::Ready {
            let e = Error::ModelNotReady { state };
            warn!(endpoint, request_id, %state, "Endpoint not ready");
            return InferResponse::error(endpoint, e.to_string());
        }

        debug!(endpoint, request_id, "Dispatching request");
        match catch_unwind(AssertUnwindSafe(|| target.infer(request))) {
            Ok(Ok(outputs)) => {
                info!(endpoint, request_id, outputs = outputs.len(), "Request succeeded");
                InferResponse::ok(endpoint, outputs)
            }
            Ok(Err(e)) => {
                error!(endpoint, request_id, kind = %e.kind(), error = %e, "Request failed");
                InferResponse::error(endpoint, e.to_string())
            }
            Err(_) => {
                error!(endpoint, request_id, "Endpoint panicked");
                InferResponse::error(endpoint, "internal error while handling request")
            }
        }
    }
}

/// Load a model into a fresh lifecycle, for callers that manage start-up themselves.
pub fn load_lifecycle(loader: &dyn ModelLoader, checkpoint: &Path) -> Result<Arc<ModelLifecycle>> {
    let lifecycle = Arc::new(ModelLifecycle::new());
    lifecycle.load(loader, checkpoint)?;
    Ok(lifecycle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serving::endpoints::{CLOUDS, CROPPER, PARSER};
    use crate::serving::envelope::OutputTensor;
    use serde_json::json;

    struct Exploding;

    impl Endpoint for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }
        fn state(&self) -> PipelineState {
            PipelineState::Ready
        }
        fn infer(&self, _: &InferRequest) -> Result<Vec<OutputTensor>> {
            panic!("boom")
        }
    }

    fn front() -> ServingFront {
        ServingFront::with_lifecycle(
            &ServeConfig::default(),
            None,
            Arc::new(ModelLifecycle::new()),
        )
    }

    #[test]
    fn stateless_endpoints_start_ready() {
        let f = front();
        assert_eq!(f.endpoint_names(), vec![CLOUDS, CROPPER, PARSER]);
        assert_eq!(f.state(PARSER), Some(PipelineState::Ready));
        assert_eq!(f.state(CROPPER), Some(PipelineState::Ready));
        assert_eq!(f.state(CLOUDS), Some(PipelineState::NotLoaded));
        assert!(!f.is_ready());
    }

    #[test]
    fn not_ready_endpoint_returns_error_envelope() {
        let resp = front().handle(CLOUDS, br#"{"inputs":[{"name":"p","datatype":"BYTES","shape":[1],"data":[{"pairs":[]}]}]}"#);
        assert_eq!(resp.id, "clouds-error");
        assert!(resp.error_message().unwrap().contains("Model not ready"));
    }

    #[test]
    fn malformed_body_and_unknown_endpoint() {
        let f = front();
        let resp = f.handle(CROPPER, b"not json");
        assert_eq!(resp.id, "cropper-error");
        assert_eq!(resp.outputs.len(), 1);

        let resp = f.handle_request("segmenter", &InferRequest::with_payload(json!({})));
        assert_eq!(resp.id, "segmenter-error");
    }

    #[test]
    fn panics_become_error_envelopes() {
        let f = ServingFront::new(vec![Arc::new(Exploding)]);
        let resp = f.handle_request("exploding", &InferRequest::with_payload(json!({})));
        assert!(resp.is_error());
    }

    #[test]
    fn missing_checkpoint_aborts_startup() {
        let config = ServeConfig {
            checkpoint: Some("/no/such/fusion.json".into()),
            ..ServeConfig::default()
        };
        let err = ServingFront::from_config(&config, &crate::core::model::FusionCheckpointLoader)
            .err()
            .unwrap();
        assert!(matches!(err, Error::CheckpointMissing(_)));
    }

    #[test]
    fn unset_checkpoint_aborts_startup() {
        let err = ServingFront::from_config(
            &ServeConfig::default(),
            &crate::core::model::FusionCheckpointLoader,
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::CheckpointMissing(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::CheckpointMissing);
    }
}
