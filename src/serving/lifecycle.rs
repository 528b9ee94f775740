//! Readiness of the cloud-removal endpoint and ownership of its loaded model.
//!
//! `NotLoaded -> Loading -> Ready | Failed`. Ready and Failed are terminal for the
//! life of the process; the pipeline is set exactly once, on the move to Ready.
use std::path::Path;
use std::sync::{OnceLock, RwLock};

use tracing::{error, info};

use crate::core::model::ModelLoader;
use crate::core::processing::pipeline::CloudRemovalPipeline;
use crate::error::{Error, Result};
use crate::types::PipelineState;

#[derive(Debug)]
pub struct ModelLifecycle {
    state: RwLock<PipelineState>,
    pipeline: OnceLock<CloudRemovalPipeline>,
}

impl Default for ModelLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

fn allowed(from: PipelineState, to: PipelineState) -> bool {
    matches!(
        (from, to),
        (PipelineState::NotLoaded, PipelineState::Loading)
            | (PipelineState::Loading, PipelineState::Ready)
            | (PipelineState::Loading, PipelineState::Failed)
    )
}

impl ModelLifecycle {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(PipelineState::NotLoaded),
            pipeline: OnceLock::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    fn advance(&self, to: PipelineState) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(|p| p.into_inner());
        if !allowed(*state, to) {
            return Err(Error::Processing(format!(
                "illegal lifecycle transition {} -> {}",
                *state, to
            )));
        }
        *state = to;
        Ok(())
    }

    /// Enter `Loading`. Fails unless the lifecycle is still `NotLoaded`.
    pub fn begin_loading(&self) -> Result<()> {
        self.advance(PipelineState::Loading)
    }

    /// Install the pipeline and enter `Ready`.
    pub fn finish_loading(&self, pipeline: CloudRemovalPipeline) -> Result<()> {
        if self.state() != PipelineState::Loading {
            return Err(Error::Processing(format!(
                "cannot finish loading from {}",
                self.state()
            )));
        }
        self.pipeline
            .set(pipeline)
            .map_err(|_| Error::Processing("model already installed".to_string()))?;
        self.advance(PipelineState::Ready)
    }

    /// Enter `Failed`.
    pub fn fail_loading(&self) -> Result<()> {
        self.advance(PipelineState::Failed)
    }

    /// Run the whole startup sequence against `checkpoint`.
    ///
    /// A missing checkpoint or a loader error leaves the lifecycle `Failed` and is returned.
    pub fn load(&self, loader: &dyn ModelLoader, checkpoint: &Path) -> Result<()> {
        self.begin_loading()?;
        let loaded = if checkpoint.exists() {
            loader.load(checkpoint)
        } else {
            Err(Error::CheckpointMissing(checkpoint.to_path_buf()))
        };
        match loaded {
            Ok(model) => {
                let pipeline = CloudRemovalPipeline::new(model);
                info!(checkpoint = %checkpoint.display(), model = pipeline.model_name(), "Model ready");
                self.finish_loading(pipeline)
            }
            Err(e) => {
                error!(checkpoint = %checkpoint.display(), error = %e, "Model load failed");
                self.fail_loading()?;
                Err(e)
            }
        }
    }

    /// The loaded pipeline, or `ModelNotReady` with the current state.
    pub fn pipeline(&self) -> Result<&CloudRemovalPipeline> {
        match (self.state(), self.pipeline.get()) {
            (PipelineState::Ready, Some(p)) => Ok(p),
            (state, _) => Err(Error::ModelNotReady { state }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{LinearFusionModel, ReconstructionModel};
    use std::path::PathBuf;
    use std::sync::Arc;

    struct StubLoader;

    impl ModelLoader for StubLoader {
        fn load(&self, _: &Path) -> Result<Arc<dyn ReconstructionModel>> {
            Ok(Arc::new(LinearFusionModel::identity()))
        }
    }

    struct BrokenLoader;

    impl ModelLoader for BrokenLoader {
        fn load(&self, _: &Path) -> Result<Arc<dyn ReconstructionModel>> {
            Err(Error::Processing("corrupt weights".to_string()))
        }
    }

    fn existing_file() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt.json");
        std::fs::write(&path, b"{}").unwrap();
        (dir, path)
    }

    #[test]
    fn not_ready_until_loaded() {
        let lc = ModelLifecycle::new();
        assert!(matches!(
            lc.pipeline(),
            Err(Error::ModelNotReady {
                state: PipelineState::NotLoaded
            })
        ));
        lc.begin_loading().unwrap();
        assert!(matches!(
            lc.pipeline(),
            Err(Error::ModelNotReady {
                state: PipelineState::Loading
            })
        ));
    }

    #[test]
    fn successful_load_is_ready_and_terminal() {
        let (_dir, ckpt) = existing_file();
        let lc = ModelLifecycle::new();
        lc.load(&StubLoader, &ckpt).unwrap();
        assert_eq!(lc.state(), PipelineState::Ready);
        assert!(lc.pipeline().is_ok());

        assert!(lc.load(&StubLoader, &ckpt).is_err());
        assert!(lc.fail_loading().is_err());
        assert_eq!(lc.state(), PipelineState::Ready);
    }

    #[test]
    fn missing_checkpoint_fails_permanently() {
        let lc = ModelLifecycle::new();
        let err = lc.load(&StubLoader, Path::new("/no/such/ckpt.json")).unwrap_err();
        assert!(matches!(err, Error::CheckpointMissing(_)));
        assert_eq!(lc.state(), PipelineState::Failed);

        let (_dir, ckpt) = existing_file();
        assert!(lc.load(&StubLoader, &ckpt).is_err());
        assert!(matches!(
            lc.pipeline(),
            Err(Error::ModelNotReady {
                state: PipelineState::Failed
            })
        ));
    }

    #[test]
    fn loader_error_fails() {
        let (_dir, ckpt) = existing_file();
        let lc = ModelLifecycle::new();
        assert!(lc.load(&BrokenLoader, &ckpt).is_err());
        assert_eq!(lc.state(), PipelineState::Failed);
    }
}
