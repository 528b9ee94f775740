mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use skyfuse::serving::{CLOUDS, CROPPER, build_router};
use skyfuse::{
    FusionCheckpointLoader, InferRequest, ModelLifecycle, PipelineState, ServeConfig,
    ServingFront, read_raster,
};
use tempfile::tempdir;
use tower::ServiceExt;

fn front_with(lifecycle: Arc<ModelLifecycle>) -> ServingFront {
    ServingFront::with_lifecycle(&ServeConfig::default(), None, lifecycle)
}

#[test]
fn clouds_rejects_until_model_is_loaded() {
    let dir = tempdir().unwrap();
    let optical = common::write(dir.path(), "opt.tif", &common::optical(3, 3));
    let sar = common::write(dir.path(), "sar.tif", &common::radar(3, 3));
    let request = InferRequest::with_payload(json!({
        "pairs": [{"optical": optical, "sar": sar}],
        "save_dir": dir.path().join("pred"),
    }));

    let lifecycle = Arc::new(ModelLifecycle::new());
    let front = front_with(lifecycle.clone());

    let resp = front.handle_request(CLOUDS, &request);
    assert_eq!(resp.id, "clouds-error");
    assert!(resp.error_message().unwrap().contains("NotLoaded"));

    lifecycle
        .load(&FusionCheckpointLoader, &common::identity_checkpoint(dir.path()))
        .unwrap();
    assert_eq!(front.state(CLOUDS), Some(PipelineState::Ready));

    let resp = front.handle_request(CLOUDS, &request);
    assert_eq!(resp.id, "clouds-ok");
    let paths = resp.output("prediction_paths").unwrap().as_strings();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].ends_with("opt_pred.tiff"));
    assert!(resp.output("pair_errors").is_none());

    let predicted = read_raster(paths[0]).unwrap();
    assert_eq!(predicted.band_count(), 13);
    assert_eq!(predicted.shape(), (3, 3));
    assert_eq!(predicted.crs(), common::CRS);
    // Identity weights return the normalized optical input.
    assert!((predicted.band(0)[[0, 0]] - 0.1).abs() < 1e-6);
}

#[test]
fn failing_pair_does_not_stop_the_batch() {
    let dir = tempdir().unwrap();
    let lifecycle = Arc::new(ModelLifecycle::new());
    lifecycle
        .load(&FusionCheckpointLoader, &common::identity_checkpoint(dir.path()))
        .unwrap();
    let front = front_with(lifecycle);

    let pairs: Vec<Value> = (0..3)
        .map(|i| {
            let optical = common::write(dir.path(), &format!("opt{}.tif", i), &common::optical(4, 4));
            // The second radar scene is on a different grid.
            let cols = if i == 1 { 5 } else { 4 };
            let sar = common::write(dir.path(), &format!("sar{}.tif", i), &common::radar(4, cols));
            json!({"optical": optical, "sar": sar})
        })
        .collect();
    let request = InferRequest::with_payload(json!({ "pairs": pairs }));

    let resp = front.handle_request(CLOUDS, &request);
    assert_eq!(resp.id, "clouds-ok");
    let paths = resp.output("prediction_paths").unwrap().as_strings();
    assert_eq!(paths.len(), 3);
    assert!(paths[0].ends_with("opt0_pred.tiff"));
    assert!(paths[1].starts_with("ERROR[PairedInputShapeMismatch]"));
    assert!(paths[2].ends_with("opt2_pred.tiff"));
    assert!(dir.path().join("opt0_pred.tiff").exists());
    assert!(!dir.path().join("opt1_pred.tiff").exists());

    let errors = &resp.output("pair_errors").unwrap().data;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["index"], 1);
    assert_eq!(errors[0]["kind"], "PairedInputShapeMismatch");
}

#[test]
fn cropper_endpoint_end_to_end() {
    let dir = tempdir().unwrap();
    let raster = common::write(dir.path(), "tile.tif", &common::optical(10, 10));
    let roi = common::footprint(dir.path(), 500_020.0, 4_199_930.0, 500_060.0, 4_199_970.0);
    let front = front_with(Arc::new(ModelLifecycle::new()));

    // Payload given as a JSON-encoded string, as form clients send it.
    let payload = json!({"raster": raster, "kml": roi}).to_string();
    let resp = front.handle_request(CROPPER, &InferRequest::with_payload(Value::String(payload)));
    assert_eq!(resp.id, "cropper-ok");
    let cropped = resp.output("cropped_tif").unwrap().as_strings();
    assert_eq!(cropped.len(), 1);
    assert_eq!(cropped[0], dir.path().join("tile_crop.tif").to_string_lossy());
    assert_eq!(read_raster(cropped[0]).unwrap().shape(), (4, 4));
}

#[test]
fn error_envelope_has_single_message_output() {
    let front = front_with(Arc::new(ModelLifecycle::new()));
    let resp = front.handle_request(
        CROPPER,
        &InferRequest::with_payload(json!({"raster": "/missing/tile.tif", "kml": "/missing/roi.kml"})),
    );
    assert_eq!(resp.model_name, "cropper");
    assert_eq!(resp.id, "cropper-error");
    assert_eq!(resp.outputs.len(), 1);
    assert_eq!(resp.outputs[0].name, "message");
    assert_eq!(resp.outputs[0].shape, vec![1]);
}

#[tokio::test]
async fn http_routes() {
    let front = Arc::new(front_with(Arc::new(ModelLifecycle::new())));
    let app = build_router(front);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v2/models/clouds/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v2/models/segmenter/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v2/models/cropper/infer")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["id"], "cropper-error");
    assert_eq!(envelope["model_name"], "cropper");
}
