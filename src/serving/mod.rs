//! Serving layer: wire envelopes, the model lifecycle, the `parser`/`cropper`/`clouds`
//! endpoints, the in-process `ServingFront` and its HTTP surface.
pub mod endpoints;
pub mod envelope;
pub mod front;
pub mod lifecycle;
pub mod server;

pub use endpoints::{CLOUDS, CROPPER, Endpoint, PARSER};
pub use envelope::{InferRequest, InferResponse, OutputTensor};
pub use front::ServingFront;
pub use lifecycle::ModelLifecycle;
pub use server::{build_router, serve};
