//! Raster engines: footprint clipping, spectral indices, sensor normalization,
//! the cloud-removal pipeline and heat-map colouring.
pub mod clip;
pub mod colormap;
pub mod indices;
pub mod normalize;
pub mod pipeline;

pub use clip::clip;
pub use indices::{IndexDefinition, IndexResult, compute};
pub use normalize::normalize;
pub use pipeline::{CloudRemovalPipeline, prediction_path};
