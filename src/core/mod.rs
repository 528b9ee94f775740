//! Core building blocks: the raster and geometry models, the opaque model
//! capability, service parameters and the processing engines. These are consumed
//! by the high-level `api` module and the serving front.
pub mod geometry;
pub mod model;
pub mod params;
pub mod processing;
pub mod raster;
