#![doc = r#"
skyfuse: geometric raster engine and inference-serving pipeline for Sentinel-1 /
Sentinel-2 imagery.

The crate clips rasters to vector footprints while keeping their georeferencing,
evaluates a fixed catalog of spectral indices with range validation, and removes
clouds from 13-band optical scenes by fusing them with 2-band radar scenes through
a pluggable reconstruction model. The same capabilities are served as the
`parser`, `cropper` and `clouds` endpoints behind a KServe v2 style JSON envelope.

Requirements
------------
- GDAL development headers and runtime available on your system.
- Rust 2024 edition toolchain.

Clip a raster to a KML footprint
--------------------------------
```rust,no_run
use std::path::Path;

fn main() -> skyfuse::Result<()> {
    let out = skyfuse::clip_raster_file(
        Path::new("/data/T35UMB_stack.tif"),
        Path::new("/data/field.kml"),
        Path::new("/out/T35UMB_stack_crop.tif"),
    )?;
    println!("wrote {}", out.display());
    Ok(())
}
```

Index report
------------
```rust,no_run
use std::path::Path;
use skyfuse::{IndexReportOptions, compute_index_report};

fn main() -> skyfuse::Result<()> {
    let options = IndexReportOptions::new("/out/indices");
    for entry in compute_index_report(Path::new("/data/T35UMB_crop.tif"), &options)? {
        println!("{entry}");
    }
    Ok(())
}
```

In-memory engines
-----------------
```rust
use ndarray::Array3;
use skyfuse::{GeoTransform, IndexName, Raster, RasterDataType, Verdict};
use skyfuse::core::processing::indices::compute;

fn main() -> skyfuse::Result<()> {
    let bands = Array3::from_shape_fn((13, 2, 2), |(b, _, _)| 0.1 + b as f64 * 0.02);
    let raster = Raster::new(
        bands,
        GeoTransform::north_up(500_000.0, 4_200_000.0, 10.0, -10.0),
        "EPSG:32635",
        None,
        RasterDataType::F32,
    )?;
    let ndvi = compute(&raster, IndexName::Ndvi)?;
    assert_eq!(ndvi.verdict, Verdict::InRange);
    Ok(())
}
```

Serving
-------
```rust,no_run
use std::sync::Arc;
use skyfuse::{FusionCheckpointLoader, ServeConfig, ServingFront};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServeConfig {
        checkpoint: Some("/models/fusion.json".into()),
        ..ServeConfig::default()
    };
    // Fails with `CheckpointMissing` when the weights are absent.
    let front = Arc::new(ServingFront::from_config(&config, &FusionCheckpointLoader)?);
    skyfuse::serving::serve(front, config.listen.parse()?).await?;
    Ok(())
}
```

Error handling
--------------
All public functions return `skyfuse::Result<T>`. `Error::kind()` folds every error
into the serializable `ErrorKind` taxonomy used in response envelopes.

Useful modules
--------------
- [`api`]: high-level, file-to-file entry points.
- [`core`]: raster/geometry models and the processing engines.
- [`io`]: GDAL/OGR readers, GeoTIFF/JPEG writers, export and preprocessing adapters.
- [`serving`]: envelopes, lifecycle, endpoints, `ServingFront` and the HTTP router.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod serving;
pub mod types;

// Curated public API surface
// Types
pub use crate::core::geometry::Geometry;
pub use crate::core::params::{IndexReportOptions, ServeConfig};
pub use crate::core::raster::{GeoTransform, Raster};
pub use error::{Error, ErrorKind, Result};
pub use types::{IndexName, PipelineState, RasterDataType, SensorProfile, Verdict};

// Model capability
pub use crate::core::model::{
    FusionCheckpoint, FusionCheckpointLoader, LinearFusionModel, ModelLoader, ReconstructionModel,
};

// Engines
pub use crate::core::processing::{CloudRemovalPipeline, clip, normalize};

// Readers
pub use io::gdal::{GdalError, GdalMetadata, GdalRasterReader, read_raster};
pub use io::vector::read_geometry;

// Writers
pub use io::writers::{write_raster, write_raster_atomic};

// Serving
pub use serving::{InferRequest, InferResponse, ModelLifecycle, ServingFront};

// High-level API re-exports
pub use api::{
    IndexReportEntry, clip_raster_file, compute_index_report, export_scenes, preprocess_product,
    reconstruct_pair,
};
