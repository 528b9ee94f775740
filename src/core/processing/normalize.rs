//! Sensor-aware rescaling of raw band stacks into model input tensors.
//!
//! Each profile fixes its band count and one affine map per band:
//!
//! | profile | band | map |
//! |---------|------|-----|
//! | optical | B1..B12 (13) | `dn / 10000` |
//! | radar   | VV | `(db + 25) / 25` |
//! | radar   | VH | `(db + 32.5) / 32.5` |
//!
//! The map is applied as is. Values outside the nominal sensor domain land outside
//! the nominal output range and are not clamped.
use ndarray::{Array3, Axis, Zip};
use tracing::debug;

use crate::core::raster::Raster;
use crate::error::{Error, Result};
use crate::types::SensorProfile;

/// Reflectance scale of Sentinel-2 L1C digital numbers.
pub const OPTICAL_SCALE: f64 = 10_000.0;
/// dB shift/scale of Sentinel-1 VV backscatter.
pub const VV_OFFSET: f64 = 25.0;
/// dB shift/scale of Sentinel-1 VH backscatter.
pub const VH_OFFSET: f64 = 32.5;

/// Affine band map `(x + offset) * gain`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandMap {
    pub offset: f64,
    pub gain: f64,
}

impl BandMap {
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        (x + self.offset) * self.gain
    }
}

/// Per-band maps of a profile, in band order.
pub fn band_maps(profile: SensorProfile) -> Vec<BandMap> {
    match profile {
        SensorProfile::Optical => vec![
            BandMap {
                offset: 0.0,
                gain: 1.0 / OPTICAL_SCALE,
            };
            profile.band_count()
        ],
        SensorProfile::Radar => vec![
            BandMap {
                offset: VV_OFFSET,
                gain: 1.0 / VV_OFFSET,
            },
            BandMap {
                offset: VH_OFFSET,
                gain: 1.0 / VH_OFFSET,
            },
        ],
    }
}

/// Rescale `raster` into a (bands, rows, cols) `f32` tensor for `profile`.
pub fn normalize(raster: &Raster, profile: SensorProfile) -> Result<Array3<f32>> {
    let expected = profile.band_count();
    if raster.band_count() != expected {
        return Err(Error::SensorProfileMismatch {
            profile,
            expected,
            found: raster.band_count(),
        });
    }

    let maps = band_maps(profile);
    let (rows, cols) = raster.shape();
    let mut tensor = Array3::<f32>::zeros((expected, rows, cols));
    for (b, (mut out, map)) in tensor.axis_iter_mut(Axis(0)).zip(maps.iter()).enumerate() {
        Zip::from(&mut out)
            .and(&raster.band(b))
            .par_for_each(|o, &x| *o = map.apply(x) as f32);
    }
    debug!(%profile, bands = expected, rows, cols, "Normalized band stack");
    Ok(tensor)
}
