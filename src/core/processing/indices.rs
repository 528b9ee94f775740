//! Spectral index catalog and evaluation over a 13-band Sentinel-2 stack.
//!
//! Each catalog entry is data: a formula variant carrying the band positions it
//! reads and the closed range its values are expected to fall in. The range is
//! only used for the verdict; values are never clamped.
//!
//! Every division adds `EPSILON` (1e-8) to its denominator. This biases results
//! whose denominator is close to zero (a zero denominator yields `numerator / 1e-8`
//! instead of a division fault), so it is part of each formula's definition.
//!
//! Pixels equal to the raster nodata value (or NaN) are read as missing and stay
//! missing through the whole formula; they never take part in min/max statistics.
use ndarray::{Array2, Zip};
use tracing::debug;

use crate::core::raster::{GeoTransform, Raster};
use crate::error::{Error, Result};
use crate::types::{IndexName, RasterDataType, Verdict};

/// Denominator guard added to every division.
pub const EPSILON: f64 = 1e-8;

/// Zero-based positions of the Sentinel-2 L1C bands in a 13-band stack.
pub mod band {
    pub const COASTAL: usize = 0;
    pub const BLUE: usize = 1;
    pub const GREEN: usize = 2;
    pub const RED: usize = 3;
    pub const RED_EDGE_1: usize = 4;
    pub const RED_EDGE_2: usize = 5;
    pub const RED_EDGE_3: usize = 6;
    pub const NIR: usize = 7;
    pub const NIR_NARROW: usize = 8;
    pub const WATER_VAPOUR: usize = 9;
    pub const CIRRUS: usize = 10;
    pub const SWIR_1: usize = 11;
    pub const SWIR_2: usize = 12;
}

/// Closed set of formula shapes used by the catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Formula {
    /// `gain * (pos - neg) / (pos + neg + offset + ε)`
    NormalizedDifference {
        pos: usize,
        neg: usize,
        gain: f64,
        offset: f64,
    },
    /// `num / (den + ε)`
    SimpleRatio { num: usize, den: usize },
    /// `700 + 40 * (((edge3 + red) / 2 - edge1) / ((edge2 - edge1) + ε))`
    RedEdgePosition {
        red: usize,
        edge1: usize,
        edge2: usize,
        edge3: usize,
    },
    /// `2.5 * (nir - red) / (nir + 6 red - 7.5 blue + 1 + ε)`
    Enhanced { nir: usize, red: usize, blue: usize },
    /// `rb = 2 red - blue; (nir - rb) / (nir + rb + ε)`
    AtmosphericallyResistant { nir: usize, red: usize, blue: usize },
    /// `g = green - (blue - red); (nir - g) / (nir + g + ε)`
    GreenAtmosphericallyResistant {
        nir: usize,
        green: usize,
        blue: usize,
        red: usize,
    },
    /// `(green - red) / (green + red - blue + ε)`
    VisibleAtmosphericallyResistant { green: usize, red: usize, blue: usize },
}

impl Formula {
    /// Band positions read by the formula.
    pub fn bands(&self) -> Vec<usize> {
        match *self {
            Formula::NormalizedDifference { pos, neg, .. } => vec![pos, neg],
            Formula::SimpleRatio { num, den } => vec![num, den],
            Formula::RedEdgePosition {
                red,
                edge1,
                edge2,
                edge3,
            } => vec![red, edge1, edge2, edge3],
            Formula::Enhanced { nir, red, blue } => vec![nir, red, blue],
            Formula::AtmosphericallyResistant { nir, red, blue } => vec![nir, red, blue],
            Formula::GreenAtmosphericallyResistant {
                nir,
                green,
                blue,
                red,
            } => vec![nir, green, blue, red],
            Formula::VisibleAtmosphericallyResistant { green, red, blue } => {
                vec![green, red, blue]
            }
        }
    }

    /// Minimum band count of a stack this formula can run on.
    pub fn required_bands(&self) -> usize {
        self.bands().into_iter().max().map_or(0, |b| b + 1)
    }

    /// Evaluate for one pixel; `sample(b)` is `None` when band `b` is missing there.
    pub fn evaluate(&self, sample: impl Fn(usize) -> Option<f64>) -> Option<f64> {
        let value = match *self {
            Formula::NormalizedDifference {
                pos,
                neg,
                gain,
                offset,
            } => {
                let (p, n) = (sample(pos)?, sample(neg)?);
                gain * (p - n) / (p + n + offset + EPSILON)
            }
            Formula::SimpleRatio { num, den } => sample(num)? / (sample(den)? + EPSILON),
            Formula::RedEdgePosition {
                red,
                edge1,
                edge2,
                edge3,
            } => {
                let (r, e1, e2, e3) = (sample(red)?, sample(edge1)?, sample(edge2)?, sample(edge3)?);
                let num = (e3 + r) / 2.0 - e1;
                let den = (e2 - e1) + EPSILON;
                700.0 + 40.0 * (num / den)
            }
            Formula::Enhanced { nir, red, blue } => {
                let (n, r, b) = (sample(nir)?, sample(red)?, sample(blue)?);
                2.5 * (n - r) / (n + 6.0 * r - 7.5 * b + 1.0 + EPSILON)
            }
            Formula::AtmosphericallyResistant { nir, red, blue } => {
                let (n, r, b) = (sample(nir)?, sample(red)?, sample(blue)?);
                let rb = 2.0 * r - b;
                (n - rb) / (n + rb + EPSILON)
            }
            Formula::GreenAtmosphericallyResistant {
                nir,
                green,
                blue,
                red,
            } => {
                let (n, g, b, r) = (sample(nir)?, sample(green)?, sample(blue)?, sample(red)?);
                let adjusted = g - (b - r);
                (n - adjusted) / (n + adjusted + EPSILON)
            }
            Formula::VisibleAtmosphericallyResistant { green, red, blue } => {
                let (g, r, b) = (sample(green)?, sample(red)?, sample(blue)?);
                (g - r) / (g + r - b + EPSILON)
            }
        };
        Some(value)
    }
}

/// A catalog entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexDefinition {
    pub name: IndexName,
    pub formula: Formula,
    /// Expected closed range `[low, high]`.
    pub range: (f64, f64),
}

const fn nd(pos: usize, neg: usize, gain: f64, offset: f64) -> Formula {
    Formula::NormalizedDifference {
        pos,
        neg,
        gain,
        offset,
    }
}

static CATALOG: [IndexDefinition; 12] = [
    IndexDefinition {
        name: IndexName::Ndwi,
        formula: nd(band::GREEN, band::NIR, 1.0, 0.0),
        range: (-1.0, 1.0),
    },
    IndexDefinition {
        name: IndexName::Ndmi,
        formula: nd(band::NIR, band::SWIR_1, 1.0, 0.0),
        range: (-1.0, 1.0),
    },
    IndexDefinition {
        name: IndexName::Ndvi,
        formula: nd(band::NIR, band::RED, 1.0, 0.0),
        range: (-1.0, 1.0),
    },
    IndexDefinition {
        name: IndexName::Sr,
        formula: Formula::SimpleRatio {
            num: band::NIR,
            den: band::RED,
        },
        range: (0.0, 10.0),
    },
    IndexDefinition {
        name: IndexName::Rep,
        formula: Formula::RedEdgePosition {
            red: band::RED,
            edge1: band::RED_EDGE_1,
            edge2: band::RED_EDGE_2,
            edge3: band::RED_EDGE_3,
        },
        range: (680.0, 750.0),
    },
    IndexDefinition {
        name: IndexName::Evi,
        formula: Formula::Enhanced {
            nir: band::NIR,
            red: band::RED,
            blue: band::BLUE,
        },
        range: (-1.0, 3.0),
    },
    IndexDefinition {
        name: IndexName::Evi2,
        formula: nd(band::NIR, band::RED, 2.5, 1.0),
        range: (-1.0, 3.0),
    },
    IndexDefinition {
        name: IndexName::Arvi,
        formula: Formula::AtmosphericallyResistant {
            nir: band::NIR,
            red: band::RED,
            blue: band::BLUE,
        },
        range: (-2.0, 2.0),
    },
    IndexDefinition {
        name: IndexName::Savi,
        formula: nd(band::NIR, band::RED, 1.5, 0.5),
        range: (-1.0, 1.0),
    },
    IndexDefinition {
        name: IndexName::Gosavi,
        formula: nd(band::NIR, band::GREEN, 1.0, 0.16),
        range: (-1.0, 1.0),
    },
    IndexDefinition {
        name: IndexName::Gari,
        formula: Formula::GreenAtmosphericallyResistant {
            nir: band::NIR,
            green: band::GREEN,
            blue: band::BLUE,
            red: band::RED,
        },
        range: (-2.0, 2.0),
    },
    IndexDefinition {
        name: IndexName::Vari,
        formula: Formula::VisibleAtmosphericallyResistant {
            green: band::GREEN,
            red: band::RED,
            blue: band::BLUE,
        },
        range: (-2.0, 2.0),
    },
];

/// The full catalog, in report order.
pub fn catalog() -> &'static [IndexDefinition] {
    &CATALOG
}

/// `CATALOG` is laid out in `IndexName` declaration order.
pub fn definition(name: IndexName) -> &'static IndexDefinition {
    &CATALOG[name as usize]
}

/// Index values plus their validation outcome.
#[derive(Debug, Clone)]
pub struct IndexResult {
    pub name: IndexName,
    /// Per-pixel values, `None` where any input band was missing.
    pub values: Array2<Option<f64>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub range: (f64, f64),
    pub verdict: Verdict,
}

impl IndexResult {
    /// Single-band Float32 raster on the source grid, missing pixels as NaN nodata.
    pub fn to_raster(&self, transform: GeoTransform, crs: &str) -> Result<Raster> {
        let band = self.values.mapv(|v| v.unwrap_or(f64::NAN));
        Raster::from_bands(
            vec![band],
            transform,
            crs,
            Some(f64::NAN),
            RasterDataType::F32,
        )
    }
}

/// Evaluate one catalog index over `raster`.
pub fn compute(raster: &Raster, name: IndexName) -> Result<IndexResult> {
    let def = definition(name);
    let required = def.formula.required_bands();
    if raster.band_count() < required {
        return Err(Error::BandIndexOutOfRange {
            name: name.to_string(),
            index: required - 1,
            required,
            available: raster.band_count(),
        });
    }

    let bands = raster.bands();
    let mut values = Array2::<Option<f64>>::from_elem(raster.shape(), None);
    Zip::indexed(&mut values).par_for_each(|(r, c), out| {
        *out = def.formula.evaluate(|b| {
            let v = bands[[b, r, c]];
            if raster.is_nodata(v) { None } else { Some(v) }
        });
    });

    let (min, max) = value_range(&values);
    let verdict = match (min, max) {
        (Some(lo), Some(hi)) if lo >= def.range.0 && hi <= def.range.1 => Verdict::InRange,
        _ => Verdict::OutOfRange,
    };
    debug!(index = %name, ?min, ?max, %verdict, "Index computed");

    Ok(IndexResult {
        name,
        values,
        min,
        max,
        range: def.range,
        verdict,
    })
}

fn value_range(values: &Array2<Option<f64>>) -> (Option<f64>, Option<f64>) {
    values.iter().flatten().fold((None, None), |(lo, hi), &v| {
        (
            Some(lo.map_or(v, |l: f64| l.min(v))),
            Some(hi.map_or(v, |h: f64| h.max(v))),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    /// 13-band 2x2 stack where band b holds `values[b]` everywhere.
    fn stack(values: [f64; 13], nodata: Option<f64>) -> Raster {
        let data = Array3::from_shape_fn((13, 2, 2), |(b, _, _)| values[b]);
        Raster::new(
            data,
            GeoTransform::default(),
            "EPSG:32633",
            nodata,
            RasterDataType::U16,
        )
        .unwrap()
    }

    const BANDS: [f64; 13] = [
        0.05, 0.08, 0.10, 0.12, 0.18, 0.25, 0.30, 0.40, 0.42, 0.02, 0.01, 0.22, 0.15,
    ];

    fn value_of(raster: &Raster, name: IndexName) -> f64 {
        compute(raster, name).unwrap().values[[0, 0]].unwrap()
    }

    #[test]
    fn catalog_matches_formulas() {
        let r = stack(BANDS, None);
        let b = BANDS;
        let e = EPSILON;
        let expected = [
            (IndexName::Ndwi, (b[2] - b[7]) / (b[2] + b[7] + e)),
            (IndexName::Ndmi, (b[7] - b[11]) / (b[7] + b[11] + e)),
            (IndexName::Ndvi, (b[7] - b[3]) / (b[7] + b[3] + e)),
            (IndexName::Sr, b[7] / (b[3] + e)),
            (
                IndexName::Rep,
                700.0 + 40.0 * (((b[6] + b[3]) / 2.0 - b[4]) / ((b[5] - b[4]) + e)),
            ),
            (
                IndexName::Evi,
                2.5 * (b[7] - b[3]) / (b[7] + 6.0 * b[3] - 7.5 * b[1] + 1.0 + e),
            ),
            (IndexName::Evi2, 2.5 * (b[7] - b[3]) / (b[7] + b[3] + 1.0 + e)),
            (
                IndexName::Arvi,
                (b[7] - (2.0 * b[3] - b[1])) / (b[7] + (2.0 * b[3] - b[1]) + e),
            ),
            (IndexName::Savi, 1.5 * (b[7] - b[3]) / (b[7] + b[3] + 0.5 + e)),
            (IndexName::Gosavi, (b[7] - b[2]) / (b[7] + b[2] + 0.16 + e)),
            (
                IndexName::Gari,
                (b[7] - (b[2] - (b[1] - b[3]))) / (b[7] + (b[2] - (b[1] - b[3])) + e),
            ),
            (IndexName::Vari, (b[2] - b[3]) / (b[2] + b[3] - b[1] + e)),
        ];
        for (name, want) in expected {
            assert_relative_eq!(value_of(&r, name), want, max_relative = 1e-12);
        }
    }

    #[test]
    fn equal_bands_give_zero_normalized_difference() {
        let mut values = BANDS;
        values[band::NIR] = 0.3;
        values[band::RED] = 0.3;
        let r = stack(values, None);
        assert_eq!(value_of(&r, IndexName::Ndvi), 0.0);
        assert_eq!(value_of(&r, IndexName::Savi), 0.0);
    }

    #[test]
    fn zero_denominator_is_finite() {
        let mut values = BANDS;
        values[band::NIR] = 0.0;
        values[band::RED] = 0.0;
        let r = stack(values, None);
        let ndvi = value_of(&r, IndexName::Ndvi);
        assert!(ndvi.is_finite());
        assert_eq!(ndvi, 0.0);

        let mut values = BANDS;
        values[band::RED] = 0.0;
        let sr = value_of(&stack(values, None), IndexName::Sr);
        assert!(sr.is_finite());
        assert_relative_eq!(sr, BANDS[band::NIR] / EPSILON);
    }

    #[test]
    fn out_of_range_is_flagged_not_clamped() {
        let mut values = BANDS;
        values[band::NIR] = 100.0;
        values[band::RED] = 1.0;
        let result = compute(&stack(values, None), IndexName::Sr).unwrap();
        assert_eq!(result.verdict, Verdict::OutOfRange);
        assert_relative_eq!(result.values[[1, 1]].unwrap(), 100.0 / (1.0 + EPSILON));
        assert_relative_eq!(result.max.unwrap(), 100.0 / (1.0 + EPSILON));

        let ndvi = compute(&stack(BANDS, None), IndexName::Ndvi).unwrap();
        assert_eq!(ndvi.verdict, Verdict::InRange);
    }

    #[test]
    fn nodata_propagates_as_missing() {
        let mut data = Array3::from_shape_fn((13, 2, 2), |(b, _, _)| BANDS[b]);
        data[[band::RED, 0, 1]] = -9999.0;
        let r = Raster::new(
            data,
            GeoTransform::default(),
            "",
            Some(-9999.0),
            RasterDataType::I16,
        )
        .unwrap();

        let ndvi = compute(&r, IndexName::Ndvi).unwrap();
        assert_eq!(ndvi.values[[0, 1]], None);
        assert!(ndvi.values[[0, 0]].is_some());
        // NDWI does not read the red band.
        assert!(compute(&r, IndexName::Ndwi).unwrap().values[[0, 1]].is_some());
    }

    #[test]
    fn all_missing_is_out_of_range() {
        let r = stack([7.0; 13], Some(7.0));
        let result = compute(&r, IndexName::Ndvi).unwrap();
        assert_eq!(result.min, None);
        assert_eq!(result.verdict, Verdict::OutOfRange);
    }

    #[test]
    fn short_stack_is_rejected() {
        let data = Array3::<f64>::zeros((8, 2, 2));
        let r = Raster::new(
            data,
            GeoTransform::default(),
            "",
            None,
            RasterDataType::F32,
        )
        .unwrap();
        assert!(compute(&r, IndexName::Ndvi).is_ok());
        match compute(&r, IndexName::Ndmi) {
            Err(Error::BandIndexOutOfRange {
                required,
                available,
                ..
            }) => {
                assert_eq!(required, 12);
                assert_eq!(available, 8);
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.verdict)),
        }
    }

    #[test]
    fn required_bands_follow_the_catalog() {
        for (def, name) in catalog().iter().zip(IndexName::ALL) {
            assert_eq!(def.name, name);
            assert_eq!(definition(name).name, name);
        }
        assert_eq!(definition(IndexName::Rep).formula.required_bands(), 7);
        assert_eq!(definition(IndexName::Ndmi).formula.required_bands(), 12);
        assert_eq!(catalog().len(), IndexName::ALL.len());
    }
}
