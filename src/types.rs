//! Shared types and enums used across skyfuse.
//! Includes `SensorProfile`, `IndexName`, `Verdict`, `PipelineState` and the
//! on-disk sample type `RasterDataType`.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Band layout and normalization rule of a sensor product.
#[derive(Copy, Clone, PartialEq, Eq, Hash, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorProfile {
    /// Sentinel-2 L1C: 13 reflectance bands (B1..B12 incl. B8A), DN scaled by 10000.
    Optical,
    /// Sentinel-1 GRD: VV and VH backscatter in dB.
    Radar,
}

impl SensorProfile {
    pub fn band_count(&self) -> usize {
        match self {
            SensorProfile::Optical => 13,
            SensorProfile::Radar => 2,
        }
    }
}

impl std::fmt::Display for SensorProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorProfile::Optical => write!(f, "optical"),
            SensorProfile::Radar => write!(f, "radar"),
        }
    }
}

/// Names of the spectral index catalog.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
pub enum IndexName {
    Ndwi,
    Ndmi,
    Ndvi,
    Sr,
    Rep,
    Evi,
    Evi2,
    Arvi,
    Savi,
    Gosavi,
    Gari,
    Vari,
}

impl IndexName {
    /// Catalog order, as reported by index runs.
    pub const ALL: [IndexName; 12] = [
        IndexName::Ndwi,
        IndexName::Ndmi,
        IndexName::Ndvi,
        IndexName::Sr,
        IndexName::Rep,
        IndexName::Evi,
        IndexName::Evi2,
        IndexName::Arvi,
        IndexName::Savi,
        IndexName::Gosavi,
        IndexName::Gari,
        IndexName::Vari,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexName::Ndwi => "NDWI",
            IndexName::Ndmi => "NDMI",
            IndexName::Ndvi => "NDVI",
            IndexName::Sr => "SR",
            IndexName::Rep => "REP",
            IndexName::Evi => "EVI",
            IndexName::Evi2 => "EVI2",
            IndexName::Arvi => "ARVI",
            IndexName::Savi => "SAVI",
            IndexName::Gosavi => "GOSAVI",
            IndexName::Gari => "GARI",
            IndexName::Vari => "VARI",
        }
    }
}

impl std::fmt::Display for IndexName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IndexName {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndexName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str().eq_ignore_ascii_case(s))
            .ok_or(crate::Error::InvalidArgument {
                arg: "index",
                value: s.to_string(),
            })
    }
}

/// Outcome of comparing an index array against its expected range.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Verdict {
    InRange,
    OutOfRange,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::InRange => write!(f, "OK"),
            Verdict::OutOfRange => write!(f, "OUT OF RANGE"),
        }
    }
}

/// Readiness of a serving endpoint. Transitions only move forward.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum PipelineState {
    NotLoaded,
    Loading,
    Ready,
    Failed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::NotLoaded => write!(f, "NotLoaded"),
            PipelineState::Loading => write!(f, "Loading"),
            PipelineState::Ready => write!(f, "Ready"),
            PipelineState::Failed => write!(f, "Failed"),
        }
    }
}

/// Sample type a raster is stored with on disk.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum RasterDataType {
    U8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl std::fmt::Display for RasterDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RasterDataType::U8 => "UInt8",
            RasterDataType::U16 => "UInt16",
            RasterDataType::I16 => "Int16",
            RasterDataType::U32 => "UInt32",
            RasterDataType::I32 => "Int32",
            RasterDataType::F32 => "Float32",
            RasterDataType::F64 => "Float64",
        };
        write!(f, "{}", s)
    }
}
