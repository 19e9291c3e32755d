//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Carries the band/product/profile context needed to diagnose a failure without
//! re-running, and converts underlying I/O, GDAL and JSON errors.
//! Numeric edge cases (division by zero, invalid powers) are never errors: they
//! surface as NaN pixels.
use thiserror::Error;

use crate::types::{CanonicalBand, ProductType};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::GdalError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Band {band} is not available for {product_type} products")]
    BandUnavailable {
        band: CanonicalBand,
        product_type: ProductType,
    },

    #[error("Missing band inputs for index {index}: {}", join_bands(.missing))]
    MissingBandInputs {
        index: String,
        missing: Vec<CanonicalBand>,
    },

    #[error("Invalid calibration profile: {name}")]
    InvalidCalibrationProfile { name: String },

    #[error("Geocoding failure on grid `{grid}`: {reason}")]
    GeocodingFailure { grid: String, reason: String },

    #[error("Invalid tie-point grid: {0}")]
    InvalidTiePointGrid(String),

    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    #[error("Index {0} is registered twice")]
    DuplicateIndex(String),

    #[error("Index {index} reads band {band} which is not in its declared band list")]
    UndeclaredBand { index: String, band: CanonicalBand },

    #[error("Shape mismatch for {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: String,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("Unsupported product: {0}")]
    UnsupportedProduct(String),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Processing of {0} was cancelled")]
    Cancelled(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

impl Error {
    pub fn geocoding<E: std::fmt::Display>(grid: &str, e: E) -> Self {
        Error::GeocodingFailure {
            grid: grid.to_string(),
            reason: e.to_string(),
        }
    }
}

fn join_bands(bands: &[CanonicalBand]) -> String {
    bands
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
