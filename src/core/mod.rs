//! Core building blocks: band vocabulary mapping, calibration tables, the
//! raster value type, per-product configuration, processing stages and the
//! spectral index catalog. These are consumed by the high-level `api` module.
pub mod bands;
pub mod calibration;
pub mod index;
pub mod params;
pub mod processing;
pub mod product;
pub mod raster;
