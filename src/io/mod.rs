//! I/O layer: GDAL-backed raster reading, the `gdalwarp` GCP warp adapter,
//! Sentinel-3 product directories, and `writers` for GeoTIFF outputs with
//! embedded metadata and JSON sidecars.
pub mod gdal;
pub use gdal::{GdalError, GdalMetadata, GdalRasterReader};

pub mod sentinel3;
pub use sentinel3::Sentinel3Product;

pub mod warp;
pub use warp::GdalWarper;

pub mod writers;
