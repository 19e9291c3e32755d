//! Output writers: GeoTIFF rasters and their metadata (embedded and sidecar).
pub mod metadata;
pub mod tiff;
