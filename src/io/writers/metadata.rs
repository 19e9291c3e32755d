use gdal::Dataset;
use gdal::Metadata;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::raster::RasterArray;
use crate::error::Result;
use crate::types::ProductType;

/// Provenance of one written layer (preprocessed band, cloud band or index)
#[derive(Debug, Clone)]
pub struct OutputInfo<'a> {
    pub product: &'a str,
    pub product_type: ProductType,
    pub datetime: Option<String>,
    pub layer: &'a str,
    pub calibration: &'a str,
}

/// Extract all metadata fields of a written layer into a HashMap
pub fn extract_metadata_fields(
    info: &OutputInfo<'_>,
    raster: &RasterArray,
) -> HashMap<String, String> {
    let mut metadata = HashMap::new();

    metadata.insert("NAME".to_string(), raster.name.clone());
    metadata.insert("PRODUCT".to_string(), info.product.to_string());
    metadata.insert("PRODUCT_TYPE".to_string(), info.product_type.to_string());
    metadata.insert("PLATFORM".to_string(), info.product_type.platform().to_string());
    metadata.insert("LAYER".to_string(), info.layer.to_string());
    metadata.insert("CALIBRATION".to_string(), info.calibration.to_string());
    if let Some(dt) = &info.datetime {
        metadata.insert("ACQUISITION_DATETIME".to_string(), dt.clone());
    }
    metadata.insert(
        "RESOLUTION".to_string(),
        raster.meta.resolution.0.abs().to_string(),
    );
    metadata.insert("VALID_PIXELS".to_string(), raster.valid_count().to_string());

    metadata
}

/// Convert metadata HashMap to JSON format
pub fn convert_metadata_to_json(
    metadata: &HashMap<String, String>,
) -> HashMap<String, serde_json::Value> {
    let mut json_metadata = HashMap::new();

    for (key, value) in metadata {
        let json_key = key.to_lowercase();

        // Numbers stay numbers, everything else is a string
        let json_value = value
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(value.clone()));
        json_metadata.insert(json_key, json_value);
    }

    json_metadata
}

/// Handle fields that need array conversion
pub fn add_spatial_json_fields(
    json_metadata: &mut HashMap<String, serde_json::Value>,
    raster: &RasterArray,
) {
    let geotransform: Vec<serde_json::Value> = raster
        .meta
        .geotransform
        .iter()
        .filter_map(|&v| serde_json::Number::from_f64(v).map(serde_json::Value::Number))
        .collect();
    json_metadata.insert(
        "geotransform".to_string(),
        serde_json::Value::Array(geotransform),
    );
    if let Some(crs) = &raster.meta.crs {
        json_metadata.insert("crs".to_string(), serde_json::Value::String(crs.clone()));
    }
    let (rows, cols) = raster.shape();
    json_metadata.insert("rows".to_string(), serde_json::Value::from(rows));
    json_metadata.insert("cols".to_string(), serde_json::Value::from(cols));
}

/// Embed metadata items into a GeoTIFF dataset (default domain)
pub fn embed_tiff_metadata(ds: &mut Dataset, fields: &HashMap<String, String>) -> Result<()> {
    for (key, value) in fields {
        ds.set_metadata_item(key, value, "")
            .map_err(crate::io::GdalError::from)?;
    }
    Ok(())
}

/// Write a `.json` sidecar next to `output`
pub fn create_metadata_sidecar(
    output: &Path,
    fields: &HashMap<String, String>,
    raster: &RasterArray,
) -> Result<PathBuf> {
    let sidecar_path = output.with_extension("json");
    let mut json_metadata = convert_metadata_to_json(fields);
    add_spatial_json_fields(&mut json_metadata, raster);
    let json_string = serde_json::to_string_pretty(&json_metadata)?;
    std::fs::write(&sidecar_path, json_string)?;
    info!("Metadata sidecar written to {:?}", sidecar_path);
    Ok(sidecar_path)
}
