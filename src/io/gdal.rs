use gdal::raster::ResampleAlg;
use gdal::{Dataset, Metadata, errors::GdalError as GdalCrateError};
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::core::raster::{RasterArray, SpatialMeta};
use crate::types::Resampling;

/// Errors encountered when using the GDAL reader, writer or warp tool
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
    #[error("gdalwarp failed: {0}")]
    Warp(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Metadata extracted from a GDAL-supported dataset
#[derive(Debug, Clone)]
pub struct GdalMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    /// Affine geotransform coefficients
    /// ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection as `EPSG:xxxx` when an authority is found, WKT otherwise.
    /// Empty when ungeoreferenced.
    pub projection: String,
    /// Additional metadata key-value pairs
    pub metadata: HashMap<String, String>,
}

/// Reader for GeoTIFFs and NetCDF variables via GDAL
pub struct GdalRasterReader {
    pub dataset: Dataset,
    pub metadata: GdalMetadata,
}

// Helper to extract EPSG code from WKT authority tag
pub(crate) fn parse_epsg(wkt: &str) -> Option<String> {
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    if let Some(idx) = wkt.rfind(KEY) {
        let start = idx + KEY.len();
        if let Some(end) = wkt[start..].find('"') {
            let code = &wkt[start..start + end];
            return Some(format!("EPSG:{}", code));
        }
    }
    None
}

/// GDAL connection string of a NetCDF variable
pub fn netcdf_subdataset(path: &Path, variable: &str) -> String {
    format!("NETCDF:\"{}\":{}", path.display(), variable)
}

pub(crate) fn resample_alg(resampling: Resampling) -> ResampleAlg {
    match resampling {
        Resampling::Nearest => ResampleAlg::NearestNeighbour,
        Resampling::Bilinear => ResampleAlg::Bilinear,
        Resampling::Cubic => ResampleAlg::Cubic,
    }
}

impl GdalRasterReader {
    /// Open a GDAL-supported dataset (GeoTIFF, NetCDF subdataset string, VRT)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        Self::from_dataset(dataset)
    }

    fn from_dataset(dataset: Dataset) -> Result<Self, GdalError> {
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        let geotransform = match dataset.geo_transform() {
            Ok(gt) => gt,
            Err(_) => [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        let proj = dataset.projection();
        let projection = if proj.starts_with("EPSG:") {
            proj
        } else if let Some(code) = parse_epsg(&proj) {
            code
        } else {
            proj
        };
        let mut metadata_map = HashMap::new();
        if let Some(entries) = dataset.metadata_domain("") {
            for entry in entries {
                if let Some((key, val)) = entry.split_once('=') {
                    metadata_map.insert(key.to_string(), val.to_string());
                }
            }
        }
        Ok(GdalRasterReader {
            dataset,
            metadata: GdalMetadata {
                size_x: size_x as usize,
                size_y: size_y as usize,
                bands,
                geotransform,
                projection,
                metadata: metadata_map,
            },
        })
    }

    /// Open one variable of a NetCDF file
    pub fn open_netcdf(path: &Path, variable: &str) -> Result<Self, GdalError> {
        let dataset = Dataset::open(netcdf_subdataset(path, variable))?;
        Self::from_dataset(dataset)
    }

    /// Read a single band (1-based index) as f64 of shape (height, width),
    /// resampled to `shape` (width, height) when given. Scale and offset are
    /// applied; no-data pixels become NaN.
    pub fn read_band(
        &self,
        index: usize,
        shape: Option<(usize, usize)>,
        resampling: Resampling,
    ) -> Result<Array2<f64>, GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        let band = self.dataset.rasterband(index)?;
        let window = (self.metadata.size_x, self.metadata.size_y);
        let (out_x, out_y) = shape.unwrap_or(window);
        let alg = Some(resample_alg(resampling));
        let buf = band.read_as::<f64>((0, 0), window, (out_x, out_y), alg)?;
        let data_vec = buf.data().to_vec();
        let got = data_vec.len();
        let mut array = Array2::from_shape_vec((out_y, out_x), data_vec).map_err(|_| {
            GdalError::DimensionMismatch(out_x, out_y, got, 1)
        })?;

        let nodata = band.no_data_value();
        let scale = band.scale().unwrap_or(1.0);
        let offset = band.offset().unwrap_or(0.0);
        array.mapv_inplace(|v| {
            if nodata.is_some_and(|nd| v == nd) {
                f64::NAN
            } else {
                v * scale + offset
            }
        });
        Ok(array)
    }

    /// Read band 1 into a named raster with its spatial metadata
    pub fn read_raster(&self, name: &str) -> Result<RasterArray, GdalError> {
        let band = self.dataset.rasterband(1)?;
        let nodata = band.no_data_value();
        let data = self.read_band(1, None, Resampling::Nearest)?;
        let gt = self.metadata.geotransform;
        let crs = (!self.metadata.projection.is_empty()).then(|| self.metadata.projection.clone());
        let meta = SpatialMeta {
            resolution: (gt[1], gt[5]),
            crs,
            geotransform: gt,
            nodata,
        };
        let name = self
            .metadata
            .metadata
            .get("NAME")
            .cloned()
            .unwrap_or_else(|| name.to_string());
        Ok(RasterArray::new(name, data, meta))
    }
}
