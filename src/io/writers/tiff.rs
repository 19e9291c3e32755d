use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use std::path::Path;
use tracing::debug;

use crate::core::raster::RasterArray;
use crate::io::gdal::GdalError;

/// Write a raster as a single-band f32 GeoTIFF. Masked pixels are written as
/// the raster's no-data value (NaN when it has none).
pub fn write_tiff_f32(output: &Path, raster: &RasterArray) -> Result<Dataset, GdalError> {
    let (rows, cols) = raster.shape();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut ds = driver.create_with_band_type::<f32, _>(output, cols, rows, 1)?;

    ds.set_geo_transform(&raster.meta.geotransform)?;
    if let Some(crs) = &raster.meta.crs {
        let srs = SpatialRef::from_definition(crs)?;
        ds.set_spatial_ref(&srs)?;
    }

    let data: Vec<f32> = raster.filled_nodata().iter().map(|&v| v as f32).collect();
    let mut band = ds.rasterband(1)?;
    band.set_no_data_value(Some(raster.meta.nodata.unwrap_or(f64::NAN)))?;
    band.set_description(&raster.name)?;
    let mut buf = Buffer::new((cols, rows), data);
    band.write((0, 0), (cols, rows), &mut buf)?;
    debug!("Wrote {} ({}x{}) to {:?}", raster.name, cols, rows, output);
    Ok(ds)
}
