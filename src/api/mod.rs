//! High-level, ergonomic library API: open a product, preprocess canonical
//! bands, load cloud masks, compute spectral indices and save results. Prefer
//! these entrypoints over the low-level processing modules when integrating
//! EOPREP.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::core::bands::BandMapping;
use crate::core::index;
use crate::core::params::PipelineParams;
use crate::core::processing::geocode::Warper;
use crate::core::processing::mask::{ConnectedComponentSieve, Sieve};
use crate::core::processing::pipeline::{Preprocessor, ProductSource};
use crate::core::product::{Capabilities, ProductConfig};
use crate::core::raster::RasterArray;
use crate::error::Result;
use crate::io::sentinel3::Sentinel3Product;
use crate::io::warp::GdalWarper;
use crate::io::writers::metadata::{
    OutputInfo, create_metadata_sidecar, embed_tiff_metadata, extract_metadata_fields,
};
use crate::io::writers::tiff::write_tiff_f32;
use crate::types::{CanonicalBand, CloudBand, ProductType};

pub use crate::core::bands::resolve_band;
pub use crate::core::index::{all_index_names, evaluate_index, required_bands};

/// Raw channels an index needs on a product type, failing with
/// `BandUnavailable` on the first band the product does not carry
pub fn index_channels(
    product_type: ProductType,
    index: &str,
) -> Result<Vec<(CanonicalBand, String)>> {
    let mapping = BandMapping::for_product(product_type);
    let bands = required_bands(index)?;
    Ok(mapping
        .resolve_all(&bands)?
        .into_iter()
        .map(|(b, c)| (b, c.to_string()))
        .collect())
}

/// A product opened for preprocessing
pub struct Product {
    preprocessor: Preprocessor,
    params: PipelineParams,
}

impl Product {
    /// Open a Sentinel-3 product directory with GDAL reading and `gdalwarp` geocoding
    pub fn open(path: &Path, params: &PipelineParams) -> Result<Self> {
        let source = Sentinel3Product::open(path)?;
        let config = source.config(&params.suffix)?;
        info!("Opened {} ({})", config.name, config.product_type);
        Self::with_source(
            config,
            params,
            Arc::new(source),
            Arc::new(GdalWarper::default()),
            Arc::new(ConnectedComponentSieve),
        )
    }

    /// Build a product over any variable source and warp backend
    pub fn with_source(
        config: ProductConfig,
        params: &PipelineParams,
        source: Arc<dyn ProductSource>,
        warper: Arc<dyn Warper>,
        sieve: Arc<dyn Sieve>,
    ) -> Result<Self> {
        let preprocessor = Preprocessor::new(config, params, source, warper, sieve)?;
        Ok(Self {
            preprocessor,
            params: params.clone(),
        })
    }

    pub fn config(&self) -> &ProductConfig {
        self.preprocessor.config()
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    fn resolution(&self) -> Option<f64> {
        self.params.resolution
    }

    /// Corrected, geocoded and masked raster of one band at the configured resolution
    pub fn preprocess(&self, band: CanonicalBand) -> Result<Arc<RasterArray>> {
        self.preprocessor.preprocess(band, self.resolution())
    }

    /// Preprocess several bands, keyed by canonical band
    pub fn load_bands(
        &self,
        bands: &[CanonicalBand],
    ) -> Result<BTreeMap<CanonicalBand, RasterArray>> {
        let mapping = &self.config().mapping;
        mapping.resolve_all(bands)?;
        bands
            .iter()
            .map(|&b| Ok((b, self.preprocess(b)?.as_ref().clone().renamed(b.as_str()))))
            .collect()
    }

    /// GeoTIFF a preprocessed band is persisted to, when `output_dir` is set
    pub fn band_file(&self, band: CanonicalBand) -> Result<Option<PathBuf>> {
        self.preprocessor.band_file(band, self.resolution())
    }

    pub fn load_clouds(&self, band: CloudBand) -> Result<RasterArray> {
        self.preprocessor.load_clouds(band, self.resolution())
    }

    /// Compute an index from the product's preprocessed bands
    pub fn compute_index(&self, name: &str) -> Result<RasterArray> {
        let def = index::catalog()?.get(name)?;
        // Fail on unavailable bands before reading anything
        self.config().mapping.resolve_all(def.bands)?;
        let inputs = self.load_bands(def.bands)?;
        evaluate_index(def.name, &inputs)
    }

    /// Write a layer as `{condensed}_{layer}.tif` plus a JSON sidecar
    pub fn save(&self, raster: &RasterArray, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}_{}.tif", self.condensed_name(), raster.name));
        let mut ds = write_tiff_f32(&path, raster)?;
        let config = self.config();
        let info = OutputInfo {
            product: &config.name,
            product_type: config.product_type,
            datetime: config.datetime.map(|d| d.to_string()),
            layer: &raster.name,
            calibration: self.preprocessor.profile().name(),
        };
        let fields = extract_metadata_fields(&info, raster);
        embed_tiff_metadata(&mut ds, &fields)?;
        create_metadata_sidecar(&path, &fields, raster)?;
        info!("Saved {} to {:?}", raster.name, path);
        Ok(path)
    }
}

impl Capabilities for Product {
    fn product_type(&self) -> ProductType {
        self.config().product_type
    }

    fn has_cloud_band(&self, band: CloudBand) -> bool {
        self.config().has_cloud_band(band)
    }

    fn default_resolution(&self) -> f64 {
        self.config().default_resolution
    }

    fn condensed_name(&self) -> String {
        self.config().condensed_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn index_channels_resolve_through_the_mapping() {
        let channels = index_channels(ProductType::S3_SLSTR_RBT, "NDVI").unwrap();
        assert_eq!(
            channels,
            vec![(CanonicalBand::NIR, "S3".to_string()), (CanonicalBand::RED, "S2".to_string())]
        );
    }

    #[test]
    fn missing_band_is_reported_with_the_product_type() {
        match index_channels(ProductType::L5_MSS, "NDMI") {
            Err(Error::BandUnavailable { band, product_type }) => {
                assert_eq!(band, CanonicalBand::SWIR_1);
                assert_eq!(product_type, ProductType::L5_MSS);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
