//! Sentinel-3 products on disk: a `.SEN3` directory of NetCDF files, one
//! variable per measurement, read through GDAL's NetCDF driver.
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::debug;

use crate::core::processing::pipeline::ProductSource;
use crate::core::product::{ProductConfig, VarRef};
use crate::error::{Error, Result};
use crate::io::gdal::GdalRasterReader;
use crate::types::Resampling;

#[derive(Debug, Clone)]
pub struct Sentinel3Product {
    root: PathBuf,
}

impl Sentinel3Product {
    /// Open a product directory (`*.SEN3`)
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(Error::UnsupportedProduct(format!(
                "{} is not a product directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Product name, i.e. the directory name
    pub fn name(&self) -> Result<String> {
        self.root
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| Error::UnsupportedProduct(self.root.display().to_string()))
    }

    /// Pipeline configuration derived from the product name
    pub fn config(&self, suffix: &str) -> Result<ProductConfig> {
        ProductConfig::from_name(&self.name()?, suffix)
    }
}

impl ProductSource for Sentinel3Product {
    fn read(&self, var: &VarRef) -> Result<Array2<f64>> {
        let path = self.root.join(&var.file);
        debug!("Reading {} from {:?}", var.variable, path);
        let reader = GdalRasterReader::open_netcdf(&path, &var.variable)?;
        Ok(reader.read_band(1, None, Resampling::Nearest)?)
    }

    fn has(&self, var: &VarRef) -> bool {
        let path = self.root.join(&var.file);
        path.is_file() && GdalRasterReader::open_netcdf(&path, &var.variable).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_name_drives_config() {
        let dir = tempfile::tempdir().unwrap();
        let name =
            "S3A_SL_1_RBT____20200101T101010_20200101T101310_0179_032_144_3420_LN2_O_NT_003.SEN3";
        let root = dir.path().join(name);
        std::fs::create_dir(&root).unwrap();
        let product = Sentinel3Product::open(&root).unwrap();
        let cfg = product.config("bo").unwrap();
        assert_eq!(cfg.product_type, crate::types::ProductType::S3_SLSTR_RBT);
        assert!(!product.has(&VarRef::new("S1_radiance_bo.nc", "S1_radiance_bo")));
    }

    #[test]
    fn missing_directory_is_rejected() {
        assert!(Sentinel3Product::open("/nonexistent/S3A_SL_1_RBT.SEN3").is_err());
    }
}
