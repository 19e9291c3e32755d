use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::calibration::{CalibrationProfile, DEFAULT_PROFILE};
use crate::core::processing::geocode::GCP_SAMPLES_PER_AXIS;
use crate::core::processing::mask::MIN_CLUSTER_SIZE;
use crate::error::{Error, Result};

/// Preprocessing parameters suitable for config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    /// Output pixel size in meters; None means the product default
    pub resolution: Option<f64>,
    /// Calibration preset name (SNAP, S3_PN_SLSTR_L1_06/07/08, NONE)
    pub calibration: String,
    /// Custom coefficients keyed `{channel}_{view}`; overrides `calibration` when set.
    /// The resulting profile is named after a fingerprint of the coefficients.
    pub custom_coefficients: Option<std::collections::BTreeMap<String, f64>>,
    /// Target CRS (e.g. "EPSG:32631"); None means the product's UTM zone
    pub target_crs: Option<String>,
    /// Where preprocessed GeoTIFFs are written and looked up; None keeps everything in memory
    pub output_dir: Option<PathBuf>,
    /// Grid suffix of the reflective channels (an, ao, bn, bo, ...)
    pub suffix: String,
    /// Control points sampled along each axis of the geodetic grids
    pub gcp_samples: usize,
    /// Minimum cluster size kept by the cloud-mask sieve
    pub sieve_size: usize,
    /// No-data sentinel written in uncovered output cells
    pub nodata: f64,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            resolution: None,
            calibration: DEFAULT_PROFILE.to_string(),
            custom_coefficients: None,
            target_crs: None,
            output_dir: None,
            suffix: "an".to_string(),
            gcp_samples: GCP_SAMPLES_PER_AXIS,
            sieve_size: MIN_CLUSTER_SIZE,
            nodata: -9999.0,
        }
    }
}

impl PipelineParams {
    /// Load from a JSON file; unspecified fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&text)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        self.calibration_profile()?;
        if let Some(res) = self.resolution {
            if res.is_nan() || res <= 0.0 {
                return Err(Error::InvalidArgument {
                    arg: "resolution",
                    value: res.to_string(),
                });
            }
        }
        if self.gcp_samples < 2 {
            return Err(Error::InvalidArgument {
                arg: "gcp_samples",
                value: self.gcp_samples.to_string(),
            });
        }
        Ok(())
    }

    pub fn calibration_profile(&self) -> Result<CalibrationProfile> {
        match &self.custom_coefficients {
            Some(coeffs) => Ok(CalibrationProfile::custom(
                coeffs.iter().map(|(k, v)| (k.clone(), *v)),
            )),
            None => CalibrationProfile::preset(&self.calibration),
        }
    }
}
