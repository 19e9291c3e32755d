//! Radiometric calibration: named multiplicative coefficient presets keyed by
//! (raw channel, view), plus the radiance → reflectance conversion.
//!
//! Sentinel-3 SLSTR radiometry is not nominal for the solar channels, so
//! first-order vicarious corrections are published by the mission. Coefficients
//! apply to radiance channels only; brightness temperatures are never adjusted.
use std::collections::BTreeMap;
use std::f64::consts::PI;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::processing::ops::nan_mean;
use crate::error::{Error, Result};
use crate::types::CanonicalBand;

pub const DEFAULT_PROFILE: &str = "S3_PN_SLSTR_L1_08";

/// Names of the built-in presets, in display order
pub const PRESET_NAMES: [&str; 5] = [
    "SNAP",
    "S3_PN_SLSTR_L1_06",
    "S3_PN_SLSTR_L1_07",
    "S3_PN_SLSTR_L1_08",
    "NONE",
];

const PN_08: &[(&str, f64)] = &[
    ("S1_n", 0.97),
    ("S2_n", 0.98),
    ("S3_n", 0.98),
    ("S5_n", 1.11),
    ("S6_n", 1.13),
    ("S1_o", 0.94),
    ("S2_o", 0.95),
    ("S3_o", 0.95),
    ("S5_o", 1.04),
    ("S6_o", 1.07),
];

/// A named set of multiplicative coefficients keyed `"{channel}_{view}"` (e.g. `S5_n`).
/// Any key not listed has a coefficient of 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    name: String,
    coefficients: BTreeMap<String, f64>,
}

impl CalibrationProfile {
    pub fn new<I, K>(name: impl Into<String>, coefficients: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            name: name.into(),
            coefficients: coefficients
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }

    /// Identity preset
    pub fn none() -> Self {
        Self::new("NONE", Vec::<(String, f64)>::new())
    }

    /// Look up a built-in preset by name
    pub fn preset(name: &str) -> Result<Self> {
        let table: &[(&str, f64)] = match name {
            // S3MPC adjustment shipped (optionally) with SNAP
            "SNAP" => &[("S5_n", 1.12), ("S6_n", 1.13), ("S5_o", 1.15), ("S6_o", 1.14)],
            // Product notice 07 kept the coefficients of notice 06
            "S3_PN_SLSTR_L1_06" | "S3_PN_SLSTR_L1_07" => {
                &[("S5_n", 1.12), ("S6_n", 1.15), ("S5_o", 1.20), ("S6_o", 1.26)]
            }
            "S3_PN_SLSTR_L1_08" => PN_08,
            "NONE" => &[],
            _ => {
                return Err(Error::InvalidCalibrationProfile {
                    name: name.to_string(),
                });
            }
        };
        Ok(Self::new(name, table.iter().map(|&(k, v)| (k, v))))
    }

    /// Profile of user-supplied coefficients, named `CUSTOM_<fingerprint>` so
    /// two different coefficient sets never share a name
    pub fn custom<I, K>(coefficients: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut profile = Self::new("", coefficients);
        profile.name = format!("CUSTOM_{:016x}", profile.fingerprint());
        profile
    }

    /// FNV-1a over the sorted coefficient table; stable across runs and builds
    pub fn fingerprint(&self) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for (key, value) in &self.coefficients {
            let bytes = key
                .bytes()
                .chain([b'='])
                .chain(value.to_bits().to_le_bytes())
                .chain([b';']);
            for b in bytes {
                hash ^= u64::from(b);
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
        }
        hash
    }

    pub fn default_preset() -> Self {
        Self::new(DEFAULT_PROFILE, PN_08.iter().map(|&(k, v)| (k, v)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coefficient for a (channel, view) pair, 1.0 when not listed
    pub fn coefficient(&self, channel: &str, view: &str) -> f64 {
        self.coefficients
            .get(&format!("{channel}_{view}"))
            .copied()
            .unwrap_or(1.0)
    }
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self::default_preset()
    }
}

/// Multiply a raw radiance array by the profile coefficient of (channel, view)
pub fn adjust(
    raw: &Array2<f64>,
    channel: &str,
    view: &str,
    profile: &CalibrationProfile,
) -> Array2<f64> {
    let coeff = profile.coefficient(channel, view);
    debug!(
        "Radiance adjustment {}_{} with profile {}: x{}",
        channel,
        view,
        profile.name(),
        coeff
    );
    raw * coeff
}

/// Default solar flux (mW / m² / sr / nm) of a reflective band, used when the
/// product's irradiance raster is undefined for the scene
pub fn default_solar_flux(band: CanonicalBand) -> Option<f64> {
    match band {
        CanonicalBand::GREEN => Some(1837.39),
        CanonicalBand::RED => Some(1525.94),
        CanonicalBand::NIR | CanonicalBand::NARROW_NIR => Some(956.17),
        CanonicalBand::SWIR_CIRRUS => Some(365.90),
        CanonicalBand::SWIR_1 => Some(248.33),
        CanonicalBand::SWIR_2 => Some(78.33),
        _ => None,
    }
}

/// Solar flux of a band: the NaN-ignoring mean of its irradiance raster, or the
/// band default when that raster holds no finite value
pub fn solar_flux(irradiance: &Array2<f64>, band: CanonicalBand) -> Result<f64> {
    if let Some(mean) = nan_mean(irradiance) {
        return Ok(mean);
    }
    debug!("Irradiance raster undefined for {}, using default solar flux", band);
    default_solar_flux(band).ok_or_else(|| {
        Error::Processing(format!("No solar flux available for band {band}"))
    })
}

/// `π / (E0 · cos(sza))`, the per-pixel radiance → reflectance factor.
/// `sza` is in radians.
pub fn reflectance_coefficient(sza: &Array2<f64>, solar_flux: f64) -> Array2<f64> {
    let mut coeff = Array2::<f64>::zeros(sza.dim());
    Zip::from(&mut coeff).and(sza).par_for_each(|c, &z| {
        *c = PI / solar_flux / z.cos();
    });
    coeff
}

/// `reflectance = π · L / (E0 · cos(sza))`, pixel by pixel on the sensor grid
pub fn radiance_to_reflectance(
    radiance: &Array2<f64>,
    sza: &Array2<f64>,
    solar_flux: f64,
) -> Result<Array2<f64>> {
    if radiance.dim() != sza.dim() {
        return Err(Error::ShapeMismatch {
            what: "solar zenith image".to_string(),
            expected: radiance.dim(),
            got: sza.dim(),
        });
    }
    Ok(radiance * &reflectance_coefficient(sza, solar_flux))
}
