//! Shared types and enums used across EOPREP.
//! Includes the canonical band vocabulary (`CanonicalBand`), cloud mask bands
//! (`CloudBand`), supported product types (`ProductType`) and the resampling
//! kinds understood by the warp layer (`Resampling`).
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sensor-independent spectral (or polarimetric) band.
#[allow(non_camel_case_types)]
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize,
)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalBand {
    /// Coastal aerosol
    CA,
    BLUE,
    GREEN,
    YELLOW,
    RED,
    /// Vegetation red edge
    VRE_1,
    VRE_2,
    VRE_3,
    NIR,
    NARROW_NIR,
    /// Water vapour
    WV,
    FAR_NIR,
    SWIR_CIRRUS,
    SWIR_1,
    SWIR_2,
    /// Mid infrared (brightness temperature)
    MIR,
    TIR_1,
    TIR_2,
    PAN,
    VV,
    VH,
    HH,
    HV,
}

impl CanonicalBand {
    pub const ALL: [CanonicalBand; 23] = [
        CanonicalBand::CA,
        CanonicalBand::BLUE,
        CanonicalBand::GREEN,
        CanonicalBand::YELLOW,
        CanonicalBand::RED,
        CanonicalBand::VRE_1,
        CanonicalBand::VRE_2,
        CanonicalBand::VRE_3,
        CanonicalBand::NIR,
        CanonicalBand::NARROW_NIR,
        CanonicalBand::WV,
        CanonicalBand::FAR_NIR,
        CanonicalBand::SWIR_CIRRUS,
        CanonicalBand::SWIR_1,
        CanonicalBand::SWIR_2,
        CanonicalBand::MIR,
        CanonicalBand::TIR_1,
        CanonicalBand::TIR_2,
        CanonicalBand::PAN,
        CanonicalBand::VV,
        CanonicalBand::VH,
        CanonicalBand::HH,
        CanonicalBand::HV,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalBand::CA => "CA",
            CanonicalBand::BLUE => "BLUE",
            CanonicalBand::GREEN => "GREEN",
            CanonicalBand::YELLOW => "YELLOW",
            CanonicalBand::RED => "RED",
            CanonicalBand::VRE_1 => "VRE_1",
            CanonicalBand::VRE_2 => "VRE_2",
            CanonicalBand::VRE_3 => "VRE_3",
            CanonicalBand::NIR => "NIR",
            CanonicalBand::NARROW_NIR => "NARROW_NIR",
            CanonicalBand::WV => "WV",
            CanonicalBand::FAR_NIR => "FAR_NIR",
            CanonicalBand::SWIR_CIRRUS => "SWIR_CIRRUS",
            CanonicalBand::SWIR_1 => "SWIR_1",
            CanonicalBand::SWIR_2 => "SWIR_2",
            CanonicalBand::MIR => "MIR",
            CanonicalBand::TIR_1 => "TIR_1",
            CanonicalBand::TIR_2 => "TIR_2",
            CanonicalBand::PAN => "PAN",
            CanonicalBand::VV => "VV",
            CanonicalBand::VH => "VH",
            CanonicalBand::HH => "HH",
            CanonicalBand::HV => "HV",
        }
    }

    /// Bands delivered as brightness temperatures rather than radiances
    pub fn is_thermal(&self) -> bool {
        matches!(
            self,
            CanonicalBand::MIR | CanonicalBand::TIR_1 | CanonicalBand::TIR_2
        )
    }

    pub fn is_sar(&self) -> bool {
        matches!(
            self,
            CanonicalBand::VV | CanonicalBand::VH | CanonicalBand::HH | CanonicalBand::HV
        )
    }
}

impl std::fmt::Display for CanonicalBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CanonicalBand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CanonicalBand::ALL
            .iter()
            .copied()
            .find(|b| b.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidArgument {
                arg: "band",
                value: s.to_string(),
            })
    }
}

/// Cloud-derived mask bands
#[allow(non_camel_case_types)]
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize,
)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloudBand {
    /// Raw flag values, unmasked
    RAW_CLOUDS,
    /// Every cloud test except thin cirrus
    CLOUDS,
    /// Every cloud test
    ALL_CLOUDS,
    CIRRUS,
}

impl std::fmt::Display for CloudBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CloudBand::RAW_CLOUDS => "RAW_CLOUDS",
            CloudBand::CLOUDS => "CLOUDS",
            CloudBand::ALL_CLOUDS => "ALL_CLOUDS",
            CloudBand::CIRRUS => "CIRRUS",
        };
        write!(f, "{}", s)
    }
}

/// Supported product types (one band mapping table each)
#[allow(non_camel_case_types)]
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize,
)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    S2_L1C,
    S2_L2A,
    S3_OLCI_EFR,
    S3_SLSTR_RBT,
    L5_TM,
    L5_MSS,
    L3_MSS,
    /// RapidEye
    RE,
    SPOT7,
    S1_RTC,
    /// COSMO-SkyMed Second Generation
    CSG,
}

impl ProductType {
    /// Detect the product type from a product name (e.g. the `.SEN3` / `.SAFE` folder name)
    pub fn detect(name: &str) -> Result<Self> {
        let upper = name.to_uppercase();
        let unsupported = || Error::UnsupportedProduct(name.to_string());

        if upper.starts_with("S3") {
            // S3x_II_L_TTT___: level sits at index 7
            if upper.as_bytes().get(7) != Some(&b'1') {
                return Err(Error::UnsupportedProduct(format!(
                    "{name}: only L1 Sentinel-3 products are handled"
                )));
            }
            return if upper.contains("_SL_") && upper.contains("RBT") {
                Ok(ProductType::S3_SLSTR_RBT)
            } else if upper.contains("_OL_") && upper.contains("EFR") {
                Ok(ProductType::S3_OLCI_EFR)
            } else {
                Err(unsupported())
            };
        }
        if upper.starts_with("S2") {
            return if upper.contains("MSIL1C") {
                Ok(ProductType::S2_L1C)
            } else if upper.contains("MSIL2A") {
                Ok(ProductType::S2_L2A)
            } else {
                Err(unsupported())
            };
        }
        if upper.starts_with("S1") && upper.contains("RTC") {
            return Ok(ProductType::S1_RTC);
        }
        if upper.starts_with("CSG") {
            return Ok(ProductType::CSG);
        }
        if upper.starts_with("LT05") {
            return Ok(ProductType::L5_TM);
        }
        if upper.starts_with("LM05") {
            return Ok(ProductType::L5_MSS);
        }
        if upper.starts_with("LM03") {
            return Ok(ProductType::L3_MSS);
        }
        if (1..=5).any(|sat| upper.contains(&format!("_RE{sat}_"))) {
            return Ok(ProductType::RE);
        }
        if upper.contains("SPOT7") || upper.contains("SPOT_7") {
            return Ok(ProductType::SPOT7);
        }
        Err(unsupported())
    }

    /// Short platform tag used in condensed product names
    pub fn platform(&self) -> &'static str {
        match self {
            ProductType::S2_L1C | ProductType::S2_L2A => "S2",
            ProductType::S3_OLCI_EFR => "S3_OLCI",
            ProductType::S3_SLSTR_RBT => "S3_SLSTR",
            ProductType::L5_TM | ProductType::L5_MSS => "L5",
            ProductType::L3_MSS => "L3",
            ProductType::RE => "RE",
            ProductType::SPOT7 => "SPOT7",
            ProductType::S1_RTC => "S1_RTC",
            ProductType::CSG => "CSG",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProductType::S2_L1C => "S2_L1C",
            ProductType::S2_L2A => "S2_L2A",
            ProductType::S3_OLCI_EFR => "S3_OLCI_EFR",
            ProductType::S3_SLSTR_RBT => "S3_SLSTR_RBT",
            ProductType::L5_TM => "L5_TM",
            ProductType::L5_MSS => "L5_MSS",
            ProductType::L3_MSS => "L3_MSS",
            ProductType::RE => "RE",
            ProductType::SPOT7 => "SPOT7",
            ProductType::S1_RTC => "S1_RTC",
            ProductType::CSG => "CSG",
        };
        write!(f, "{}", s)
    }
}

/// Resampling kernels understood by the warp layer
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, ValueEnum, Serialize, Deserialize)]
pub enum Resampling {
    /// Keeps flag values intact
    Nearest,
    #[default]
    Bilinear,
    Cubic,
}

impl Resampling {
    pub fn gdal_name(&self) -> &'static str {
        match self {
            Resampling::Nearest => "near",
            Resampling::Bilinear => "bilinear",
            Resampling::Cubic => "cubic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sentinel3_products() {
        let slstr =
            "S3B_SL_1_RBT____20191115T233722_20191115T234022_20191117T031722_0179_032_144_3420_LN2_O_NT_003.SEN3";
        assert_eq!(ProductType::detect(slstr).unwrap(), ProductType::S3_SLSTR_RBT);

        let olci =
            "S3A_OL_1_EFR____20191215T105023_20191215T105323_20191216T153115_0179_052_322_2160_LN1_O_NT_002.SEN3";
        assert_eq!(ProductType::detect(olci).unwrap(), ProductType::S3_OLCI_EFR);

        let level2 =
            "S3B_SL_2_LST____20191115T233722_20191115T234022_20191117T031722_0179_032_144_3420_LN2_O_NT_003.SEN3";
        assert!(matches!(
            ProductType::detect(level2),
            Err(Error::UnsupportedProduct(_))
        ));
    }

    #[test]
    fn detects_sentinel2_levels() {
        let l1c = "S2A_MSIL1C_20200824T110631_N0209_R137_T30TTK_20200824T150432.SAFE";
        assert_eq!(ProductType::detect(l1c).unwrap(), ProductType::S2_L1C);
        let l2a = "S2B_MSIL2A_20200114T065229_N0213_R020_T40REQ_20200114T094749.SAFE";
        assert_eq!(ProductType::detect(l2a).unwrap(), ProductType::S2_L2A);
    }

    #[test]
    fn band_names_round_trip_case_insensitively() {
        assert_eq!("swir_1".parse::<CanonicalBand>().unwrap(), CanonicalBand::SWIR_1);
        assert_eq!("NARROW_NIR".parse::<CanonicalBand>().unwrap(), CanonicalBand::NARROW_NIR);
        assert!("SWIR_3".parse::<CanonicalBand>().is_err());
    }

    #[test]
    fn thermal_bands_are_flagged() {
        assert!(CanonicalBand::TIR_1.is_thermal());
        assert!(!CanonicalBand::SWIR_1.is_thermal());
        assert!(CanonicalBand::VH.is_sar());
    }
}
