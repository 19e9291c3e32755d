//! Band mapping registry: for every product type, which raw channel carries
//! each canonical band. Tables are static; a `BandMapping` is built once per
//! product and never mutated.
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::{CanonicalBand, ProductType};

use CanonicalBand::*;

const S2_L2A: &[(CanonicalBand, &str)] = &[
    (CA, "01"),
    (BLUE, "02"),
    (GREEN, "03"),
    (RED, "04"),
    (VRE_1, "05"),
    (VRE_2, "06"),
    (VRE_3, "07"),
    (NIR, "08"),
    (NARROW_NIR, "8A"),
    (WV, "09"),
    (SWIR_1, "11"),
    (SWIR_2, "12"),
];

const S2_L1C: &[(CanonicalBand, &str)] = &[
    (CA, "01"),
    (BLUE, "02"),
    (GREEN, "03"),
    (RED, "04"),
    (VRE_1, "05"),
    (VRE_2, "06"),
    (VRE_3, "07"),
    (NIR, "08"),
    (NARROW_NIR, "8A"),
    (WV, "09"),
    (SWIR_CIRRUS, "10"),
    (SWIR_1, "11"),
    (SWIR_2, "12"),
];

const S3_OLCI_EFR: &[(CanonicalBand, &str)] = &[
    (CA, "02"),
    (BLUE, "03"),
    (GREEN, "06"),
    (RED, "08"),
    (VRE_1, "11"),
    (VRE_2, "12"),
    (VRE_3, "16"),
    (NIR, "17"),
    (NARROW_NIR, "17"),
    (WV, "20"),
    (FAR_NIR, "21"),
];

const S3_SLSTR_RBT: &[(CanonicalBand, &str)] = &[
    (GREEN, "S1"),
    (RED, "S2"),
    (NIR, "S3"),
    (NARROW_NIR, "S3"),
    (SWIR_CIRRUS, "S4"),
    (SWIR_1, "S5"),
    (SWIR_2, "S6"),
    (MIR, "S7"),
    (TIR_1, "S8"),
    (TIR_2, "S9"),
];

const L5_TM: &[(CanonicalBand, &str)] = &[
    (BLUE, "1"),
    (GREEN, "2"),
    (RED, "3"),
    (NIR, "4"),
    (NARROW_NIR, "4"),
    (SWIR_1, "5"),
    (TIR_1, "6"),
    (SWIR_2, "7"),
];

const L5_MSS: &[(CanonicalBand, &str)] = &[
    (GREEN, "1"),
    (RED, "2"),
    (VRE_1, "3"),
    (VRE_2, "3"),
    (VRE_3, "3"),
    (NIR, "4"),
    (NARROW_NIR, "4"),
];

const L3_MSS: &[(CanonicalBand, &str)] = &[
    (GREEN, "4"),
    (RED, "5"),
    (VRE_1, "6"),
    (VRE_2, "6"),
    (VRE_3, "6"),
    (NIR, "7"),
    (NARROW_NIR, "7"),
];

const RE: &[(CanonicalBand, &str)] = &[
    (BLUE, "1"),
    (GREEN, "2"),
    (RED, "3"),
    (VRE_1, "4"),
    (NIR, "5"),
    (NARROW_NIR, "5"),
];

// DIMAP multispectral band order is R, G, B, NIR
const SPOT7: &[(CanonicalBand, &str)] = &[
    (RED, "1"),
    (GREEN, "2"),
    (BLUE, "3"),
    (NIR, "4"),
    (NARROW_NIR, "4"),
];

const SAR: &[(CanonicalBand, &str)] = &[(VV, "VV"), (VH, "VH"), (HH, "HH"), (HV, "HV")];

fn static_table(product_type: ProductType) -> &'static [(CanonicalBand, &'static str)] {
    match product_type {
        ProductType::S2_L1C => S2_L1C,
        ProductType::S2_L2A => S2_L2A,
        ProductType::S3_OLCI_EFR => S3_OLCI_EFR,
        ProductType::S3_SLSTR_RBT => S3_SLSTR_RBT,
        ProductType::L5_TM => L5_TM,
        ProductType::L5_MSS => L5_MSS,
        ProductType::L3_MSS => L3_MSS,
        ProductType::RE => RE,
        ProductType::SPOT7 => SPOT7,
        ProductType::S1_RTC | ProductType::CSG => SAR,
    }
}

/// Canonical band -> raw channel identifier for one product type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandMapping {
    product_type: ProductType,
    channels: BTreeMap<CanonicalBand, String>,
}

impl BandMapping {
    /// The built-in mapping of a product type
    pub fn for_product(product_type: ProductType) -> Self {
        Self::from_pairs(product_type, static_table(product_type).iter().copied())
    }

    /// Custom mapping, e.g. for a sensor variant or a test fixture
    pub fn from_pairs<I, S>(product_type: ProductType, pairs: I) -> Self
    where
        I: IntoIterator<Item = (CanonicalBand, S)>,
        S: Into<String>,
    {
        Self {
            product_type,
            channels: pairs.into_iter().map(|(b, c)| (b, c.into())).collect(),
        }
    }

    pub fn product_type(&self) -> ProductType {
        self.product_type
    }

    /// Raw channel of `band`, `None` when the product does not carry it
    pub fn get(&self, band: CanonicalBand) -> Option<&str> {
        self.channels.get(&band).map(String::as_str)
    }

    /// Raw channel of `band`, or `BandUnavailable` naming the band and product type
    pub fn resolve(&self, band: CanonicalBand) -> Result<&str> {
        self.get(band).ok_or(Error::BandUnavailable {
            band,
            product_type: self.product_type,
        })
    }

    /// Resolve every band, failing on the first unmapped one
    pub fn resolve_all(&self, bands: &[CanonicalBand]) -> Result<Vec<(CanonicalBand, &str)>> {
        bands.iter().map(|&b| Ok((b, self.resolve(b)?))).collect()
    }

    pub fn has_band(&self, band: CanonicalBand) -> bool {
        self.channels.contains_key(&band)
    }

    pub fn bands(&self) -> impl Iterator<Item = CanonicalBand> + '_ {
        self.channels.keys().copied()
    }

    /// Canonical bands carried by a raw channel (several bands may share one channel)
    pub fn bands_for_channel<'a>(
        &'a self,
        channel: &'a str,
    ) -> impl Iterator<Item = CanonicalBand> + 'a {
        self.channels
            .iter()
            .filter(move |(_, c)| c.as_str() == channel)
            .map(|(b, _)| *b)
    }
}

/// Raw channel of a canonical band for a product type's built-in mapping
pub fn resolve_band(product_type: ProductType, band: CanonicalBand) -> Result<String> {
    BandMapping::for_product(product_type)
        .resolve(band)
        .map(str::to_string)
}
