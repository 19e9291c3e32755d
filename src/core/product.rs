//! Per-product pipeline configuration as immutable value objects: where each
//! raw channel, geodetic grid, tie-point grid and flag raster lives inside a
//! product, plus the product-level settings (target CRS, resolution, no-data).
use chrono::NaiveDateTime;

use crate::core::bands::BandMapping;
use crate::error::{Error, Result};
use crate::types::{CloudBand, ProductType};

/// One variable of one file inside a product
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarRef {
    pub file: String,
    pub variable: String,
}

impl VarRef {
    pub fn new(file: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            variable: variable.into(),
        }
    }
}

impl std::fmt::Display for VarRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.variable)
    }
}

const SLSTR_SUFFIXES: [&str; 8] = ["an", "ao", "bn", "bo", "in", "io", "fn", "fo"];

/// SLSTR grid identity: stripe (`a`, `b`, `i`, `f`) and view (`n`adir, `o`blique)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridConfig {
    suffix: String,
}

impl GridConfig {
    pub fn new(suffix: &str) -> Result<Self> {
        if !SLSTR_SUFFIXES.contains(&suffix) {
            return Err(Error::InvalidArgument {
                arg: "suffix",
                value: suffix.to_string(),
            });
        }
        Ok(Self {
            suffix: suffix.to_string(),
        })
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn view(&self) -> &str {
        &self.suffix[1..]
    }

    /// The 1 km grid of the same view, carrying the thermal channels
    pub fn thermal(&self) -> Self {
        Self {
            suffix: format!("i{}", self.view()),
        }
    }

    pub fn radiance(&self, channel: &str) -> VarRef {
        let s = &self.suffix;
        VarRef::new(format!("{channel}_radiance_{s}.nc"), format!("{channel}_radiance_{s}"))
    }

    pub fn brightness_temperature(&self, channel: &str) -> VarRef {
        let s = &self.suffix;
        VarRef::new(format!("{channel}_BT_{s}.nc"), format!("{channel}_BT_{s}"))
    }

    /// Exception flags, stored next to the measurement
    pub fn exception(&self, measurement: &VarRef, channel: &str) -> VarRef {
        VarRef::new(measurement.file.clone(), format!("{channel}_exception_{}", self.suffix))
    }

    pub fn solar_irradiance(&self, channel: &str) -> VarRef {
        let s = &self.suffix;
        VarRef::new(
            format!("{channel}_quality_{s}.nc"),
            format!("{channel}_solar_irradiance_{s}"),
        )
    }

    pub fn geodetic(&self) -> [VarRef; 3] {
        let s = &self.suffix;
        let file = format!("geodetic_{s}.nc");
        [
            VarRef::new(file.clone(), format!("longitude_{s}")),
            VarRef::new(file.clone(), format!("latitude_{s}")),
            VarRef::new(file, format!("elevation_{s}")),
        ]
    }

    pub fn solar_zenith(&self) -> VarRef {
        let v = self.view();
        VarRef::new(format!("geometry_t{v}.nc"), format!("solar_zenith_t{v}"))
    }

    pub fn cartesian(&self) -> (VarRef, VarRef) {
        let s = &self.suffix;
        let file = format!("cartesian_{s}.nc");
        (
            VarRef::new(file.clone(), format!("x_{s}")),
            VarRef::new(file, format!("y_{s}")),
        )
    }

    pub fn clouds(&self) -> VarRef {
        let s = &self.suffix;
        VarRef::new(format!("flags_{s}.nc"), format!("cloud_{s}"))
    }
}

/// Tie-point grid cartesian coordinates (shared by every SLSTR grid)
pub fn tie_cartesian() -> (VarRef, VarRef) {
    (
        VarRef::new("cartesian_tx.nc", "x_tx"),
        VarRef::new("cartesian_tx.nc", "y_tx"),
    )
}

/// OLCI tie points sample every 64th column of every row
pub const OLCI_TIE_COL_STEP: usize = 64;
pub const OLCI_TIE_ROW_STEP: usize = 1;
pub const OLCI_GRID: &str = "olci";

/// How invalid pixels of a channel are flagged
#[derive(Debug, Clone, PartialEq)]
pub enum QualityRule {
    /// Exception value above the threshold
    Exception(VarRef),
    /// Any of the listed bits set
    Bits(VarRef, Vec<u8>),
}

/// Coordinates used to resample the solar-zenith tie grid to an image grid
#[derive(Debug, Clone, PartialEq)]
pub enum TieAxes {
    /// Tie and image cartesian coordinate rasters
    Cartesian {
        tie_x: VarRef,
        tie_y: VarRef,
        image_x: VarRef,
        image_y: VarRef,
    },
    /// Tie points on a regular subsampling of the image pixel indices
    PixelIndex { col_step: usize, row_step: usize },
}

/// Where a channel's inputs live inside the product
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelLayout {
    pub channel: String,
    /// Grid identity the channel is sampled on (GCP cache key)
    pub grid: String,
    pub view: String,
    pub measurement: VarRef,
    pub quality: QualityRule,
    /// Irradiance variable and, for per-band tables, the row holding this band
    pub irradiance: Option<(VarRef, Option<usize>)>,
}

/// File layout of a sensor family, selected once per product
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    Slstr(GridConfig),
    Olci,
}

impl Layout {
    pub fn channel(&self, channel: &str, thermal: bool) -> Result<ChannelLayout> {
        match self {
            Layout::Slstr(grid) => {
                let grid = if thermal { grid.thermal() } else { grid.clone() };
                let measurement = if thermal {
                    grid.brightness_temperature(channel)
                } else {
                    grid.radiance(channel)
                };
                Ok(ChannelLayout {
                    channel: channel.to_string(),
                    grid: grid.suffix().to_string(),
                    view: grid.view().to_string(),
                    quality: QualityRule::Exception(grid.exception(&measurement, channel)),
                    irradiance: (!thermal).then(|| (grid.solar_irradiance(channel), None)),
                    measurement,
                })
            }
            Layout::Olci => {
                let n: u8 = channel.parse().map_err(|_| Error::InvalidArgument {
                    arg: "channel",
                    value: channel.to_string(),
                })?;
                let name = format!("Oa{n:02}");
                let saturation = crate::core::processing::mask::olci_saturation_bit(&name)?;
                Ok(ChannelLayout {
                    measurement: VarRef::new(
                        format!("{name}_radiance.nc"),
                        format!("{name}_radiance"),
                    ),
                    grid: OLCI_GRID.to_string(),
                    view: String::new(),
                    quality: QualityRule::Bits(
                        VarRef::new("qualityFlags.nc", "quality_flags"),
                        vec![crate::core::processing::mask::OLCI_INVALID_BIT, saturation],
                    ),
                    irradiance: Some((
                        VarRef::new("instrument_data.nc", "solar_flux"),
                        Some(n as usize - 1),
                    )),
                    channel: name,
                })
            }
        }
    }

    /// Longitude, latitude and elevation of a grid
    pub fn geodetic(&self, grid: &str) -> Result<[VarRef; 3]> {
        match self {
            Layout::Slstr(_) => Ok(GridConfig::new(grid)?.geodetic()),
            Layout::Olci => Ok([
                VarRef::new("geo_coordinates.nc", "longitude"),
                VarRef::new("geo_coordinates.nc", "latitude"),
                VarRef::new("geo_coordinates.nc", "altitude"),
            ]),
        }
    }

    /// Solar zenith tie grid (degrees) and the axes to resample it onto `grid`
    pub fn solar_zenith(&self, grid: &str) -> Result<(VarRef, TieAxes)> {
        match self {
            Layout::Slstr(reference) => {
                let target = GridConfig::new(grid)?;
                let (tie_x, tie_y) = tie_cartesian();
                let (image_x, image_y) = target.cartesian();
                Ok((
                    reference.solar_zenith(),
                    TieAxes::Cartesian {
                        tie_x,
                        tie_y,
                        image_x,
                        image_y,
                    },
                ))
            }
            Layout::Olci => Ok((
                VarRef::new("tie_geometries.nc", "SZA"),
                TieAxes::PixelIndex {
                    col_step: OLCI_TIE_COL_STEP,
                    row_step: OLCI_TIE_ROW_STEP,
                },
            )),
        }
    }

    /// Cloud flags and their grid, when the sensor has any
    pub fn clouds(&self) -> Option<(VarRef, String)> {
        match self {
            Layout::Slstr(grid) => Some((grid.clouds(), grid.suffix().to_string())),
            Layout::Olci => None,
        }
    }

    /// Grid of the reflective channels
    pub fn reference_grid(&self) -> &str {
        match self {
            Layout::Slstr(grid) => grid.suffix(),
            Layout::Olci => OLCI_GRID,
        }
    }
}

/// Everything the preprocessing pipeline needs to know about one product
#[derive(Debug, Clone)]
pub struct ProductConfig {
    pub name: String,
    pub product_type: ProductType,
    pub mapping: BandMapping,
    pub layout: Option<Layout>,
    pub target_crs: Option<String>,
    pub default_resolution: f64,
    pub nodata: f64,
    pub datetime: Option<NaiveDateTime>,
}

/// Acquisition datetime embedded in a product name (`YYYYMMDDTHHMMSS` token)
pub fn parse_datetime(name: &str) -> Option<NaiveDateTime> {
    name.split(['_', '.'])
        .find_map(|tok| NaiveDateTime::parse_from_str(tok, "%Y%m%dT%H%M%S").ok())
}

fn default_resolution(product_type: ProductType) -> f64 {
    match product_type {
        ProductType::S2_L1C | ProductType::S2_L2A | ProductType::S1_RTC => 10.0,
        ProductType::S3_OLCI_EFR | ProductType::S3_SLSTR_RBT => 300.0,
        ProductType::L5_TM => 30.0,
        ProductType::L5_MSS | ProductType::L3_MSS => 60.0,
        ProductType::RE => 5.0,
        ProductType::SPOT7 => 6.0,
        ProductType::CSG => 3.0,
    }
}

impl ProductConfig {
    /// Configuration of a product from its name, detecting the product type
    pub fn from_name(name: &str, suffix: &str) -> Result<Self> {
        let product_type = ProductType::detect(name)?;
        let layout = match product_type {
            ProductType::S3_SLSTR_RBT => Some(Layout::Slstr(GridConfig::new(suffix)?)),
            ProductType::S3_OLCI_EFR => Some(Layout::Olci),
            _ => None,
        };
        Ok(Self {
            name: name.to_string(),
            product_type,
            mapping: BandMapping::for_product(product_type),
            layout,
            target_crs: None,
            default_resolution: default_resolution(product_type),
            nodata: -9999.0,
            datetime: parse_datetime(name),
        })
    }

    pub fn with_target_crs(mut self, crs: Option<String>) -> Self {
        self.target_crs = crs;
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn layout(&self) -> Result<&Layout> {
        self.layout.as_ref().ok_or_else(|| {
            Error::UnsupportedProduct(format!(
                "{} ({}) has no preprocessing layout",
                self.name, self.product_type
            ))
        })
    }
}

/// Product capabilities queried by callers before requesting layers
pub trait Capabilities {
    fn product_type(&self) -> ProductType;
    fn has_cloud_band(&self, band: CloudBand) -> bool;
    fn default_resolution(&self) -> f64;
    /// `{datetime}_{product type}`, e.g. `20191115T233722_S3_SLSTR_RBT`; names outputs
    fn condensed_name(&self) -> String;
}

impl Capabilities for ProductConfig {
    fn product_type(&self) -> ProductType {
        self.product_type
    }

    fn has_cloud_band(&self, _band: CloudBand) -> bool {
        self.layout.as_ref().is_some_and(|l| l.clouds().is_some())
    }

    fn default_resolution(&self) -> f64 {
        self.default_resolution
    }

    fn condensed_name(&self) -> String {
        let date = self
            .datetime
            .map(|d| d.format("%Y%m%dT%H%M%S").to_string())
            .unwrap_or_else(|| "UNDATED".to_string());
        format!("{}_{}", date, self.product_type)
    }
}

/// UTM zone CRS (`EPSG:326zz` north, `EPSG:327zz` south) containing a point
pub fn utm_crs(lon: f64, lat: f64) -> Result<String> {
    if !lon.is_finite() || !lat.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(Error::InvalidArgument {
            arg: "center",
            value: format!("({lon}, {lat})"),
        });
    }
    let zone = (((lon + 180.0) / 6.0).floor() as u32).min(59) + 1;
    let base = if lat >= 0.0 { 32600 } else { 32700 };
    Ok(format!("EPSG:{}", base + zone))
}
