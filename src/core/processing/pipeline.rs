//! Per-band preprocessing pipeline.
//!
//! Every raw channel goes through the same fixed stages:
//! read → adjust → convert (radiance → reflectance, brightness temperatures
//! untouched) → geocode → mask → persist. Results are cached on
//! (channel, resolution, calibration profile) for the lifetime of the
//! [`Preprocessor`]; solar zenith images are cached per grid and control points
//! per grid identity (inside the [`Geocoder`]).
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ndarray::{Array2, Axis};
use tracing::{debug, info, warn};

use crate::core::calibration::{self, CalibrationProfile};
use crate::core::params::PipelineParams;
use crate::core::processing::cache::KeyedCache;
use crate::core::processing::geocode::{GeodeticGrid, Geocoder, Warper};
use crate::core::processing::mask::{self, Sieve};
use crate::core::processing::ops::nan_mean;
use crate::core::processing::tie_point::{TiePointGrid, resample_to_grid};
use crate::core::product::{
    Capabilities, ChannelLayout, Layout, ProductConfig, QualityRule, TieAxes, VarRef, utm_crs,
};
use crate::core::raster::{Deferred, RasterArray};
use crate::error::{Error, Result};
use crate::io::gdal::GdalRasterReader;
use crate::io::writers::metadata::{OutputInfo, embed_tiff_metadata, extract_metadata_fields};
use crate::io::writers::tiff::write_tiff_f32;
use crate::types::{CanonicalBand, CloudBand, Resampling};

/// Read access to the variables of one product
pub trait ProductSource: Send + Sync {
    /// Read a variable as f64 with scale/offset applied and no-data as NaN
    fn read(&self, var: &VarRef) -> Result<Array2<f64>>;
    fn has(&self, var: &VarRef) -> bool;
}

/// Cache key of one preprocessed channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BandKey {
    pub channel: String,
    pub resolution_bits: u64,
    pub profile: String,
}

impl BandKey {
    pub fn new(channel: &str, resolution: f64, profile: &str) -> Self {
        Self {
            channel: channel.to_string(),
            resolution_bits: resolution.to_bits(),
            profile: profile.to_string(),
        }
    }
}

pub struct Preprocessor {
    config: ProductConfig,
    profile: CalibrationProfile,
    source: Arc<dyn ProductSource>,
    geocoder: Geocoder,
    sieve: Arc<dyn Sieve>,
    sieve_size: usize,
    output_dir: Option<PathBuf>,
    sza: KeyedCache<String, Arc<Array2<f64>>>,
    bands: KeyedCache<BandKey, Arc<RasterArray>>,
    cancel: Arc<AtomicBool>,
    runs: AtomicUsize,
}

impl Preprocessor {
    /// Build the pipeline of one product. The calibration profile is resolved
    /// here so an unknown preset fails before any band is read. Without an
    /// explicit target CRS, the UTM zone of the reference grid center is used.
    pub fn new(
        config: ProductConfig,
        params: &PipelineParams,
        source: Arc<dyn ProductSource>,
        warper: Arc<dyn Warper>,
        sieve: Arc<dyn Sieve>,
    ) -> Result<Self> {
        params.validate()?;
        let profile = params.calibration_profile()?;
        let layout = config.layout()?.clone();
        let target_crs = match params.target_crs.clone().or_else(|| config.target_crs.clone()) {
            Some(crs) => crs,
            None => scene_utm(&layout, source.as_ref())?,
        };
        info!(
            "Preprocessing {} with profile {} into {}",
            config.name,
            profile.name(),
            target_crs
        );
        let geocoder =
            Geocoder::new(warper, target_crs, params.nodata).with_gcp_samples(params.gcp_samples);
        let config = config.with_nodata(params.nodata);
        Ok(Self {
            config,
            profile,
            source,
            geocoder,
            sieve,
            sieve_size: params.sieve_size,
            output_dir: params.output_dir.clone(),
            sza: KeyedCache::new(),
            bands: KeyedCache::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            runs: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &ProductConfig {
        &self.config
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    pub fn geocoder(&self) -> &Geocoder {
        &self.geocoder
    }

    /// Setting this flag makes every band run not yet past its current stage
    /// fail with [`Error::Cancelled`]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Number of band pipelines actually executed (cache and disk hits excluded)
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn check_cancel(&self, what: &str) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(Error::Cancelled(what.to_string()));
        }
        Ok(())
    }

    /// Corrected, geocoded and masked raster of a canonical band
    pub fn preprocess(
        &self,
        band: CanonicalBand,
        resolution: Option<f64>,
    ) -> Result<Arc<RasterArray>> {
        let channel = self.config.mapping.resolve(band)?;
        let resolution = resolution.unwrap_or(self.config.default_resolution);
        let layout = self.config.layout()?;
        let ch = layout.channel(channel, band.is_thermal())?;
        let key = BandKey::new(&ch.channel, resolution, self.profile.name());
        self.bands.get_or_try_init(&key, || {
            self.load_or_run(band, layout, &ch, resolution).map(Arc::new)
        })
    }

    /// Output path of a band under `output_dir`. The name carries every input
    /// the pixels depend on besides the product: channel, grid, resolution,
    /// target CRS and calibration profile.
    pub fn band_path(&self, dir: &Path, ch: &ChannelLayout, resolution: f64) -> PathBuf {
        dir.join(format!(
            "{}_{}_{}_{}m_{}_{}.tif",
            self.config.condensed_name(),
            ch.channel,
            ch.grid,
            resolution,
            crs_tag(self.geocoder.target_crs()),
            self.profile.name()
        ))
    }

    /// Where a band is persisted, `None` without an output directory
    pub fn band_file(
        &self,
        band: CanonicalBand,
        resolution: Option<f64>,
    ) -> Result<Option<PathBuf>> {
        let Some(dir) = self.output_dir.as_deref() else {
            return Ok(None);
        };
        let channel = self.config.mapping.resolve(band)?;
        let ch = self.config.layout()?.channel(channel, band.is_thermal())?;
        let resolution = resolution.unwrap_or(self.config.default_resolution);
        Ok(Some(self.band_path(dir, &ch, resolution)))
    }

    fn load_or_run(
        &self,
        band: CanonicalBand,
        layout: &Layout,
        ch: &ChannelLayout,
        resolution: f64,
    ) -> Result<RasterArray> {
        let path = self.output_dir.as_deref().map(|d| self.band_path(d, ch, resolution));
        if let Some(path) = path.as_deref().filter(|p| p.is_file()) {
            debug!("Reading preprocessed {} from {:?}", ch.channel, path);
            return Ok(GdalRasterReader::open(path)?.read_raster(&ch.channel)?);
        }
        let raster = self.run(band, layout, ch, resolution)?;
        if let Some(path) = path {
            self.persist(&path, &raster)?;
        }
        Ok(raster)
    }

    fn run(
        &self,
        band: CanonicalBand,
        layout: &Layout,
        ch: &ChannelLayout,
        resolution: f64,
    ) -> Result<RasterArray> {
        let what = format!("{} ({})", band, ch.channel);
        self.runs.fetch_add(1, Ordering::SeqCst);

        self.check_cancel(&what)?;
        let raw = self.source.read(&ch.measurement)?;

        self.check_cancel(&what)?;
        let converted = if band.is_thermal() {
            // Brightness temperatures are neither adjusted nor converted
            raw
        } else {
            let adjusted = calibration::adjust(&raw, &ch.channel, &ch.view, &self.profile);
            let sza = self.sza_image(layout, &ch.grid, adjusted.dim())?;
            let e0 = self.solar_flux(ch, band)?;
            calibration::radiance_to_reflectance(&adjusted, &sza, e0)?
        };

        self.check_cancel(&what)?;
        let geocoded = self.geocoder.geocode(
            &ch.channel,
            &converted,
            &ch.grid,
            resolution,
            Resampling::Bilinear,
            || self.geodetic(layout, &ch.grid),
        )?;

        self.check_cancel(&what)?;
        let masked = self.apply_quality(layout, ch, geocoded, resolution)?;
        info!(
            "Preprocessed {} at {} m: {} valid pixels",
            what,
            resolution,
            masked.valid_count()
        );
        Ok(masked)
    }

    /// Solar zenith (radians) on the pixels of `grid`, computed once per grid
    fn sza_image(
        &self,
        layout: &Layout,
        grid: &str,
        shape: (usize, usize),
    ) -> Result<Arc<Array2<f64>>> {
        let sza = self.sza.get_or_try_init(&grid.to_string(), || {
            let (var, axes) = layout.solar_zenith(grid)?;
            let tie = self.source.read(&var)?.mapv(f64::to_radians);
            let image = match axes {
                TieAxes::Cartesian {
                    tie_x,
                    tie_y,
                    image_x,
                    image_y,
                } => {
                    let grid = TiePointGrid::from_cartesian(
                        tie,
                        &self.source.read(&tie_x)?,
                        &self.source.read(&tie_y)?,
                    )?;
                    let image_y = self.source.read(&image_y)?;
                    let image_x = self.source.read(&image_x)?;
                    resample_to_grid(&grid, &image_y, &image_x)?
                }
                TieAxes::PixelIndex { col_step, row_step } => {
                    let (rows, cols) = tie.dim();
                    let y_axis = (0..rows).map(|r| (r * row_step) as f64).collect();
                    let x_axis = (0..cols).map(|c| (c * col_step) as f64).collect();
                    let grid = TiePointGrid::new(tie, y_axis, x_axis)?;
                    let target_y = Array2::from_shape_fn(shape, |(r, _)| r as f64);
                    let target_x = Array2::from_shape_fn(shape, |(_, c)| c as f64);
                    resample_to_grid(&grid, &target_y, &target_x)?
                }
            };
            debug!("Solar zenith image of grid {}: {:?}", grid, image.dim());
            Ok(Arc::new(image))
        })?;
        if sza.dim() != shape {
            return Err(Error::ShapeMismatch {
                what: format!("solar zenith image of grid {grid}"),
                expected: shape,
                got: sza.dim(),
            });
        }
        Ok(sza)
    }

    fn solar_flux(&self, ch: &ChannelLayout, band: CanonicalBand) -> Result<f64> {
        let Some((var, row)) = &ch.irradiance else {
            return Err(Error::Processing(format!("{} has no solar irradiance", ch.channel)));
        };
        if !self.source.has(var) {
            warn!("{} is missing, using the default solar flux of {}", var, band);
            return calibration::solar_flux(&Array2::from_elem((1, 1), f64::NAN), band);
        }
        let irradiance = self.source.read(var)?;
        match row {
            Some(r) if *r < irradiance.nrows() => {
                calibration::solar_flux(&irradiance.select(Axis(0), &[*r]), band)
            }
            Some(r) => Err(Error::Processing(format!(
                "{} has {} rows, band row {} requested",
                var,
                irradiance.nrows(),
                r
            ))),
            None => calibration::solar_flux(&irradiance, band),
        }
    }

    fn geodetic(&self, layout: &Layout, grid: &str) -> Result<GeodeticGrid> {
        let [lon, lat, elevation] = layout.geodetic(grid)?;
        let lon = self.source.read(&lon)?;
        let lat = self.source.read(&lat)?;
        let elevation = if self.source.has(&elevation) {
            self.source.read(&elevation)?
        } else {
            Array2::zeros(lon.dim())
        };
        Ok(GeodeticGrid { lon, lat, elevation })
    }

    /// Flag rasters are geocoded with nearest resampling onto the band's
    /// output grid, then ORed into its mask. Quality flags are not sieved.
    fn apply_quality(
        &self,
        layout: &Layout,
        ch: &ChannelLayout,
        raster: RasterArray,
        resolution: f64,
    ) -> Result<RasterArray> {
        let var = match &ch.quality {
            QualityRule::Exception(var) | QualityRule::Bits(var, _) => var,
        };
        if !self.source.has(var) {
            warn!("No quality flags {} for {}, band left unmasked", var, ch.channel);
            return Ok(raster);
        }
        let flags = || -> Result<RasterArray> {
            let raw = self.source.read(var)?;
            self.geocoder.geocode(
                &var.variable,
                &raw,
                &ch.grid,
                resolution,
                Resampling::Nearest,
                || self.geodetic(layout, &ch.grid),
            )
        };
        let invalid = match &ch.quality {
            QualityRule::Exception(_) => {
                let flags = flags()?;
                mask::or_masks(&mask::exception_mask(&flags.data), &flags.mask)
            }
            QualityRule::Bits(_, bits) => mask::flag_mask(
                Deferred::pending(|| flags().map(|f| mask::split_flags(&f).0)),
                bits,
                &raster.mask,
            )?,
        };
        mask::apply_mask(raster, &invalid)
    }

    fn persist(&self, path: &Path, raster: &RasterArray) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut ds = write_tiff_f32(path, raster)?;
        let info = OutputInfo {
            product: &self.config.name,
            product_type: self.config.product_type,
            datetime: self.config.datetime.map(|d| d.to_string()),
            layer: &raster.name,
            calibration: self.profile.name(),
        };
        embed_tiff_metadata(&mut ds, &extract_metadata_fields(&info, raster))?;
        info!("Saved {:?}", path);
        Ok(())
    }

    /// Cloud band geocoded at `resolution`, sieved with the configured size
    pub fn load_clouds(&self, band: CloudBand, resolution: Option<f64>) -> Result<RasterArray> {
        let layout = self.config.layout()?;
        let (var, grid) = layout.clouds().ok_or_else(|| {
            Error::UnsupportedProduct(format!("{} has no cloud flags", self.config.product_type))
        })?;
        let resolution = resolution.unwrap_or(self.config.default_resolution);
        self.check_cancel(&band.to_string())?;
        let raw = self.source.read(&var)?;
        let flags = self.geocoder.geocode(
            &var.variable,
            &raw,
            &grid,
            resolution,
            Resampling::Nearest,
            || self.geodetic(layout, &grid),
        )?;
        mask::cloud_raster(&flags, band, self.sieve.as_ref(), self.sieve_size)
    }
}

/// File-name form of a CRS: `EPSG:32631` becomes `EPSG32631`
fn crs_tag(crs: &str) -> String {
    crs.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// UTM zone of the reference grid's center pixel, or of the mean position when
/// the center is undefined
fn scene_utm(layout: &Layout, source: &dyn ProductSource) -> Result<String> {
    let [lon, lat, _] = layout.geodetic(layout.reference_grid())?;
    let lon = source.read(&lon)?;
    let lat = source.read(&lat)?;
    let (rows, cols) = lon.dim();
    if rows == 0 || cols == 0 {
        return Err(Error::geocoding(layout.reference_grid(), "empty geodetic grid"));
    }
    let center = [rows / 2, cols / 2];
    let (x, y) = match (lon.get(center), lat.get(center)) {
        (Some(x), Some(y)) if x.is_finite() && y.is_finite() => (*x, *y),
        _ => (
            nan_mean(&lon).unwrap_or(f64::NAN),
            nan_mean(&lat).unwrap_or(f64::NAN),
        ),
    };
    utm_crs(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::processing::geocode::WarpRequest;
    use crate::core::processing::mask::ConnectedComponentSieve;
    use crate::core::raster::SpatialMeta;
    use std::collections::HashMap;

    const NAME: &str =
        "S3A_SL_1_RBT____20200101T101010_20200101T101310_0179_032_144_3420_LN2_O_NT_003.SEN3";

    struct MapSource(HashMap<String, Array2<f64>>);

    impl ProductSource for MapSource {
        fn read(&self, var: &VarRef) -> Result<Array2<f64>> {
            self.0
                .get(&var.variable)
                .cloned()
                .ok_or_else(|| Error::Processing(format!("missing {var}")))
        }

        fn has(&self, var: &VarRef) -> bool {
            self.0.contains_key(&var.variable)
        }
    }

    /// Keeps the sensor grid as the output grid
    struct IdentityWarper;

    impl Warper for IdentityWarper {
        fn warp_gcps(&self, req: &WarpRequest<'_>) -> Result<RasterArray> {
            let meta = SpatialMeta {
                resolution: (req.resolution, -req.resolution),
                crs: Some(req.target_crs.to_string()),
                geotransform: [0.0, req.resolution, 0.0, 0.0, 0.0, -req.resolution],
                nodata: Some(req.nodata),
            };
            Ok(RasterArray::new(req.name, req.source.clone(), meta))
        }
    }

    fn lon_grid(dim: (usize, usize)) -> Array2<f64> {
        Array2::from_shape_fn(dim, |(_, c)| 2.0 + c as f64 * 0.01)
    }

    fn lat_grid(dim: (usize, usize)) -> Array2<f64> {
        Array2::from_shape_fn(dim, |(r, _)| 48.0 - r as f64 * 0.01)
    }

    fn source() -> MapSource {
        let dim = (4, 4);
        let mut vars = HashMap::new();
        vars.insert("S3_radiance_an".into(), Array2::from_elem(dim, 100.0));
        vars.insert("S8_BT_in".into(), Array2::from_elem(dim, 280.0));
        vars.insert("S3_solar_irradiance_an".into(), Array2::from_elem((1, 3), 1000.0));
        vars.insert("longitude_an".into(), lon_grid(dim));
        vars.insert("latitude_an".into(), lat_grid(dim));
        vars.insert("longitude_in".into(), vars["longitude_an"].clone());
        vars.insert("latitude_in".into(), vars["latitude_an"].clone());
        // 60° everywhere on a 3x3 tie grid
        vars.insert("solar_zenith_tn".into(), Array2::from_elem((3, 3), 60.0));
        vars.insert("x_tx".into(), Array2::from_shape_fn((3, 3), |(_, c)| c as f64 * 2.0));
        vars.insert("y_tx".into(), Array2::from_shape_fn((3, 3), |(r, _)| r as f64 * 2.0));
        vars.insert("x_an".into(), Array2::from_shape_fn(dim, |(_, c)| c as f64));
        vars.insert("y_an".into(), Array2::from_shape_fn(dim, |(r, _)| r as f64));
        let mut exception = Array2::zeros(dim);
        exception[[0, 0]] = 8.0;
        vars.insert("S3_exception_an".into(), exception);
        MapSource(vars)
    }

    fn preprocessor(params: PipelineParams) -> Preprocessor {
        let config = ProductConfig::from_name(NAME, &params.suffix).unwrap();
        Preprocessor::new(
            config,
            &params,
            Arc::new(source()),
            Arc::new(IdentityWarper),
            Arc::new(ConnectedComponentSieve),
        )
        .unwrap()
    }

    #[test]
    fn reflective_band_is_calibrated_converted_and_masked() {
        let pre = preprocessor(PipelineParams::default());
        assert_eq!(pre.geocoder().target_crs(), "EPSG:32631");
        let nir = pre.preprocess(CanonicalBand::NIR, Some(300.0)).unwrap();
        // π · 100 · 0.98 / (1000 · cos 60°)
        let expected = std::f64::consts::PI * 98.0 / 500.0;
        assert!((nir.data[[2, 2]] - expected).abs() < 1e-9);
        assert!(nir.mask[[0, 0]]);
        assert_eq!(nir.valid_count(), 15);
    }

    #[test]
    fn thermal_band_passes_through_on_its_own_grid() {
        let pre = preprocessor(PipelineParams::default());
        let tir = pre.preprocess(CanonicalBand::TIR_1, None).unwrap();
        assert_eq!(tir.data[[1, 1]], 280.0);
        // no S8 exception flags in the product: kept as is
        assert_eq!(tir.valid_count(), 16);
        assert_eq!(pre.geocoder().gcp_builds(), 1);
    }

    #[test]
    fn aliases_share_one_run() {
        let pre = preprocessor(PipelineParams::default());
        let a = pre.preprocess(CanonicalBand::NIR, None).unwrap();
        let b = pre.preprocess(CanonicalBand::NARROW_NIR, None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pre.runs(), 1);
    }

    #[test]
    fn unmapped_band_is_unavailable() {
        let pre = preprocessor(PipelineParams::default());
        assert!(matches!(
            pre.preprocess(CanonicalBand::BLUE, None),
            Err(Error::BandUnavailable { band: CanonicalBand::BLUE, .. })
        ));
    }

    #[test]
    fn cancelled_runs_are_not_cached() {
        let pre = preprocessor(PipelineParams::default());
        pre.cancel_flag().store(true, Ordering::SeqCst);
        assert!(matches!(
            pre.preprocess(CanonicalBand::RED, None),
            Err(Error::Cancelled(_))
        ));
        pre.cancel_flag().store(false, Ordering::SeqCst);
        // RED (S2) has no radiance in the fake product
        assert!(pre.preprocess(CanonicalBand::RED, None).is_err());
    }

    #[test]
    fn invalid_profile_fails_at_construction() {
        let params = PipelineParams {
            calibration: "NOPE".into(),
            ..Default::default()
        };
        let config = ProductConfig::from_name(NAME, "an").unwrap();
        let err = Preprocessor::new(
            config,
            &params,
            Arc::new(source()),
            Arc::new(IdentityWarper),
            Arc::new(ConnectedComponentSieve),
        );
        assert!(matches!(err, Err(Error::InvalidCalibrationProfile { .. })));
    }

    const OLCI: &str =
        "S3A_OL_1_EFR____20191215T105023_20191215T105323_20191216T153115_0179_052_322_2160_LN1_O_NT_002.SEN3";

    fn olci_source() -> MapSource {
        let dim = (4, 4);
        let mut vars = HashMap::new();
        vars.insert("Oa08_radiance".into(), Array2::from_elem(dim, 100.0));
        // one row per band, Oa08 on row 7
        let flux = Array2::from_shape_fn((21, 2), |(r, _)| if r == 7 { 1500.0 } else { 1000.0 });
        vars.insert("solar_flux".into(), flux);
        // tie columns 0 and 64, one tie row per image row
        vars.insert("SZA".into(), Array2::from_elem((4, 2), 60.0));
        vars.insert("longitude".into(), lon_grid(dim));
        vars.insert("latitude".into(), lat_grid(dim));
        let mut quality = Array2::zeros(dim);
        quality[[0, 0]] = f64::from(1u32 << 13);
        // saturation of Oa09 does not concern Oa08
        quality[[1, 1]] = f64::from(1u32 << 12);
        quality[[3, 3]] = f64::from(1u32 << 25);
        vars.insert("quality_flags".into(), quality);
        MapSource(vars)
    }

    #[test]
    fn olci_band_uses_its_flux_row_and_quality_bits() {
        let params = PipelineParams::default();
        let config = ProductConfig::from_name(OLCI, &params.suffix).unwrap();
        let pre = Preprocessor::new(
            config,
            &params,
            Arc::new(olci_source()),
            Arc::new(IdentityWarper),
            Arc::new(ConnectedComponentSieve),
        )
        .unwrap();
        let red = pre.preprocess(CanonicalBand::RED, None).unwrap();
        assert_eq!(red.name, "Oa08");
        // π · 100 / (1500 · cos 60°), no adjustment for OLCI channels
        let expected = std::f64::consts::PI * 100.0 / 750.0;
        assert!((red.data[[2, 1]] - expected).abs() < 1e-9);
        // single flagged pixels survive: quality flags are not sieved
        assert!(red.mask[[0, 0]]);
        assert!(red.mask[[3, 3]]);
        assert!(!red.mask[[1, 1]]);
        assert_eq!(red.valid_count(), 14);
    }

    #[test]
    fn persisted_name_carries_crs_and_profile() {
        let dir = Path::new("/out");
        let pre = |crs: &str| {
            let params = PipelineParams {
                target_crs: Some(crs.to_string()),
                output_dir: Some(dir.to_path_buf()),
                custom_coefficients: Some([("S3_n".to_string(), 2.0)].into()),
                ..Default::default()
            };
            preprocessor(params)
        };
        let utm = pre("EPSG:32631").band_file(CanonicalBand::NIR, None).unwrap();
        let wgs = pre("EPSG:4326").band_file(CanonicalBand::NIR, None).unwrap();
        assert_ne!(utm, wgs);
        let name = utm.unwrap().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("20200101T101010_S3_SLSTR_RBT_S3_an_300m_EPSG32631_CUSTOM_"));
        assert!(preprocessor(PipelineParams::default())
            .band_file(CanonicalBand::NIR, None)
            .unwrap()
            .is_none());
    }
}
