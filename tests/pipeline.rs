//! End-to-end preprocessing over an in-memory SLSTR product and a warp that
//! keeps the sensor grid, so every stage runs without GDAL tools.
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array2;

use eoprep::api::Product;
use eoprep::core::processing::geocode::{WarpRequest, Warper};
use eoprep::core::processing::mask::ConnectedComponentSieve;
use eoprep::core::processing::pipeline::ProductSource;
use eoprep::core::product::{Capabilities, ProductConfig, VarRef};
use eoprep::{CanonicalBand, CloudBand, Error, PipelineParams, RasterArray, SpatialMeta};

const NAME: &str =
    "S3B_SL_1_RBT____20191115T233722_20191115T234022_20191117T031722_0179_032_144_3420_LN2_O_NT_003.SEN3";
const DIM: (usize, usize) = (6, 6);

struct MemoryProduct {
    vars: HashMap<String, Array2<f64>>,
}

impl ProductSource for MemoryProduct {
    fn read(&self, var: &VarRef) -> eoprep::Result<Array2<f64>> {
        self.vars
            .get(&var.variable)
            .cloned()
            .ok_or_else(|| Error::Processing(format!("no variable {var}")))
    }

    fn has(&self, var: &VarRef) -> bool {
        self.vars.contains_key(&var.variable)
    }
}

#[derive(Default)]
struct SensorGridWarper {
    calls: AtomicUsize,
}

impl Warper for SensorGridWarper {
    fn warp_gcps(&self, req: &WarpRequest<'_>) -> eoprep::Result<RasterArray> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let meta = SpatialMeta {
            resolution: (req.resolution, -req.resolution),
            crs: Some(req.target_crs.to_string()),
            geotransform: [500000.0, req.resolution, 0.0, 5300000.0, 0.0, -req.resolution],
            nodata: Some(req.nodata),
        };
        Ok(RasterArray::new(req.name, req.source.clone(), meta))
    }
}

fn memory_product() -> MemoryProduct {
    let mut vars = HashMap::new();
    let mut put = |name: &str, a: Array2<f64>| {
        vars.insert(name.to_string(), a);
    };
    put("S2_radiance_an", Array2::from_elem(DIM, 50.0));
    put("S3_radiance_an", Array2::from_elem(DIM, 100.0));
    put("S2_solar_irradiance_an", Array2::from_elem((1, 4), 1000.0));
    put("S3_solar_irradiance_an", Array2::from_elem((1, 4), 1000.0));
    let mut exception = Array2::zeros(DIM);
    exception[[0, 0]] = 4.0;
    put("S2_exception_an", exception);
    put("S3_exception_an", Array2::zeros(DIM));
    put("longitude_an", Array2::from_shape_fn(DIM, |(_, c)| 2.0 + c as f64 * 0.005));
    put("latitude_an", Array2::from_shape_fn(DIM, |(r, _)| 48.0 - r as f64 * 0.005));
    put("solar_zenith_tn", Array2::from_elem((3, 3), 60.0));
    put("x_tx", Array2::from_shape_fn((3, 3), |(_, c)| c as f64 * 3.0));
    put("y_tx", Array2::from_shape_fn((3, 3), |(r, _)| r as f64 * 3.0));
    put("x_an", Array2::from_shape_fn(DIM, |(_, c)| c as f64));
    put("y_an", Array2::from_shape_fn(DIM, |(r, _)| r as f64));
    // a 4x4 cirrus block and a lone bit-0 pixel
    let mut clouds = Array2::zeros(DIM);
    for r in 1..5 {
        for c in 1..5 {
            clouds[[r, c]] = 256.0;
        }
    }
    clouds[[5, 5]] = 1.0;
    put("cloud_an", clouds);
    MemoryProduct { vars }
}

fn open(params: &PipelineParams) -> (Product, Arc<SensorGridWarper>) {
    let warper = Arc::new(SensorGridWarper::default());
    let config = ProductConfig::from_name(NAME, &params.suffix).unwrap();
    let product = Product::with_source(
        config,
        params,
        Arc::new(memory_product()),
        warper.clone(),
        Arc::new(ConnectedComponentSieve),
    )
    .unwrap();
    (product, warper)
}

fn uncalibrated() -> PipelineParams {
    PipelineParams {
        calibration: "NONE".into(),
        ..Default::default()
    }
}

#[test]
fn ndvi_from_preprocessed_bands() {
    let (product, _) = open(&uncalibrated());
    let ndvi = product.compute_index("NDVI").unwrap();
    assert_eq!(ndvi.name, "NDVI");
    assert_eq!(ndvi.meta.crs.as_deref(), Some("EPSG:32631"));
    assert!((ndvi.data[[3, 3]] - 1.0 / 3.0).abs() < 1e-9);
    // RED exception flag propagates to the index
    assert!(ndvi.mask[[0, 0]]);
    assert_eq!(ndvi.valid_count(), 35);
}

#[test]
fn control_points_are_built_once_per_grid() {
    let (product, warper) = open(&uncalibrated());
    product.preprocess(CanonicalBand::RED).unwrap();
    product.preprocess(CanonicalBand::NIR).unwrap();
    product.preprocess(CanonicalBand::NARROW_NIR).unwrap();
    assert_eq!(product.preprocessor().geocoder().gcp_builds(), 1);
    // two bands and their exception flags
    assert_eq!(warper.calls.load(Ordering::SeqCst), 4);
    assert_eq!(product.preprocessor().runs(), 2);
}

#[test]
fn unavailable_band_fails_before_any_read() {
    let (product, warper) = open(&uncalibrated());
    match product.compute_index("GLI") {
        Err(Error::BandUnavailable { band, .. }) => assert_eq!(band, CanonicalBand::BLUE),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(warper.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn cloud_bands_are_decoded_and_sieved() {
    let (product, _) = open(&PipelineParams::default());
    assert!(product.has_cloud_band(CloudBand::CIRRUS));

    let cirrus = product.load_clouds(CloudBand::CIRRUS).unwrap();
    assert_eq!(cirrus.data.sum(), 16.0);

    // the lone bit-0 pixel is below the minimum cluster size
    let clouds = product.load_clouds(CloudBand::CLOUDS).unwrap();
    assert_eq!(clouds.data.sum(), 0.0);

    let raw = product.load_clouds(CloudBand::RAW_CLOUDS).unwrap();
    assert_eq!(raw.data[[5, 5]], 1.0);
    assert_eq!(raw.name, "RAW_CLOUDS");
}

#[test]
fn cancellation_stops_a_band_run() {
    let (product, _) = open(&uncalibrated());
    let flag = product.preprocessor().cancel_flag();
    flag.store(true, Ordering::SeqCst);
    assert!(matches!(
        product.preprocess(CanonicalBand::NIR),
        Err(Error::Cancelled(_))
    ));
    flag.store(false, Ordering::SeqCst);
    assert!(product.preprocess(CanonicalBand::NIR).is_ok());
}

#[test]
fn persisted_bands_are_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let params = PipelineParams {
        output_dir: Some(dir.path().to_path_buf()),
        ..uncalibrated()
    };
    let (first, _) = open(&params);
    let nir = first.preprocess(CanonicalBand::NIR).unwrap();
    let expected = dir
        .path()
        .join("20191115T233722_S3_SLSTR_RBT_S3_an_300m_EPSG32631_NONE.tif");
    assert!(expected.is_file());
    assert_eq!(first.band_file(CanonicalBand::NIR).unwrap(), Some(expected));

    let (second, warper) = open(&params);
    let again = second.preprocess(CanonicalBand::NIR).unwrap();
    assert_eq!(second.preprocessor().runs(), 0);
    assert_eq!(warper.calls.load(Ordering::SeqCst), 0);
    assert_eq!(again.shape(), nir.shape());
    assert!((again.data[[2, 2]] - nir.data[[2, 2]]).abs() < 1e-6);
}

#[test]
fn persisted_bands_are_not_shared_across_profiles_or_crs() {
    let dir = tempfile::tempdir().unwrap();
    let base = PipelineParams {
        output_dir: Some(dir.path().to_path_buf()),
        ..uncalibrated()
    };
    let (first, _) = open(&base);
    let plain = first.preprocess(CanonicalBand::NIR).unwrap();

    let custom = PipelineParams {
        custom_coefficients: Some([("S3_n".to_string(), 2.0)].into()),
        ..base.clone()
    };
    let (second, _) = open(&custom);
    let doubled = second.preprocess(CanonicalBand::NIR).unwrap();
    assert_eq!(second.preprocessor().runs(), 1);
    assert!((doubled.data[[2, 2]] - 2.0 * plain.data[[2, 2]]).abs() < 1e-9);
    assert_ne!(
        first.band_file(CanonicalBand::NIR).unwrap(),
        second.band_file(CanonicalBand::NIR).unwrap()
    );

    let other_crs = PipelineParams {
        target_crs: Some("EPSG:32632".to_string()),
        ..base
    };
    let (third, _) = open(&other_crs);
    let reprojected = third.preprocess(CanonicalBand::NIR).unwrap();
    assert_eq!(third.preprocessor().runs(), 1);
    assert_eq!(reprojected.meta.crs.as_deref(), Some("EPSG:32632"));
}
