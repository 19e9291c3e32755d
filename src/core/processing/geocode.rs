//! Geocoding of ungeoreferenced sensor grids through ground control points.
//!
//! Control points are sampled from the product's longitude / latitude /
//! elevation rasters of one grid (keyed by its suffix, e.g. `an`, `in`) and
//! cached for the lifetime of the [`Geocoder`]. The warp itself is a
//! thin-plate-spline GCP reprojection delegated to a [`Warper`].
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array2;
use tracing::{debug, info};

use crate::core::processing::cache::KeyedCache;
use crate::core::raster::RasterArray;
use crate::error::{Error, Result};
use crate::types::Resampling;

/// CRS of the geodetic rasters the control points are read from
pub const GCP_CRS: &str = "EPSG:4326";

/// Control points sampled along each image axis
pub const GCP_SAMPLES_PER_AXIS: usize = 21;

const MIN_GCPS: usize = 3;

/// One (pixel, geographic coordinate) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    /// Pixel-center row / column on the source grid
    pub row: f64,
    pub col: f64,
    pub lon: f64,
    pub lat: f64,
    pub elevation: f64,
}

/// Ordered control points of one grid identity
#[derive(Debug, Clone, PartialEq)]
pub struct GcpSet {
    pub grid: String,
    pub points: Vec<ControlPoint>,
}

impl GcpSet {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Longitude, latitude and elevation rasters of one grid
#[derive(Debug, Clone)]
pub struct GeodeticGrid {
    pub lon: Array2<f64>,
    pub lat: Array2<f64>,
    pub elevation: Array2<f64>,
}

fn sample_positions(len: usize, samples: usize) -> Vec<usize> {
    if len <= samples {
        return (0..len).collect();
    }
    let step = (len - 1) as f64 / (samples - 1) as f64;
    let mut idx: Vec<usize> = (0..samples).map(|i| (i as f64 * step).round() as usize).collect();
    idx.dedup();
    idx
}

/// Sample a regular lattice of control points from the geodetic rasters,
/// skipping lattice nodes whose coordinates are undefined
pub fn create_gcps(grid: &str, geodetic: &GeodeticGrid, samples_per_axis: usize) -> Result<GcpSet> {
    let shape = geodetic.lon.dim();
    if geodetic.lat.dim() != shape || geodetic.elevation.dim() != shape {
        return Err(Error::geocoding(
            grid,
            format!(
                "geodetic rasters disagree in shape: lon {:?}, lat {:?}, elevation {:?}",
                shape,
                geodetic.lat.dim(),
                geodetic.elevation.dim()
            ),
        ));
    }

    let samples = samples_per_axis.max(2);
    let rows = sample_positions(shape.0, samples);
    let cols = sample_positions(shape.1, samples);
    let mut points = Vec::with_capacity(rows.len() * cols.len());
    for &r in &rows {
        for &c in &cols {
            let (lon, lat) = (geodetic.lon[[r, c]], geodetic.lat[[r, c]]);
            if !lon.is_finite() || !lat.is_finite() {
                continue;
            }
            let elevation = geodetic.elevation[[r, c]];
            points.push(ControlPoint {
                row: r as f64 + 0.5,
                col: c as f64 + 0.5,
                lon,
                lat,
                elevation: if elevation.is_finite() { elevation } else { 0.0 },
            });
        }
    }

    if points.len() < MIN_GCPS {
        return Err(Error::geocoding(
            grid,
            format!(
                "only {} valid control points, at least {} needed",
                points.len(),
                MIN_GCPS
            ),
        ));
    }
    Ok(GcpSet {
        grid: grid.to_string(),
        points,
    })
}

/// Everything a GCP warp needs
pub struct WarpRequest<'a> {
    pub name: &'a str,
    pub source: &'a Array2<f64>,
    pub gcps: &'a GcpSet,
    pub source_crs: &'a str,
    pub target_crs: &'a str,
    pub resolution: f64,
    pub resampling: Resampling,
    pub nodata: f64,
}

/// Scattered-point reprojection capability
pub trait Warper: Send + Sync {
    /// Warp `source` into `target_crs` at `resolution` using the control points;
    /// uncovered output cells hold `nodata`
    fn warp_gcps(&self, request: &WarpRequest<'_>) -> Result<RasterArray>;
}

/// Geocodes rasters of one product, reusing control points per grid
pub struct Geocoder {
    warper: Arc<dyn Warper>,
    target_crs: String,
    nodata: f64,
    samples: usize,
    gcps: KeyedCache<String, Arc<GcpSet>>,
    gcp_builds: AtomicUsize,
}

impl Geocoder {
    pub fn new(warper: Arc<dyn Warper>, target_crs: impl Into<String>, nodata: f64) -> Self {
        Self {
            warper,
            target_crs: target_crs.into(),
            nodata,
            samples: GCP_SAMPLES_PER_AXIS,
            gcps: KeyedCache::new(),
            gcp_builds: AtomicUsize::new(0),
        }
    }

    /// Control points sampled along each axis of a geodetic grid
    pub fn with_gcp_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub fn target_crs(&self) -> &str {
        &self.target_crs
    }

    /// How many control-point sets have actually been built
    pub fn gcp_builds(&self) -> usize {
        self.gcp_builds.load(Ordering::SeqCst)
    }

    /// Control points of `grid`, built from `load` on first request only
    pub fn gcps<F>(&self, grid: &str, load: F) -> Result<Arc<GcpSet>>
    where
        F: FnOnce() -> Result<GeodeticGrid>,
    {
        self.gcps.get_or_try_init(&grid.to_string(), || {
            let geodetic = load().map_err(|e| Error::geocoding(grid, e))?;
            let set = create_gcps(grid, &geodetic, self.samples)?;
            self.gcp_builds.fetch_add(1, Ordering::SeqCst);
            debug!("Built {} control points for grid {}", set.len(), grid);
            Ok(Arc::new(set))
        })
    }

    /// Warp a raw sensor-grid array onto the target projection at `resolution`
    pub fn geocode<F>(
        &self,
        name: &str,
        band: &Array2<f64>,
        grid: &str,
        resolution: f64,
        resampling: Resampling,
        load: F,
    ) -> Result<RasterArray>
    where
        F: FnOnce() -> Result<GeodeticGrid>,
    {
        if resolution.is_nan() || resolution <= 0.0 {
            return Err(Error::InvalidArgument {
                arg: "resolution",
                value: resolution.to_string(),
            });
        }
        let gcps = self.gcps(grid, load)?;
        info!(
            "Geocoding {} on grid {} to {} at {} m",
            name, grid, self.target_crs, resolution
        );
        let request = WarpRequest {
            name,
            source: band,
            gcps: &gcps,
            source_crs: GCP_CRS,
            target_crs: &self.target_crs,
            resolution,
            resampling,
            nodata: self.nodata,
        };
        self.warper.warp_gcps(&request).map_err(|e| match e {
            Error::GeocodingFailure { .. } | Error::Cancelled(_) => e,
            other => Error::geocoding(grid, other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::raster::SpatialMeta;
    use ndarray::Array2;

    /// Deterministic stand-in: scales values by the number of control points
    struct ScalingWarper;

    impl Warper for ScalingWarper {
        fn warp_gcps(&self, req: &WarpRequest<'_>) -> Result<RasterArray> {
            let meta = SpatialMeta {
                resolution: (req.resolution, -req.resolution),
                crs: Some(req.target_crs.to_string()),
                nodata: Some(req.nodata),
                ..Default::default()
            };
            let data = req.source * req.gcps.len() as f64;
            Ok(RasterArray::new(req.name, data, meta))
        }
    }

    fn geodetic(rows: usize, cols: usize) -> GeodeticGrid {
        GeodeticGrid {
            lon: Array2::from_shape_fn((rows, cols), |(_, c)| 10.0 + c as f64 * 0.01),
            lat: Array2::from_shape_fn((rows, cols), |(r, _)| 45.0 - r as f64 * 0.01),
            elevation: Array2::zeros((rows, cols)),
        }
    }

    #[test]
    fn lattice_covers_corners_and_skips_nan() {
        let mut g = geodetic(50, 40);
        g.lon[[0, 0]] = f64::NAN;
        let set = create_gcps("an", &g, GCP_SAMPLES_PER_AXIS).unwrap();
        assert_eq!(set.len(), 21 * 21 - 1);
        let last = set.points.last().unwrap();
        assert_eq!((last.row, last.col), (49.5, 39.5));
    }

    #[test]
    fn too_few_points_is_a_geocoding_failure() {
        let mut g = geodetic(2, 2);
        g.lat[[0, 0]] = f64::NAN;
        g.lat[[1, 1]] = f64::NAN;
        match create_gcps("in", &g, GCP_SAMPLES_PER_AXIS) {
            Err(Error::GeocodingFailure { grid, .. }) => assert_eq!(grid, "in"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn geocode_twice_builds_gcps_once() {
        let geocoder = Geocoder::new(Arc::new(ScalingWarper), "EPSG:32631", -9999.0);
        let band = Array2::from_shape_fn((30, 30), |(r, c)| (r * 30 + c) as f64);

        let first = geocoder
            .geocode("S5", &band, "an", 500.0, Resampling::Bilinear, || Ok(geodetic(30, 30)))
            .unwrap();
        let second = geocoder
            .geocode("S5", &band, "an", 500.0, Resampling::Bilinear, || {
                panic!("control points must come from the cache")
            })
            .unwrap();

        assert_eq!(geocoder.gcp_builds(), 1);
        assert_eq!(first, second);
        assert_eq!(first.meta.crs.as_deref(), Some("EPSG:32631"));

        geocoder
            .geocode("S8", &band, "in", 1000.0, Resampling::Nearest, || Ok(geodetic(30, 30)))
            .unwrap();
        assert_eq!(geocoder.gcp_builds(), 2);
    }

    #[test]
    fn loader_failure_is_reported_per_grid() {
        let geocoder = Geocoder::new(Arc::new(ScalingWarper), "EPSG:4326", 0.0);
        let band = Array2::zeros((4, 4));
        let err = geocoder
            .geocode("S1", &band, "an", 300.0, Resampling::Bilinear, || {
                Err(Error::Processing("missing geodetic_an.nc".into()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::GeocodingFailure { ref grid, .. } if grid == "an"));
        assert_eq!(geocoder.gcp_builds(), 0);
    }
}
