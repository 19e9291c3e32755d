//! `RasterArray`: the numeric array + spatial metadata value passed between
//! pipeline stages, and `Deferred`, a raster whose computation has not run yet.
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Spatial metadata carried alongside every raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialMeta {
    /// Pixel size (x, y) in CRS units
    pub resolution: (f64, f64),
    /// CRS as `EPSG:xxxx` or WKT; `None` for ungeoreferenced sensor grids
    pub crs: Option<String>,
    /// Affine geotransform coefficients
    /// ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    pub nodata: Option<f64>,
}

impl Default for SpatialMeta {
    fn default() -> Self {
        Self {
            resolution: (1.0, 1.0),
            crs: None,
            geotransform: [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            nodata: None,
        }
    }
}

/// A named 2-D raster with its invalid-pixel mask (true = invalid).
///
/// Masking never rewrites `data`: invalid pixels keep their value and are only
/// flagged in `mask`, so legitimate near-zero values survive.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterArray {
    pub name: String,
    pub data: Array2<f64>,
    pub mask: Array2<bool>,
    pub meta: SpatialMeta,
}

impl RasterArray {
    /// Build a raster; pixels equal to the no-data value (or NaN) start masked
    pub fn new(name: impl Into<String>, data: Array2<f64>, meta: SpatialMeta) -> Self {
        let mask = nodata_mask(&data, meta.nodata);
        Self {
            name: name.into(),
            data,
            mask,
            meta,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Same metadata and mask, new values
    pub fn with_data(&self, data: Array2<f64>) -> Result<Self> {
        if data.dim() != self.shape() {
            return Err(Error::ShapeMismatch {
                what: format!("data replacing {}", self.name),
                expected: self.shape(),
                got: data.dim(),
            });
        }
        Ok(Self {
            name: self.name.clone(),
            data,
            mask: self.mask.clone(),
            meta: self.meta.clone(),
        })
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Values with masked pixels replaced by NaN, for arithmetic
    pub fn filled_nan(&self) -> Array2<f64> {
        let mut out = self.data.clone();
        Zip::from(&mut out).and(&self.mask).for_each(|v, &m| {
            if m {
                *v = f64::NAN;
            }
        });
        out
    }

    /// Values with masked pixels replaced by the no-data value (NaN when none), for writing
    pub fn filled_nodata(&self) -> Array2<f64> {
        let fill = self.meta.nodata.unwrap_or(f64::NAN);
        let mut out = self.data.clone();
        Zip::from(&mut out).and(&self.mask).for_each(|v, &m| {
            if m {
                *v = fill;
            }
        });
        out
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|m| !**m).count()
    }
}

/// No-data mask of a value array: NaN or equal to the sentinel
pub fn nodata_mask(data: &Array2<f64>, nodata: Option<f64>) -> Array2<bool> {
    data.mapv(|v| v.is_nan() || nodata.is_some_and(|nd| v == nd))
}

/// A raster that is either already in memory or still waiting on its upstream
/// computation. Algorithms that need concrete pixels call [`Deferred::force`].
pub enum Deferred<'a, T> {
    Ready(Array2<T>),
    Pending(Box<dyn FnOnce() -> Result<Array2<T>> + Send + 'a>),
}

impl<'a, T> Deferred<'a, T> {
    pub fn pending<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<Array2<T>> + Send + 'a,
    {
        Deferred::Pending(Box::new(f))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Deferred::Ready(_))
    }

    /// Materialize the raster, running the upstream computation if needed
    pub fn force(self) -> Result<Array2<T>> {
        match self {
            Deferred::Ready(arr) => Ok(arr),
            Deferred::Pending(f) => f(),
        }
    }
}

impl<T> From<Array2<T>> for Deferred<'_, T> {
    fn from(arr: Array2<T>) -> Self {
        Deferred::Ready(arr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn nodata_and_nan_start_masked() {
        let meta = SpatialMeta {
            nodata: Some(-1.0),
            ..Default::default()
        };
        let r = RasterArray::new("b", array![[1.0, -1.0], [f64::NAN, 0.0]], meta);
        assert_eq!(r.mask, array![[false, true], [true, false]]);
        assert_eq!(r.valid_count(), 2);
    }

    #[test]
    fn filled_nan_keeps_unmasked_zeros() {
        let mut r = RasterArray::new("b", array![[0.0, 1e-9]], SpatialMeta::default());
        r.mask[[0, 1]] = true;
        let filled = r.filled_nan();
        assert_eq!(filled[[0, 0]], 0.0);
        assert!(filled[[0, 1]].is_nan());
        // source values are untouched
        assert_eq!(r.data[[0, 1]], 1e-9);
    }

    #[test]
    fn deferred_runs_upstream_on_force() {
        let d: Deferred<u32> = Deferred::pending(|| Ok(array![[7u32]]));
        assert!(!d.is_ready());
        assert_eq!(d.force().unwrap(), array![[7u32]]);
    }
}
