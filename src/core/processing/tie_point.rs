//! Tie-point resampling: interpolate a coarse auxiliary grid (sun angles, ...)
//! up to full image resolution with a bicubic interpolating spline.
//!
//! The spline uses not-a-knot end conditions on both axes, so it reproduces
//! cubic polynomials exactly and extrapolates with the end pieces outside the
//! tie-point hull. Coarse along-track sampling makes extrapolation routine.
use ndarray::{Array2, Zip};
use tracing::debug;

use crate::error::{Error, Result};

/// Piecewise cubic, one `[a, b, c, d]` per interval: `a + b·t + c·t² + d·t³`
/// with `t` measured from the interval's left knot.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    knots: Vec<f64>,
    coeffs: Vec<[f64; 4]>,
}

impl CubicSpline {
    /// Interpolating spline through `(x[i], y[i])`. `x` must be strictly increasing.
    ///
    /// Fewer than four points degrade gracefully: three give the parabola
    /// through them, two a line, one a constant.
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        let n = x.len();
        if n == 0 || n != y.len() {
            return Err(Error::InvalidTiePointGrid(format!(
                "spline needs matching non-empty knots and values, got {} and {}",
                n,
                y.len()
            )));
        }
        if n == 1 {
            return Ok(Self {
                knots: x.to_vec(),
                coeffs: vec![[y[0], 0.0, 0.0, 0.0]],
            });
        }

        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let d: Vec<f64> = y
            .windows(2)
            .zip(&h)
            .map(|(w, &hi)| (w[1] - w[0]) / hi)
            .collect();

        let m = second_derivatives(&h, &d);
        let coeffs = (0..n - 1)
            .map(|i| {
                [
                    y[i],
                    d[i] - h[i] * (2.0 * m[i] + m[i + 1]) / 6.0,
                    m[i] / 2.0,
                    (m[i + 1] - m[i]) / (6.0 * h[i]),
                ]
            })
            .collect();

        Ok(Self {
            knots: x.to_vec(),
            coeffs,
        })
    }

    pub fn eval(&self, x: f64) -> f64 {
        let (k, t) = locate(&self.knots, self.coeffs.len(), x);
        horner(&self.coeffs[k], t)
    }
}

/// Second derivatives at the knots under not-a-knot end conditions
fn second_derivatives(h: &[f64], d: &[f64]) -> Vec<f64> {
    let n = h.len() + 1;
    match n {
        2 => vec![0.0; 2],
        3 => {
            let m = 2.0 * (d[1] - d[0]) / (h[0] + h[1]);
            vec![m; 3]
        }
        _ => {
            // Tridiagonal system over the interior knots 1..=n-2; the first and
            // last rows absorb M0 and M(n-1) through the not-a-knot relation.
            let size = n - 2;
            let mut sub = vec![0.0; size];
            let mut diag = vec![0.0; size];
            let mut sup = vec![0.0; size];
            let mut rhs = vec![0.0; size];
            for r in 0..size {
                let i = r + 1;
                sub[r] = h[i - 1];
                diag[r] = 2.0 * (h[i - 1] + h[i]);
                sup[r] = h[i];
                rhs[r] = 6.0 * (d[i] - d[i - 1]);
            }
            let (h0, h1) = (h[0], h[1]);
            diag[0] = (h0 + h1) * (h0 + 2.0 * h1) / h1;
            sup[0] = (h1 * h1 - h0 * h0) / h1;
            let (a, b) = (h[n - 3], h[n - 2]);
            sub[size - 1] = (a * a - b * b) / a;
            diag[size - 1] = (a + b) * (2.0 * a + b) / a;

            let interior = solve_tridiagonal(&sub, &diag, &sup, &rhs);
            let mut m = Vec::with_capacity(n);
            m.push(interior[0] * (1.0 + h0 / h1) - interior[1] * h0 / h1);
            m.extend_from_slice(&interior);
            let last = interior[size - 1] * (1.0 + b / a) - interior[size - 2] * b / a;
            m.push(last);
            m
        }
    }
}

/// Thomas algorithm; `sub[0]` and `sup[len-1]` are ignored
fn solve_tridiagonal(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut r = vec![0.0; n];
    c[0] = sup[0] / diag[0];
    r[0] = rhs[0] / diag[0];
    for i in 1..n {
        let denom = diag[i] - sub[i] * c[i - 1];
        c[i] = sup[i] / denom;
        r[i] = (rhs[i] - sub[i] * r[i - 1]) / denom;
    }
    let mut x = vec![0.0; n];
    x[n - 1] = r[n - 1];
    for i in (0..n - 1).rev() {
        x[i] = r[i] - c[i] * x[i + 1];
    }
    x
}

/// Piece index and local offset of `v`; values beyond the ends use the end pieces
fn locate(knots: &[f64], pieces: usize, v: f64) -> (usize, f64) {
    let k = knots
        .partition_point(|&k| k <= v)
        .saturating_sub(1)
        .min(pieces - 1);
    (k, v - knots[k])
}

fn horner(c: &[f64; 4], t: f64) -> f64 {
    c[0] + t * (c[1] + t * (c[2] + t * c[3]))
}

/// Tensor-product bicubic interpolating spline over a rectilinear grid
#[derive(Debug, Clone)]
pub struct BicubicSpline {
    ys: Vec<f64>,
    xs: Vec<f64>,
    x_pieces: usize,
    y_pieces: usize,
    /// `cells[l * x_pieces + k][q][p]` multiplies `s^q · t^p`
    cells: Vec<[[f64; 4]; 4]>,
}

impl BicubicSpline {
    /// `values[[j, i]]` is the sample at `(ys[j], xs[i])`; both axes strictly increasing
    pub fn fit(ys: &[f64], xs: &[f64], values: &Array2<f64>) -> Result<Self> {
        if values.dim() != (ys.len(), xs.len()) || ys.is_empty() || xs.is_empty() {
            return Err(Error::InvalidTiePointGrid(format!(
                "{:?} samples do not match axes of length ({}, {})",
                values.dim(),
                ys.len(),
                xs.len()
            )));
        }
        let rows = values
            .rows()
            .into_iter()
            .map(|row| CubicSpline::fit(xs, &row.to_vec()))
            .collect::<Result<Vec<_>>>()?;
        let x_pieces = rows[0].coeffs.len();
        let y_pieces = ys.len().saturating_sub(1).max(1);

        let mut cells = vec![[[0.0; 4]; 4]; x_pieces * y_pieces];
        let mut column = vec![0.0; ys.len()];
        for k in 0..x_pieces {
            for p in 0..4 {
                for (j, row) in rows.iter().enumerate() {
                    column[j] = row.coeffs[k][p];
                }
                let along_y = CubicSpline::fit(ys, &column)?;
                for (l, yc) in along_y.coeffs.iter().enumerate() {
                    for q in 0..4 {
                        cells[l * x_pieces + k][q][p] = yc[q];
                    }
                }
            }
        }

        Ok(Self {
            ys: ys.to_vec(),
            xs: xs.to_vec(),
            x_pieces,
            y_pieces,
            cells,
        })
    }

    pub fn eval(&self, y: f64, x: f64) -> f64 {
        let (l, s) = locate(&self.ys, self.y_pieces, y);
        let (k, t) = locate(&self.xs, self.x_pieces, x);
        let cell = &self.cells[l * self.x_pieces + k];
        let mut acc = 0.0;
        for q in (0..4).rev() {
            acc = acc * s + horner(&cell[q], t);
        }
        acc
    }
}

/// A coarse grid of samples and its row (y) and column (x) coordinate axes
#[derive(Debug, Clone, PartialEq)]
pub struct TiePointGrid {
    pub values: Array2<f64>,
    pub y_axis: Vec<f64>,
    pub x_axis: Vec<f64>,
}

enum Order {
    Increasing,
    Decreasing,
}

fn axis_order(axis: &[f64], name: &str) -> Result<Order> {
    if axis.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidTiePointGrid(format!(
            "{name} axis holds non-finite coordinates"
        )));
    }
    if axis.windows(2).all(|w| w[1] > w[0]) {
        Ok(Order::Increasing)
    } else if axis.windows(2).all(|w| w[1] < w[0]) {
        Ok(Order::Decreasing)
    } else {
        Err(Error::InvalidTiePointGrid(format!(
            "{name} axis is not strictly monotonic"
        )))
    }
}

impl TiePointGrid {
    pub fn new(values: Array2<f64>, y_axis: Vec<f64>, x_axis: Vec<f64>) -> Result<Self> {
        let (rows, cols) = values.dim();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidTiePointGrid("empty grid".to_string()));
        }
        if y_axis.len() != rows || x_axis.len() != cols {
            return Err(Error::InvalidTiePointGrid(format!(
                "axes of length ({}, {}) do not match a {}x{} grid",
                y_axis.len(),
                x_axis.len(),
                rows,
                cols
            )));
        }
        Ok(Self {
            values,
            y_axis,
            x_axis,
        })
    }

    /// Grid whose axes come from 2-D cartesian coordinate rasters: x from the
    /// first row of `x_coords`, y from the first column of `y_coords`
    pub fn from_cartesian(
        values: Array2<f64>,
        x_coords: &Array2<f64>,
        y_coords: &Array2<f64>,
    ) -> Result<Self> {
        if x_coords.nrows() == 0 || y_coords.ncols() == 0 {
            return Err(Error::InvalidTiePointGrid(
                "empty cartesian coordinates".to_string(),
            ));
        }
        let x_axis = x_coords.row(0).to_vec();
        let y_axis = y_coords.column(0).to_vec();
        Self::new(values, y_axis, x_axis)
    }

    /// Same grid with both axes strictly increasing, flipping the samples
    /// along every axis that had to be reversed
    pub fn ascending(&self) -> Result<Self> {
        let mut grid = self.clone();
        if let Order::Decreasing = axis_order(&grid.y_axis, "row")? {
            grid.y_axis.reverse();
            grid.values.invert_axis(ndarray::Axis(0));
        }
        if let Order::Decreasing = axis_order(&grid.x_axis, "column")? {
            grid.x_axis.reverse();
            grid.values.invert_axis(ndarray::Axis(1));
        }
        Ok(grid)
    }
}

/// Evaluate the tie-point grid at every target pixel's cartesian `(y, x)`.
///
/// No-data samples are filled with 0 before fitting, and any output landing
/// exactly on 0 is reported as NaN rather than a false zero.
pub fn resample_to_grid(
    grid: &TiePointGrid,
    target_y: &Array2<f64>,
    target_x: &Array2<f64>,
) -> Result<Array2<f64>> {
    if target_y.dim() != target_x.dim() {
        return Err(Error::ShapeMismatch {
            what: "target cartesian x".to_string(),
            expected: target_y.dim(),
            got: target_x.dim(),
        });
    }
    let grid = grid.ascending()?;
    let filled = grid.values.mapv(|v| if v.is_nan() { 0.0 } else { v });
    let spline = BicubicSpline::fit(&grid.y_axis, &grid.x_axis, &filled)?;
    debug!(
        "Resampling {:?} tie-point grid to {:?}",
        grid.values.dim(),
        target_y.dim()
    );

    let mut out = Array2::<f64>::zeros(target_y.dim());
    Zip::from(&mut out)
        .and(target_y)
        .and(target_x)
        .par_for_each(|o, &y, &x| {
            let v = spline.eval(y, x);
            *o = if v == 0.0 { f64::NAN } else { v };
        });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn sample(ys: &[f64], xs: &[f64], f: impl Fn(f64, f64) -> f64) -> Array2<f64> {
        Array2::from_shape_fn((ys.len(), xs.len()), |(j, i)| f(ys[j], xs[i]))
    }

    #[test]
    fn spline_reproduces_cubics() {
        let x = [0.0, 1.0, 2.5, 3.0, 4.5, 6.0];
        let y: Vec<f64> = x.iter().map(|v| v * v * v - 2.0 * v + 1.0).collect();
        let s = CubicSpline::fit(&x, &y).unwrap();
        for v in [0.3, 1.7, 2.9, 5.2, 7.0, -1.0] {
            let expected = v * v * v - 2.0 * v + 1.0;
            assert!((s.eval(v) - expected).abs() < 1e-8, "at {v}");
        }
    }

    #[test]
    fn short_axes_degrade_to_lower_order() {
        let s = CubicSpline::fit(&[0.0, 1.0, 3.0], &[1.0, 2.0, 10.0]).unwrap();
        // parabola through the three points: x² + 1
        assert!((s.eval(2.0) - 5.0).abs() < 1e-12);
        let s = CubicSpline::fit(&[0.0, 2.0], &[0.0, 4.0]).unwrap();
        assert!((s.eval(3.0) - 6.0).abs() < 1e-12);
        let s = CubicSpline::fit(&[5.0], &[3.0]).unwrap();
        assert_eq!(s.eval(-10.0), 3.0);
    }

    #[test]
    fn bicubic_matches_smooth_surface_with_extrapolation() {
        let ys = [0.0, 10.0, 20.0, 30.0, 40.0];
        let xs = [-5.0, 0.0, 5.0, 10.0, 15.0, 20.0];
        let f = |y: f64, x: f64| 0.5 * x + 0.2 * y + 0.01 * x * y + 3.0;
        let grid = TiePointGrid::new(sample(&ys, &xs, f), ys.to_vec(), xs.to_vec()).unwrap();

        let ty = Array2::from_shape_fn((3, 4), |(j, _)| -4.0 + 22.0 * j as f64);
        let tx = Array2::from_shape_fn((3, 4), |(_, i)| -8.0 + 9.0 * i as f64);
        let out = resample_to_grid(&grid, &ty, &tx).unwrap();
        for ((j, i), v) in out.indexed_iter() {
            let expected = f(ty[[j, i]], tx[[j, i]]);
            assert!((v - expected).abs() < 1e-8, "({j},{i}) {v} vs {expected}");
        }
    }

    #[test]
    fn decreasing_axes_are_flipped() {
        let ys = [0.0, 1.0, 2.0, 3.0];
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let f = |y: f64, x: f64| 1.0 + x * x + y;
        let asc = TiePointGrid::new(sample(&ys, &xs, f), ys.to_vec(), xs.to_vec()).unwrap();

        let xs_desc: Vec<f64> = xs.iter().rev().copied().collect();
        let desc = TiePointGrid::new(sample(&ys, &xs_desc, f), ys.to_vec(), xs_desc).unwrap();

        let ty = Array2::from_elem((2, 2), 1.5);
        let tx = Array2::from_shape_vec((2, 2), vec![0.5, 1.5, 2.5, 3.5]).unwrap();
        let a = resample_to_grid(&asc, &ty, &tx).unwrap();
        let d = resample_to_grid(&desc, &ty, &tx).unwrap();
        for (va, vd) in a.iter().zip(d.iter()) {
            assert!((va - vd).abs() < 1e-10);
        }
    }

    #[test]
    fn non_monotonic_axis_is_rejected() {
        let grid = TiePointGrid::new(
            Array2::from_elem((3, 3), 1.0),
            vec![0.0, 2.0, 1.0],
            vec![0.0, 1.0, 2.0],
        )
        .unwrap();
        let t = Array2::from_elem((1, 1), 0.5);
        assert!(matches!(
            resample_to_grid(&grid, &t, &t),
            Err(Error::InvalidTiePointGrid(_))
        ));
    }

    #[test]
    fn exact_zero_becomes_nan_and_nan_samples_are_filled() {
        let axis = vec![0.0, 1.0, 2.0, 3.0];
        let zeros = TiePointGrid::new(Array2::zeros((4, 4)), axis.clone(), axis.clone()).unwrap();
        let t = Array2::from_elem((2, 2), 1.25);
        assert!(resample_to_grid(&zeros, &t, &t).unwrap().iter().all(|v| v.is_nan()));

        let mut values = Array2::from_elem((4, 4), 2.0);
        values[[3, 3]] = f64::NAN;
        let grid = TiePointGrid::new(values, axis.clone(), axis).unwrap();
        let out = resample_to_grid(&grid, &t, &t).unwrap();
        assert!(out.iter().all(|v| v.is_finite()));
    }
}
