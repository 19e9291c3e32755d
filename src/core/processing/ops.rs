use ndarray::{Array2, Zip};

/// Element-wise ratio: a / b, NaN where b is zero
pub fn safe_div(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let mut result = Array2::zeros(a.dim());
    Zip::from(a).and(b).and(&mut result).for_each(|&a_val, &b_val, res| {
        *res = if b_val == 0.0 { f64::NAN } else { a_val / b_val };
    });
    result
}

/// Normalized difference: (a - b) / (a + b), NaN where the sum is zero
pub fn norm_diff(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let mut result = Array2::zeros(a.dim());
    Zip::from(a).and(b).and(&mut result).for_each(|&a_val, &b_val, res| {
        let sum = a_val + b_val;
        *res = if sum == 0.0 { f64::NAN } else { (a_val - b_val) / sum };
    });
    result
}

/// Element-wise power; invalid results (negative base, fractional exponent) are NaN
pub fn pow(a: &Array2<f64>, exp: f64) -> Array2<f64> {
    a.mapv(|v| v.powf(exp))
}

/// Element-wise square root; negative inputs become NaN
pub fn sqrt(a: &Array2<f64>) -> Array2<f64> {
    a.mapv(f64::sqrt)
}

/// Percentile `q` (0..=100) of the finite values, linear interpolation between
/// closest ranks. `None` when no finite value exists.
pub fn nan_percentile(a: &Array2<f64>, q: f64) -> Option<f64> {
    let mut values: Vec<f64> = a.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let rank = (q / 100.0).clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(values[lo] + (values[hi] - values[lo]) * frac)
}

/// Mean of the finite values, `None` when there are none
pub fn nan_mean(a: &Array2<f64>) -> Option<f64> {
    let (sum, count) = a
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn zero_denominators_become_nan() {
        let a = array![[1.0, 2.0]];
        let b = array![[0.0, 4.0]];
        let r = safe_div(&a, &b);
        assert!(r[[0, 0]].is_nan());
        assert_eq!(r[[0, 1]], 0.5);

        let nd = norm_diff(&array![[1.0, 0.0]], &array![[-1.0, 0.0]]);
        assert!(nd[[0, 0]].is_nan());
        assert!(nd[[0, 1]].is_nan());
    }

    #[test]
    fn percentile_matches_linear_rank() {
        let a = array![[1.0, 2.0, f64::NAN], [3.0, 4.0, 5.0]];
        assert_eq!(nan_percentile(&a, 50.0), Some(3.0));
        assert_eq!(nan_percentile(&a, 100.0), Some(5.0));
        // rank 0.99 * 4 = 3.96
        let p99 = nan_percentile(&a, 99.0).unwrap();
        assert!((p99 - 4.96).abs() < 1e-12);
        assert_eq!(nan_percentile(&array![[f64::NAN]], 99.0), None);
    }

    #[test]
    fn nan_mean_ignores_nan() {
        assert_eq!(nan_mean(&array![[1.0, f64::NAN, 3.0]]), Some(2.0));
        assert_eq!(nan_mean(&array![[f64::NAN]]), None);
    }
}
