//! Built-in spectral index formulas.
//!
//! Every formula is a pure function of canonical band arrays. Division by zero
//! and invalid roots yield NaN pixels, never errors.
use ndarray::{Array2, Zip};

use super::{Bands, IndexDefinition};
use crate::core::processing::ops::{nan_percentile, norm_diff, safe_div, sqrt};
use crate::error::Result;
use crate::types::CanonicalBand::{self, *};

/// `offset + Σ weight · band`
fn linear(b: &Bands<'_>, terms: &[(CanonicalBand, f64)], offset: f64) -> Result<Array2<f64>> {
    let mut acc = Array2::from_elem(b.dim(), offset);
    for &(band, weight) in terms {
        acc.scaled_add(weight, b.get(band)?);
    }
    Ok(acc)
}

fn rgi(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(safe_div(b.get(RED)?, b.get(GREEN)?))
}

fn ndvi(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(NIR)?, b.get(RED)?))
}

// Tasseled cap, Landsat TM coefficients
fn tcbri(b: &Bands<'_>) -> Result<Array2<f64>> {
    linear(
        b,
        &[
            (BLUE, 0.3037),
            (GREEN, 0.2793),
            (RED, 0.4743),
            (NIR, 0.5585),
            (SWIR_1, 0.5082),
            (SWIR_2, 0.1863),
        ],
        0.0,
    )
}

fn tcgre(b: &Bands<'_>) -> Result<Array2<f64>> {
    linear(
        b,
        &[
            (BLUE, -0.2848),
            (GREEN, -0.2435),
            (RED, -0.5436),
            (NIR, 0.7243),
            (SWIR_1, 0.0840),
            (SWIR_2, -0.1800),
        ],
        0.0,
    )
}

fn tcwet(b: &Bands<'_>) -> Result<Array2<f64>> {
    linear(
        b,
        &[
            (BLUE, 0.1509),
            (GREEN, 0.1973),
            (RED, 0.3279),
            (NIR, 0.3406),
            (SWIR_1, -0.7112),
            (SWIR_2, -0.4572),
        ],
        0.0,
    )
}

fn ndre2(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(NIR)?, b.get(VRE_1)?))
}

fn ndre3(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(NIR)?, b.get(VRE_2)?))
}

fn gli(b: &Bands<'_>) -> Result<Array2<f64>> {
    let num = linear(b, &[(GREEN, 2.0), (RED, -1.0), (BLUE, -1.0)], 0.0)?;
    let den = linear(b, &[(GREEN, 2.0), (RED, 1.0), (BLUE, 1.0)], 0.0)?;
    Ok(safe_div(&num, &den))
}

fn gndvi(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(NIR)?, b.get(GREEN)?))
}

fn ri(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(VRE_1)?, b.get(GREEN)?))
}

fn ndgri(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(GREEN)?, b.get(RED)?))
}

fn cig(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(safe_div(b.get(NIR)?, b.get(GREEN)?) - 1.0)
}

fn ndmi(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(NIR)?, b.get(SWIR_1)?))
}

fn dswi(b: &Bands<'_>) -> Result<Array2<f64>> {
    let num = b.get(NIR)? + b.get(GREEN)?;
    let den = b.get(SWIR_1)? + b.get(RED)?;
    Ok(safe_div(&num, &den))
}

fn srswir(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(safe_div(b.get(SWIR_1)?, b.get(SWIR_2)?))
}

fn rdi(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(safe_div(b.get(SWIR_2)?, b.get(NARROW_NIR)?))
}

fn ndwi(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(GREEN)?, b.get(NIR)?))
}

fn bai(b: &Bands<'_>) -> Result<Array2<f64>> {
    let mut out = Array2::zeros(b.dim());
    Zip::from(&mut out)
        .and(b.get(RED)?)
        .and(b.get(NIR)?)
        .for_each(|o, &red, &nir| {
            let den = (0.1 - red).powi(2) + (0.06 - nir).powi(2);
            *o = if den == 0.0 { f64::NAN } else { 1.0 / den };
        });
    Ok(out)
}

fn bais2(b: &Bands<'_>) -> Result<Array2<f64>> {
    let nnir = b.get(NARROW_NIR)?;
    let swir_2 = b.get(SWIR_2)?;
    let a = sqrt(&safe_div(&(b.get(VRE_2)? * b.get(VRE_3)? * nnir), b.get(RED)?));
    let c = safe_div(&(swir_2 - nnir), &sqrt(&(swir_2 + nnir)));
    Ok((1.0 - a) * (1.0 + c))
}

fn nbr(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(NARROW_NIR)?, b.get(SWIR_2)?))
}

fn mndwi(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(GREEN)?, b.get(SWIR_1)?))
}

fn awei_nsh(b: &Bands<'_>) -> Result<Array2<f64>> {
    linear(
        b,
        &[(GREEN, 4.0), (SWIR_1, -4.0), (NIR, -0.25), (SWIR_2, -2.75)],
        0.0,
    )
}

fn awei_sh(b: &Bands<'_>) -> Result<Array2<f64>> {
    linear(
        b,
        &[
            (BLUE, 1.0),
            (GREEN, 2.5),
            (NIR, -1.5),
            (SWIR_1, -1.5),
            (SWIR_2, -0.25),
        ],
        0.0,
    )
}

fn wi(b: &Bands<'_>) -> Result<Array2<f64>> {
    linear(
        b,
        &[
            (GREEN, 171.0),
            (RED, 3.0),
            (NIR, -70.0),
            (SWIR_1, -45.0),
            (SWIR_2, -71.0),
        ],
        1.7204,
    )
}

fn afri_1_6(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(NIR)?, &(b.get(SWIR_1)? * 0.66)))
}

// Published as 0.56 · SWIR_2; 0.5 is the catalogued coefficient
fn afri_2_1(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(NIR)?, &(b.get(SWIR_2)? * 0.5)))
}

fn bsi(b: &Bands<'_>) -> Result<Array2<f64>> {
    let a = b.get(RED)? + b.get(SWIR_1)?;
    let c = b.get(NIR)? + b.get(BLUE)?;
    Ok(norm_diff(&a, &c))
}

fn wv_wi(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(WV)?, b.get(CA)?))
}

fn wv_vi(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(WV)?, b.get(RED)?))
}

fn wv_si(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(YELLOW)?, b.get(GREEN)?))
}

fn wv_bi(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(b.get(VRE_1)?, b.get(CA)?))
}

/// Distance below the 99th percentile, clipped at 0; NaN stays NaN
fn below_p99(arr: &Array2<f64>) -> Array2<f64> {
    let p99 = nan_percentile(arr, 99.0).unwrap_or(f64::NAN);
    arr.mapv(|v| {
        let d = p99 - v;
        if d < 0.0 { 0.0 } else { d }
    })
}

// Percentile instead of maximum to discard outliers
fn si(b: &Bands<'_>) -> Result<Array2<f64>> {
    let green = below_p99(b.get(GREEN)?);
    let red = below_p99(b.get(RED)?);
    Ok(sqrt(&(green * red)))
}

fn gvmi(b: &Bands<'_>) -> Result<Array2<f64>> {
    Ok(norm_diff(&(b.get(NIR)? + 0.1), &(b.get(SWIR_2)? + 0.02)))
}

fn sbi(b: &Bands<'_>) -> Result<Array2<f64>> {
    let red = b.get(RED)?;
    let nir = b.get(NIR)?;
    Ok(sqrt(&(red * red + nir * nir)))
}

fn sci(b: &Bands<'_>) -> Result<Array2<f64>> {
    linear(b, &[(GREEN, 3.0), (RED, -1.0)], -100.0)
}

fn pani(b: &Bands<'_>) -> Result<Array2<f64>> {
    let red = b.get(RED)?;
    let green = b.get(GREEN)?;
    let blue = b.get(BLUE)?;
    Ok(sqrt(&(red * red + green * green + blue * blue)))
}

const TASSELED_CAP_BANDS: &[CanonicalBand] = &[BLUE, GREEN, RED, NIR, SWIR_1, SWIR_2];

/// The built-in catalog, in registration order
pub(super) fn builtin() -> Vec<IndexDefinition> {
    let def = IndexDefinition::new;
    vec![
        def("RGI", &[RED, GREEN], rgi, "Relative Greenness Index"),
        def("NDVI", &[NIR, RED], ndvi, "Normalized Difference Vegetation Index"),
        def("TCBRI", TASSELED_CAP_BANDS, tcbri, "Tasseled Cap Brightness"),
        def("TCGRE", TASSELED_CAP_BANDS, tcgre, "Tasseled Cap Greenness"),
        def("TCWET", TASSELED_CAP_BANDS, tcwet, "Tasseled Cap Wetness"),
        def("NDRE2", &[NIR, VRE_1], ndre2, "Normalized Difference Red-Edge (VRE_1)"),
        def("NDRE3", &[NIR, VRE_2], ndre3, "Normalized Difference Red-Edge (VRE_2)"),
        def("GLI", &[GREEN, RED, BLUE], gli, "Green Leaf Index"),
        def("GNDVI", &[NIR, GREEN], gndvi, "Green NDVI"),
        def("RI", &[VRE_1, GREEN], ri, "Redness Index"),
        def("NDGRI", &[GREEN, RED], ndgri, "Normalized Difference Green/Red Index"),
        def("CIG", &[NIR, GREEN], cig, "Chlorophyll Index Green"),
        def("NDMI", &[NIR, SWIR_1], ndmi, "Normalized Difference Moisture Index"),
        def("DSWI", &[NIR, GREEN, SWIR_1, RED], dswi, "Disease-Water Stress Index"),
        def("SRSWIR", &[SWIR_1, SWIR_2], srswir, "Simple Ratio SWIR_1/SWIR_2"),
        def("RDI", &[SWIR_2, NARROW_NIR], rdi, "Ratio Drought Index"),
        def("NDWI", &[GREEN, NIR], ndwi, "Normalized Difference Water Index"),
        def("BAI", &[RED, NIR], bai, "Burn Area Index"),
        def(
            "BAIS2",
            &[VRE_2, VRE_3, NARROW_NIR, RED, SWIR_2],
            bais2,
            "Burned Area Index for Sentinel-2",
        ),
        def("NBR", &[NARROW_NIR, SWIR_2], nbr, "Normalized Burn Ratio"),
        def("MNDWI", &[GREEN, SWIR_1], mndwi, "Modified NDWI"),
        def(
            "AWEInsh",
            &[GREEN, SWIR_1, NIR, SWIR_2],
            awei_nsh,
            "Automated Water Extraction Index (no shadow)",
        ),
        def(
            "AWEIsh",
            &[BLUE, GREEN, NIR, SWIR_1, SWIR_2],
            awei_sh,
            "Automated Water Extraction Index (shadow)",
        ),
        def("WI", &[GREEN, RED, NIR, SWIR_1, SWIR_2], wi, "Water Index (2015)"),
        def("AFRI_1_6", &[NIR, SWIR_1], afri_1_6, "Aerosol Free Vegetation Index 1.6 µm"),
        def("AFRI_2_1", &[NIR, SWIR_2], afri_2_1, "Aerosol Free Vegetation Index 2.1 µm"),
        def("BSI", &[RED, SWIR_1, NIR, BLUE], bsi, "Barren Soil Index"),
        def("WV_WI", &[WV, CA], wv_wi, "WorldView Water Index"),
        def("WV_VI", &[WV, RED], wv_vi, "WorldView Vegetation Index"),
        def("WV_SI", &[YELLOW, GREEN], wv_si, "WorldView Soil Index"),
        def("WV_BI", &[VRE_1, CA], wv_bi, "WorldView Built-Up Index"),
        def("SI", &[GREEN, RED], si, "Shadow Index"),
        def("GVMI", &[NIR, SWIR_2], gvmi, "Global Vegetation Moisture Index"),
        def("SBI", &[RED, NIR], sbi, "Soil Brightness Index"),
        def("SCI", &[GREEN, RED], sci, "Soil Cuirass Index"),
        def("PANI", &[RED, GREEN, BLUE], pani, "Panchromatic Index"),
    ]
}

#[cfg(test)]
mod tests {
    use super::super::evaluate_arrays;
    use super::*;
    use ndarray::array;
    use std::collections::BTreeMap;

    fn eval(name: &str, bands: &[(CanonicalBand, Array2<f64>)]) -> Array2<f64> {
        let inputs: BTreeMap<_, _> = bands.iter().cloned().collect();
        evaluate_arrays(name, &inputs).unwrap()
    }

    #[test]
    fn tasseled_cap_brightness_is_weighted_sum() {
        let one = array![[1.0]];
        let bands: Vec<_> = TASSELED_CAP_BANDS.iter().map(|&b| (b, one.clone())).collect();
        let out = eval("TCBRI", &bands);
        let expected = 0.3037 + 0.2793 + 0.4743 + 0.5585 + 0.5082 + 0.1863;
        assert!((out[[0, 0]] - expected).abs() < 1e-12);
    }

    #[test]
    fn shadow_index_clips_above_percentile() {
        let green = array![[0.1, 0.2, 0.3, 0.4, 10.0]];
        let red = array![[0.1, 0.2, 0.3, 0.4, 10.0]];
        let out = eval("SI", &[(GREEN, green), (RED, red)]);
        // the outlier sits above p99, clipped to 0
        assert_eq!(out[[0, 4]], 0.0);
        assert!(out[[0, 0]] > out[[0, 3]]);
    }

    #[test]
    fn zero_denominators_yield_nan() {
        let out = eval("RGI", &[(RED, array![[1.0]]), (GREEN, array![[0.0]])]);
        assert!(out[[0, 0]].is_nan());
        let out = eval("BAI", &[(RED, array![[0.1]]), (NIR, array![[0.06]])]);
        assert!(out[[0, 0]].is_nan());
    }

    #[test]
    fn soil_cuirass_and_afri() {
        let out = eval("SCI", &[(GREEN, array![[50.0]]), (RED, array![[20.0]])]);
        assert_eq!(out[[0, 0]], 30.0);
        let out = eval("AFRI_2_1", &[(NIR, array![[0.5]]), (SWIR_2, array![[0.5]])]);
        assert!((out[[0, 0]] - 0.25 / 0.75).abs() < 1e-12);
    }
}
