//! Quality and cloud masking from bit-encoded flag rasters.
//!
//! Selected bits are decoded into boolean conditions and OR-combined. Cloud
//! masks are then cleaned of speckle by a connected-component sieve. The result
//! is OR-ed with the band's no-data mask, so masks only ever grow: a pixel
//! invalid upstream stays invalid.
use std::collections::VecDeque;

use ndarray::{Array2, Zip};
use tracing::debug;

use crate::core::raster::{Deferred, RasterArray};
use crate::error::{Error, Result};
use crate::types::CloudBand;

/// Flagged clusters smaller than this many pixels are treated as noise
pub const MIN_CLUSTER_SIZE: usize = 10;

/// SLSTR exception values above this mark a defective pixel (1 and 2 are ISP flags)
pub const EXCEPTION_THRESHOLD: f64 = 2.0;

/// OLCI `quality_flags` invalid bit
pub const OLCI_INVALID_BIT: u8 = 25;

/// SLSTR cloud flag bit for thin cirrus
pub const CIRRUS_BIT: u8 = 8;

/// Number of meaningful SLSTR cloud bits (14 and 15 are spare)
pub const CLOUD_BITS: u8 = 14;

/// One boolean raster per requested bit, true where the bit is set
pub fn decode_bits(flags: &Array2<u32>, bit_ids: &[u8]) -> Result<Vec<Array2<bool>>> {
    bit_ids
        .iter()
        .map(|&bit| {
            if bit >= 32 {
                return Err(Error::InvalidArgument {
                    arg: "bit_id",
                    value: bit.to_string(),
                });
            }
            let probe = 1u32 << bit;
            Ok(flags.mapv(|v| v & probe != 0))
        })
        .collect()
}

/// Removal of small positive clusters from a boolean raster
pub trait Sieve: Send + Sync {
    fn sieve(&self, mask: &Array2<bool>, min_size: usize) -> Array2<bool>;
}

/// 4-connected component sieve
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectedComponentSieve;

impl Sieve for ConnectedComponentSieve {
    fn sieve(&self, mask: &Array2<bool>, min_size: usize) -> Array2<bool> {
        let (rows, cols) = mask.dim();
        let mut out = mask.clone();
        let mut seen = Array2::<bool>::from_elem((rows, cols), false);
        let mut queue = VecDeque::new();
        let mut component = Vec::new();
        let mut removed = 0usize;

        for start in ndarray::indices((rows, cols)) {
            if !mask[start] || seen[start] {
                continue;
            }
            seen[start] = true;
            queue.push_back(start);
            component.clear();
            while let Some((r, c)) = queue.pop_front() {
                component.push((r, c));
                let neighbours = [
                    (r.wrapping_sub(1), c),
                    (r + 1, c),
                    (r, c.wrapping_sub(1)),
                    (r, c + 1),
                ];
                for (nr, nc) in neighbours {
                    if nr < rows && nc < cols && mask[[nr, nc]] && !seen[[nr, nc]] {
                        seen[[nr, nc]] = true;
                        queue.push_back((nr, nc));
                    }
                }
            }
            if component.len() < min_size {
                removed += 1;
                for &idx in &component {
                    out[idx] = false;
                }
            }
        }
        if removed > 0 {
            debug!("Sieve removed {} clusters below {} px", removed, min_size);
        }
        out
    }
}

/// `sieve(OR(selected bits)) | nodata`, dropping flagged clusters smaller
/// than `min_size` pixels.
///
/// Deferred flag rasters are forced here: decoding and sieving need
/// materialized pixels.
pub fn build_mask(
    flags: Deferred<'_, u32>,
    bit_ids: &[u8],
    nodata: &Array2<bool>,
    sieve: &dyn Sieve,
    min_size: usize,
) -> Result<Array2<bool>> {
    let flagged = selected_bits(flags, bit_ids, nodata)?;
    let cleaned = sieve.sieve(&flagged, min_size);
    Ok(or_masks(&cleaned, nodata))
}

/// `OR(selected bits) | nodata` without sieving. Quality flags mark single
/// defective pixels, so no cluster is ever dropped.
pub fn flag_mask(
    flags: Deferred<'_, u32>,
    bit_ids: &[u8],
    nodata: &Array2<bool>,
) -> Result<Array2<bool>> {
    let flagged = selected_bits(flags, bit_ids, nodata)?;
    Ok(or_masks(&flagged, nodata))
}

fn selected_bits(
    flags: Deferred<'_, u32>,
    bit_ids: &[u8],
    nodata: &Array2<bool>,
) -> Result<Array2<bool>> {
    let flags = flags.force()?;
    if flags.dim() != nodata.dim() {
        return Err(Error::ShapeMismatch {
            what: "no-data mask".to_string(),
            expected: flags.dim(),
            got: nodata.dim(),
        });
    }
    Ok(any_of(&decode_bits(&flags, bit_ids)?, flags.dim()))
}

fn any_of(conditions: &[Array2<bool>], dim: (usize, usize)) -> Array2<bool> {
    let mut acc = Array2::from_elem(dim, false);
    for cond in conditions {
        Zip::from(&mut acc).and(cond).for_each(|a, &c| *a |= c);
    }
    acc
}

/// Element-wise OR of two masks of equal shape
pub fn or_masks(a: &Array2<bool>, b: &Array2<bool>) -> Array2<bool> {
    let mut out = a.clone();
    Zip::from(&mut out).and(b).for_each(|o, &v| *o |= v);
    out
}

/// Mark `mask` pixels invalid on the raster; values are left untouched
pub fn apply_mask(mut raster: RasterArray, mask: &Array2<bool>) -> Result<RasterArray> {
    if raster.shape() != mask.dim() {
        return Err(Error::ShapeMismatch {
            what: format!("mask applied to {}", raster.name),
            expected: raster.shape(),
            got: mask.dim(),
        });
    }
    Zip::from(&mut raster.mask).and(mask).for_each(|m, &v| *m |= v);
    Ok(raster)
}

/// Split a flag raster read as floats into integer flags and its no-data mask
pub fn split_flags(raster: &RasterArray) -> (Array2<u32>, Array2<bool>) {
    let flags = raster.data.mapv(|v| if v.is_finite() && v > 0.0 { v as u32 } else { 0 });
    (flags, raster.mask.clone())
}

/// SLSTR exception flags: any value beyond ISP-absent invalidates the pixel
pub fn exception_mask(exception: &Array2<f64>) -> Array2<bool> {
    exception.mapv(|v| v > EXCEPTION_THRESHOLD)
}

/// OLCI saturation bit of channel `Oa{n}`; bit 0 is Oa21, bit 20 is Oa01
pub fn olci_saturation_bit(channel: &str) -> Result<u8> {
    let n: u8 = channel
        .trim_start_matches("Oa")
        .parse()
        .ok()
        .filter(|n| (1..=21).contains(n))
        .ok_or_else(|| Error::InvalidArgument {
            arg: "channel",
            value: channel.to_string(),
        })?;
    Ok(21 - n)
}

/// Bits selected by a cloud band, `None` for the raw flag values
pub fn cloud_bits(band: CloudBand) -> Option<Vec<u8>> {
    match band {
        CloudBand::ALL_CLOUDS => Some((0..CLOUD_BITS).collect()),
        CloudBand::CLOUDS => Some((0..CLOUD_BITS).filter(|&b| b != CIRRUS_BIT).collect()),
        CloudBand::CIRRUS => Some(vec![CIRRUS_BIT]),
        CloudBand::RAW_CLOUDS => None,
    }
}

/// A cloud band raster: 1 where cloudy, 0 where clear, flag no-data masked.
/// RAW_CLOUDS returns the flag values themselves.
pub fn cloud_raster(
    flags: &RasterArray,
    band: CloudBand,
    sieve: &dyn Sieve,
    min_size: usize,
) -> Result<RasterArray> {
    let name = band.to_string();
    let Some(bits) = cloud_bits(band) else {
        return Ok(flags.clone().renamed(name));
    };
    let (raw, nodata) = split_flags(flags);
    let cloudy = build_mask(raw.into(), &bits, &nodata, sieve, min_size)?;
    let mut data = Array2::<f64>::zeros(cloudy.dim());
    Zip::from(&mut data)
        .and(&cloudy)
        .and(&nodata)
        .for_each(|d, &c, &n| *d = if c && !n { 1.0 } else { 0.0 });
    let mut out = flags.with_data(data)?.renamed(name);
    out.mask = nodata;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::raster::SpatialMeta;
    use ndarray::array;

    /// Leaves the condition untouched
    struct NoSieve;

    impl Sieve for NoSieve {
        fn sieve(&self, mask: &Array2<bool>, _min_size: usize) -> Array2<bool> {
            mask.clone()
        }
    }

    #[test]
    fn only_selected_bits_flag_pixels() {
        let flags = array![[0b0110u32, 0b1000]];
        let nodata = Array2::from_elem((1, 2), false);
        let mask = build_mask(flags.into(), &[0, 1, 2], &nodata, &NoSieve, 1).unwrap();
        assert_eq!(mask, array![[true, false]]);
    }

    #[test]
    fn nodata_always_survives() {
        let flags = Array2::from_shape_fn((6, 6), |(r, c)| ((r * 7 + c * 3) % 16) as u32);
        let nodata = Array2::from_shape_fn((6, 6), |(r, c)| (r + c) % 4 == 0);
        let mask = build_mask(
            Deferred::pending(move || Ok(flags)),
            &[1, 3],
            &nodata,
            &ConnectedComponentSieve,
            MIN_CLUSTER_SIZE,
        )
        .unwrap();
        Zip::from(&mask).and(&nodata).for_each(|&m, &n| assert!(!n || m));
    }

    #[test]
    fn sieve_drops_small_clusters_only() {
        let mut m = Array2::from_elem((8, 8), false);
        // 3-pixel speckle
        m[[0, 0]] = true;
        m[[0, 1]] = true;
        m[[1, 0]] = true;
        // 12-pixel block
        for r in 4..7 {
            for c in 4..8 {
                m[[r, c]] = true;
            }
        }
        // diagonal neighbour is not 4-connected to the block
        m[[3, 3]] = true;
        let out = ConnectedComponentSieve.sieve(&m, MIN_CLUSTER_SIZE);
        assert!(!out[[0, 0]] && !out[[1, 0]] && !out[[3, 3]]);
        assert_eq!(out.iter().filter(|v| **v).count(), 12);
    }

    #[test]
    fn quality_flags_keep_lone_pixels() {
        let mut flags = Array2::<u32>::zeros((4, 4));
        flags[[2, 2]] = 1 << 13;
        let nodata = Array2::from_elem((4, 4), false);
        let sieved = build_mask(
            flags.clone().into(),
            &[13],
            &nodata,
            &ConnectedComponentSieve,
            MIN_CLUSTER_SIZE,
        )
        .unwrap();
        assert!(!sieved[[2, 2]]);
        let kept = flag_mask(flags.into(), &[13], &nodata).unwrap();
        assert!(kept[[2, 2]]);
        assert_eq!(kept.iter().filter(|v| **v).count(), 1);
    }

    #[test]
    fn cloud_nodata_is_masked_not_cloudy() {
        let mut data = Array2::from_elem((4, 4), 256.0);
        data[[0, 0]] = f64::NAN;
        let flags = RasterArray::new("cloud_an", data, SpatialMeta::default());
        let cirrus =
            cloud_raster(&flags, CloudBand::CIRRUS, &ConnectedComponentSieve, 10).unwrap();
        assert_eq!(cirrus.data[[0, 0]], 0.0);
        assert!(cirrus.mask[[0, 0]]);
        // the 15 remaining pixels form one cluster above the minimum size
        assert_eq!(cirrus.data.sum(), 15.0);
    }

    #[test]
    fn apply_mask_keeps_values() {
        let raster = RasterArray::new("S1", array![[1e-6, 0.0, 0.4]], SpatialMeta::default());
        let out = apply_mask(raster, &array![[true, false, false]]).unwrap();
        assert_eq!(out.data, array![[1e-6, 0.0, 0.4]]);
        assert_eq!(out.mask, array![[true, false, false]]);
        let raster = RasterArray::new("S1", array![[1.0]], SpatialMeta::default());
        assert!(apply_mask(raster, &array![[true, true]]).is_err());
    }

    #[test]
    fn cloud_band_bit_selection() {
        let clouds = cloud_bits(CloudBand::CLOUDS).unwrap();
        assert_eq!(clouds.len(), 13);
        assert!(!clouds.contains(&CIRRUS_BIT));
        assert_eq!(cloud_bits(CloudBand::CIRRUS), Some(vec![8]));
        assert_eq!(cloud_bits(CloudBand::ALL_CLOUDS).unwrap().len(), 14);
        assert!(cloud_bits(CloudBand::RAW_CLOUDS).is_none());
    }

    #[test]
    fn quality_helpers() {
        assert_eq!(exception_mask(&array![[0.0, 2.0, 3.0]]), array![[false, false, true]]);
        assert_eq!(olci_saturation_bit("Oa01").unwrap(), 20);
        assert_eq!(olci_saturation_bit("Oa21").unwrap(), 0);
        assert!(olci_saturation_bit("Oa22").is_err());
        assert!(decode_bits(&array![[1u32]], &[32]).is_err());
    }
}
