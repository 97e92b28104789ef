//! Scaling, mirroring and 4:2:0 chroma interleaving
//!
//! Nearest-neighbour resampling from a planar or biplanar source into a
//! biplanar destination. Source coordinates are computed once per call into
//! index maps, then rows are filled in parallel.

use crate::config::SampleMode;
use crate::error::{PipError, Result};
use crate::types::Size;
use rayon::prelude::*;

// Absorbs f64 noise in `W * scale` so that 99.9999999 and 100.0000000001 both
// resolve to 100 before rounding up.
const ROUNDING_EPSILON: f64 = 1e-9;

/// Largest output width or height a conversion will allocate
pub const MAX_OUTPUT_DIMENSION: u32 = 16384;

/// Read-only view of one source plane
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub stride: usize,
    /// Width in samples (a sample is 2 bytes in an interleaved UV plane)
    pub width: usize,
    pub height: usize,
}

/// Writable view of one destination plane
#[derive(Debug)]
pub struct PlaneMut<'a> {
    pub data: &'a mut [u8],
    pub stride: usize,
    /// Width in samples (a sample is 2 bytes in an interleaved UV plane)
    pub width: usize,
    pub height: usize,
}

/// Uniform scale and the even output size derived from it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePlan {
    pub scale: f64,
    pub output: Size,
}

/// Round up to the next even integer (minimum 2)
///
/// Returns `None` when the result does not fit in a `u32`.
pub fn round_up_even(value: f64) -> Option<u32> {
    let n = (value - ROUNDING_EPSILON).ceil().max(1.0);
    if n >= u32::MAX as f64 {
        return None;
    }
    let n = n as u32;
    n.checked_add(n & 1)
}

/// Fit `source` into `target` preserving aspect ratio.
///
/// Both dimensions of the output are even, as 4:2:0 subsampling requires.
/// Outputs larger than [`MAX_OUTPUT_DIMENSION`] on either axis are rejected.
pub fn plan_scale(source: Size, target: Size) -> Result<ScalePlan> {
    if source.is_empty() || target.is_empty() {
        return Err(PipError::InvalidFrame(format!(
            "cannot fit {source} into {target}"
        )));
    }

    let scale = f64::min(
        target.width as f64 / source.width as f64,
        target.height as f64 / source.height as f64,
    );

    let width = round_up_even(source.width as f64 * scale);
    let height = round_up_even(source.height as f64 * scale);

    match (width, height) {
        (Some(width), Some(height))
            if width <= MAX_OUTPUT_DIMENSION && height <= MAX_OUTPUT_DIMENSION =>
        {
            Ok(ScalePlan {
                scale,
                output: Size::new(width, height),
            })
        }
        _ => Err(PipError::Allocation {
            width: width.unwrap_or(u32::MAX),
            height: height.unwrap_or(u32::MAX),
            bytes: usize::MAX,
        }),
    }
}

/// Per-call sampling parameters
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub scale: f64,
    pub mode: SampleMode,
    pub flip: bool,
}

impl Sampling {
    /// Source index for destination index `dst`, clamped to `src_len - 1`
    pub fn source_index(&self, dst: usize, src_len: usize) -> usize {
        let exact = dst as f64 / self.scale;
        let index = match self.mode {
            SampleMode::Ceil => exact.ceil(),
            SampleMode::Nearest => exact.round(),
        };
        (index as usize).min(src_len - 1)
    }

    /// Source index for every destination index along one axis
    fn index_map(&self, dst_len: usize, src_len: usize, mirror: bool) -> Vec<usize> {
        (0..dst_len)
            .map(|dst| {
                let index = self.source_index(dst, src_len);
                if mirror {
                    src_len - 1 - index
                } else {
                    index
                }
            })
            .collect()
    }
}

/// Resample a single-byte-per-sample plane (luma)
pub fn scale_luma(src: &Plane<'_>, dst: &mut PlaneMut<'_>, sampling: &Sampling) {
    let cols = sampling.index_map(dst.width, src.width, sampling.flip);
    let rows = sampling.index_map(dst.height, src.height, false);
    let width = dst.width;

    dst.data
        .par_chunks_mut(dst.stride)
        .take(dst.height)
        .zip(rows.par_iter())
        .for_each(|(out, &src_row)| {
            let line = &src.data[src_row * src.stride..];
            for (o, &c) in out[..width].iter_mut().zip(cols.iter()) {
                *o = line[c];
            }
        });
}

/// Resample separate U and V planes into an interleaved CbCr plane
pub fn scale_chroma_planar(
    src_u: &Plane<'_>,
    src_v: &Plane<'_>,
    dst: &mut PlaneMut<'_>,
    sampling: &Sampling,
) {
    debug_assert_eq!(src_u.width, src_v.width);
    debug_assert_eq!(src_u.height, src_v.height);

    let cols = sampling.index_map(dst.width, src_u.width, sampling.flip);
    let rows = sampling.index_map(dst.height, src_u.height, false);
    let width = dst.width;

    dst.data
        .par_chunks_mut(dst.stride)
        .take(dst.height)
        .zip(rows.par_iter())
        .for_each(|(out, &src_row)| {
            let u_line = &src_u.data[src_row * src_u.stride..];
            let v_line = &src_v.data[src_row * src_v.stride..];
            for (pair, &c) in out[..width * 2].chunks_exact_mut(2).zip(cols.iter()) {
                pair[0] = u_line[c];
                pair[1] = v_line[c];
            }
        });
}

/// Resample an interleaved CbCr plane into another interleaved CbCr plane
pub fn scale_chroma_biplanar(src_uv: &Plane<'_>, dst: &mut PlaneMut<'_>, sampling: &Sampling) {
    let cols = sampling.index_map(dst.width, src_uv.width, sampling.flip);
    let rows = sampling.index_map(dst.height, src_uv.height, false);
    let width = dst.width;

    dst.data
        .par_chunks_mut(dst.stride)
        .take(dst.height)
        .zip(rows.par_iter())
        .for_each(|(out, &src_row)| {
            let line = &src_uv.data[src_row * src_uv.stride..];
            for (pair, &c) in out[..width * 2].chunks_exact_mut(2).zip(cols.iter()) {
                pair[0] = line[c * 2];
                pair[1] = line[c * 2 + 1];
            }
        });
}
