//! Frame to displayable sample conversion
//!
//! Owns the single cached target buffer. Only the conversion queue calls into
//! a converter, so the cache has exactly one writer.

use crate::buffer_cache::{BufferCache, CacheStats};
use crate::config::SampleMode;
use crate::error::Result;
use crate::format_conversion::{
    plan_scale, scale_chroma_biplanar, scale_chroma_planar, scale_luma, Plane, PlaneMut, Sampling,
};
use crate::pixel_buffer::{PixelBuffer, Planes};
use crate::sample::{PresentationTime, SampleBuffer};
use crate::types::{chroma_dimensions, FrameBuffer, Size, VideoFrame};

/// Turns source frames into displayable samples on the conversion thread
///
/// Failures are logged by the implementation; `None` drops the frame.
pub trait FrameRenderer: Send {
    fn render(&mut self, frame: &VideoFrame, target: Size, flip: bool) -> Option<SampleBuffer>;
}

pub struct PixelBufferConverter {
    cache: BufferCache,
    sample_mode: SampleMode,
    conversions: u64,
    failures: u64,
}

impl PixelBufferConverter {
    pub fn new(sample_mode: SampleMode) -> Self {
        Self {
            cache: BufferCache::new(),
            sample_mode,
            conversions: 0,
            failures: 0,
        }
    }

    /// Scale `frame` into `target` (aspect preserved), optionally mirrored.
    pub fn convert(&mut self, frame: &VideoFrame, target: Size, flip: bool) -> Result<SampleBuffer> {
        let plan = plan_scale(frame.size(), target)?;
        let buffer = self.cache.acquire(plan.output)?;

        let sampling = Sampling {
            scale: plan.scale,
            mode: self.sample_mode,
            flip,
        };
        fill_buffer(&frame.buffer, &buffer, &sampling);

        SampleBuffer::new(buffer, PresentationTime::now())
    }

    pub fn conversions(&self) -> u64 {
        self.conversions
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl FrameRenderer for PixelBufferConverter {
    /// Like [`convert`](PixelBufferConverter::convert), but logs failures and drops the frame.
    fn render(&mut self, frame: &VideoFrame, target: Size, flip: bool) -> Option<SampleBuffer> {
        match self.convert(frame, target, flip) {
            Ok(sample) => {
                self.conversions += 1;
                Some(sample)
            }
            Err(e) => {
                self.failures += 1;
                log::warn!(
                    "Dropping {:?} frame {}: {}",
                    frame.buffer.format(),
                    frame.size(),
                    e
                );
                None
            }
        }
    }
}

fn fill_buffer(source: &FrameBuffer, buffer: &PixelBuffer, sampling: &Sampling) {
    let out = buffer.size();
    let stride_y = buffer.stride_y();
    let stride_uv = buffer.stride_uv();

    let mut planes = buffer.lock_planes_mut();
    let Planes { y, uv } = &mut *planes;

    let mut dst_y = PlaneMut {
        data: y,
        stride: stride_y,
        width: out.width as usize,
        height: out.height as usize,
    };
    let mut dst_uv = PlaneMut {
        data: uv,
        stride: stride_uv,
        width: out.width as usize / 2,
        height: out.height as usize / 2,
    };

    match source {
        FrameBuffer::I420(src) => {
            let (cw, ch) = chroma_dimensions(src.width(), src.height());

            scale_luma(
                &Plane {
                    data: src.data_y(),
                    stride: src.stride_y(),
                    width: src.width() as usize,
                    height: src.height() as usize,
                },
                &mut dst_y,
                sampling,
            );
            scale_chroma_planar(
                &Plane {
                    data: src.data_u(),
                    stride: src.stride_u(),
                    width: cw as usize,
                    height: ch as usize,
                },
                &Plane {
                    data: src.data_v(),
                    stride: src.stride_v(),
                    width: cw as usize,
                    height: ch as usize,
                },
                &mut dst_uv,
                sampling,
            );
        }
        FrameBuffer::Nv12(src) => {
            let (cw, ch) = chroma_dimensions(src.width(), src.height());

            scale_luma(
                &Plane {
                    data: src.data_y(),
                    stride: src.stride_y(),
                    width: src.width() as usize,
                    height: src.height() as usize,
                },
                &mut dst_y,
                sampling,
            );
            scale_chroma_biplanar(
                &Plane {
                    data: src.data_uv(),
                    stride: src.stride_uv(),
                    width: cw as usize,
                    height: ch as usize,
                },
                &mut dst_uv,
                sampling,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipError;
    use crate::sample::TIMESCALE;
    use crate::types::{I420Buffer, Nv12Buffer};
    use std::sync::Arc;

    fn gradient_i420(width: u32, height: u32, seed: u8) -> VideoFrame {
        let (cw, ch) = chroma_dimensions(width, height);
        let y = (0..width * height)
            .map(|i| ((i % width) as u8).wrapping_mul(10).wrapping_add(seed))
            .collect();
        let u = (0..cw * ch).map(|i| (i as u8).wrapping_add(100)).collect();
        let v = (0..cw * ch).map(|i| (i as u8).wrapping_add(200)).collect();
        I420Buffer::from_planes(width, height, y, u, v).unwrap().into()
    }

    fn as_nv12(frame: &VideoFrame) -> VideoFrame {
        let FrameBuffer::I420(src) = &frame.buffer else {
            panic!("expected I420");
        };
        let uv: Vec<u8> = src
            .data_u()
            .iter()
            .zip(src.data_v())
            .flat_map(|(&u, &v)| [u, v])
            .collect();
        let (cw, _) = chroma_dimensions(src.width(), src.height());
        Nv12Buffer::new(
            src.width(),
            src.height(),
            src.data_y().to_vec().into(),
            src.stride_y(),
            uv.into(),
            cw as usize * 2,
        )
        .unwrap()
        .into()
    }

    #[test]
    fn test_same_target_reuses_buffer() {
        let mut converter = PixelBufferConverter::new(SampleMode::Ceil);

        let a = converter
            .convert(&gradient_i420(8, 8, 0), Size::new(8, 8), false)
            .unwrap();
        let first_row = a.pixel_buffer().y_row(0);

        let b = converter
            .convert(&gradient_i420(8, 8, 1), Size::new(8, 8), false)
            .unwrap();

        assert!(Arc::ptr_eq(a.pixel_buffer(), b.pixel_buffer()));
        assert_eq!(a.pixel_buffer().id(), b.pixel_buffer().id());
        assert_ne!(b.pixel_buffer().y_row(0), first_row, "contents updated");
        assert_eq!(converter.cache_stats().allocations, 1);
    }

    #[test]
    fn test_target_change_reallocates() {
        let mut converter = PixelBufferConverter::new(SampleMode::Ceil);
        let frame = gradient_i420(100, 100, 0);

        let small = converter.convert(&frame, Size::new(100, 100), false).unwrap();
        let small_id = small.pixel_buffer().id();
        let small_weak = Arc::downgrade(small.pixel_buffer());
        drop(small);

        let large = converter.convert(&frame, Size::new(200, 150), false).unwrap();

        assert_ne!(large.pixel_buffer().id(), small_id);
        assert_eq!(large.format_description().dimensions, Size::new(150, 150));
        assert!(small_weak.upgrade().is_none());
        assert_eq!(converter.cache_stats().allocations, 2);
    }

    #[test]
    fn test_flip_mirrors_luma_and_chroma() {
        let mut converter = PixelBufferConverter::new(SampleMode::Ceil);
        let frame = gradient_i420(4, 4, 3);

        let plain = converter.convert(&frame, Size::new(4, 4), false).unwrap();
        let plain_y: Vec<Vec<u8>> = (0..4).map(|r| plain.pixel_buffer().y_row(r)).collect();
        let plain_uv: Vec<Vec<u8>> = (0..2).map(|r| plain.pixel_buffer().uv_row(r)).collect();
        drop(plain);

        let flipped = converter.convert(&frame, Size::new(4, 4), true).unwrap();
        for (row, expected) in plain_y.iter().enumerate() {
            let mut reversed = expected.clone();
            reversed.reverse();
            assert_eq!(flipped.pixel_buffer().y_row(row), reversed);
        }
        for (row, expected) in plain_uv.iter().enumerate() {
            let got = flipped.pixel_buffer().uv_row(row);
            assert_eq!(got, vec![expected[2], expected[3], expected[0], expected[1]]);
        }
    }

    #[test]
    fn test_nv12_matches_i420() {
        let mut converter = PixelBufferConverter::new(SampleMode::Ceil);
        let i420 = gradient_i420(16, 12, 5);
        let nv12 = as_nv12(&i420);
        let target = Size::new(10, 10);

        let a = converter.convert(&i420, target, true).unwrap();
        let (a_y, a_uv) = {
            let planes = a.pixel_buffer().lock_planes();
            (planes.y.clone(), planes.uv.clone())
        };
        drop(a);

        let b = converter.convert(&nv12, target, true).unwrap();
        let planes = b.pixel_buffer().lock_planes();
        assert_eq!(planes.y, a_y);
        assert_eq!(planes.uv, a_uv);
    }

    #[test]
    fn test_chroma_interleaved_at_scale_one() {
        let mut converter = PixelBufferConverter::new(SampleMode::Ceil);
        let sample = converter
            .convert(&gradient_i420(4, 4, 0), Size::new(4, 4), false)
            .unwrap();

        assert_eq!(sample.pixel_buffer().uv_row(0), vec![100, 200, 101, 201]);
        assert_eq!(sample.pixel_buffer().uv_row(1), vec![102, 202, 103, 203]);
    }

    #[test]
    fn test_odd_source_dimensions() {
        let mut converter = PixelBufferConverter::new(SampleMode::Nearest);
        let sample = converter
            .convert(&gradient_i420(5, 3, 0), Size::new(5, 3), false)
            .unwrap();

        assert_eq!(sample.format_description().dimensions, Size::new(6, 4));
        assert_eq!(sample.presentation_time().timescale, TIMESCALE);
    }

    #[test]
    fn test_oversized_target_fails_without_panicking() {
        let mut converter = PixelBufferConverter::new(SampleMode::Ceil);
        let huge = Size::new(u32::MAX, u32::MAX);

        assert!(matches!(
            converter.convert(&gradient_i420(1, 1, 0), huge, false),
            Err(PipError::Allocation { .. })
        ));
        assert!(converter.render(&gradient_i420(1, 1, 0), huge, true).is_none());
        assert_eq!(converter.failures(), 1);
        assert_eq!(converter.cache_stats().allocations, 0);
    }

    #[test]
    fn test_render_drops_on_empty_target() {
        let mut converter = PixelBufferConverter::new(SampleMode::Ceil);

        assert!(converter
            .render(&gradient_i420(4, 4, 0), Size::new(0, 0), false)
            .is_none());
        assert_eq!(converter.failures(), 1);
        assert_eq!(converter.conversions(), 0);

        assert!(converter
            .render(&gradient_i420(4, 4, 0), Size::new(4, 4), false)
            .is_some());
        assert_eq!(converter.conversions(), 1);
    }
}
