//! NV12 full-range target buffer
//!
//! Mirrors a platform pixel buffer: fixed dimensions, row strides padded for
//! SIMD-friendly access, and plane memory that must be locked before it is
//! read or written.

use crate::error::{PipError, Result};
use crate::types::{chroma_dimensions, Size, VideoFormat};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

const ROW_ALIGNMENT: usize = 32; // AVX2 register width

static NEXT_ALLOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// Plane storage of a [`PixelBuffer`]
pub struct Planes {
    pub y: Vec<u8>,
    pub uv: Vec<u8>, // Interleaved Cb/Cr
}

/// Converted 4:2:0 biplanar full-range buffer
pub struct PixelBuffer {
    id: u64,
    width: u32,
    height: u32,
    stride_y: usize,
    stride_uv: usize,
    planes: RwLock<Planes>,
}

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// Zeroed allocation that reports failure instead of aborting
fn try_alloc_zeroed(len: usize) -> Option<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len).ok()?;
    data.resize(len, 0);
    Some(data)
}

impl PixelBuffer {
    /// Allocate a new buffer. Dimensions must be even and non-zero.
    pub fn allocate(width: u32, height: u32) -> Result<Self> {
        let (cw, ch) = chroma_dimensions(width, height);
        let stride_y = align_up(width as usize, ROW_ALIGNMENT);
        let stride_uv = align_up(cw as usize * 2, ROW_ALIGNMENT);
        let y_bytes = stride_y.checked_mul(height as usize);
        let uv_bytes = stride_uv.checked_mul(ch as usize);

        let failure = |bytes: usize| PipError::Allocation {
            width,
            height,
            bytes,
        };

        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(failure(0));
        }

        let (Some(y_bytes), Some(uv_bytes)) = (y_bytes, uv_bytes) else {
            return Err(failure(usize::MAX));
        };
        let total = y_bytes.saturating_add(uv_bytes);

        let y = try_alloc_zeroed(y_bytes).ok_or_else(|| failure(total))?;
        let uv = try_alloc_zeroed(uv_bytes).ok_or_else(|| failure(total))?;

        Ok(Self {
            id: NEXT_ALLOCATION_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            stride_y,
            stride_uv,
            planes: RwLock::new(Planes { y, uv }),
        })
    }

    /// Process-unique id of this allocation
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn stride_y(&self) -> usize {
        self.stride_y
    }

    pub fn stride_uv(&self) -> usize {
        self.stride_uv
    }

    pub fn format(&self) -> VideoFormat {
        VideoFormat::NV12
    }

    /// Lock planes for reading (display side)
    pub fn lock_planes(&self) -> RwLockReadGuard<'_, Planes> {
        self.planes.read()
    }

    /// Lock planes for writing (converter side)
    pub fn lock_planes_mut(&self) -> RwLockWriteGuard<'_, Planes> {
        self.planes.write()
    }

    /// Copy of one luma row without stride padding
    pub fn y_row(&self, row: usize) -> Vec<u8> {
        let planes = self.lock_planes();
        let start = row * self.stride_y;
        planes.y[start..start + self.width as usize].to_vec()
    }

    /// Copy of one interleaved chroma row without stride padding
    pub fn uv_row(&self, row: usize) -> Vec<u8> {
        let planes = self.lock_planes();
        let start = row * self.stride_uv;
        planes.uv[start..start + self.width as usize].to_vec()
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride_y", &self.stride_y)
            .field("stride_uv", &self.stride_uv)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_strides_aligned() {
        let buffer = PixelBuffer::allocate(100, 50).unwrap();
        assert_eq!(buffer.stride_y() % ROW_ALIGNMENT, 0);
        assert_eq!(buffer.stride_uv() % ROW_ALIGNMENT, 0);
        assert!(buffer.stride_y() >= 100);

        let planes = buffer.lock_planes();
        assert_eq!(planes.y.len(), buffer.stride_y() * 50);
        assert_eq!(planes.uv.len(), buffer.stride_uv() * 25);
    }

    #[test]
    fn test_allocate_rejects_odd_dimensions() {
        assert!(matches!(
            PixelBuffer::allocate(101, 50),
            Err(PipError::Allocation { .. })
        ));
        assert!(PixelBuffer::allocate(0, 0).is_err());
    }

    #[test]
    fn test_allocation_ids_unique() {
        let a = PixelBuffer::allocate(2, 2).unwrap();
        let b = PixelBuffer::allocate(2, 2).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_huge_allocation_fails_cleanly() {
        assert!(PixelBuffer::allocate(u32::MAX - 1, u32::MAX - 1).is_err());
    }
}
