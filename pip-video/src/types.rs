//! Video data types and constants

use crate::error::{PipError, Result};
use std::fmt;
use std::sync::Arc;

/// 4:2:0 pixel layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    /// Planar: Y, U and V planes
    I420,
    /// Biplanar: Y plane plus one interleaved UV plane
    NV12,
}

/// Width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Cache key used by the target buffer cache
    pub fn key(&self) -> String {
        format!("{}_{}", self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Chroma plane dimensions for 4:2:0 subsampling (odd sizes round up)
pub fn chroma_dimensions(width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(2), height.div_ceil(2))
}

/// Checks that `plane` holds `rows` rows of `row_bytes` at `stride`.
fn check_plane(name: &str, plane: &[u8], stride: usize, row_bytes: usize, rows: usize) -> Result<()> {
    if plane.is_empty() {
        return Err(PipError::InvalidFrame(format!("{name} plane is missing")));
    }
    if stride < row_bytes {
        return Err(PipError::InvalidFrame(format!(
            "{name} stride {stride} is smaller than row size {row_bytes}"
        )));
    }
    let needed = stride
        .checked_mul(rows.saturating_sub(1))
        .and_then(|bytes| bytes.checked_add(row_bytes))
        .ok_or_else(|| {
            PipError::InvalidFrame(format!("{name} plane geometry overflows (stride {stride})"))
        })?;
    if plane.len() < needed {
        return Err(PipError::InvalidFrame(format!(
            "{name} plane has {} bytes, needs {needed}",
            plane.len()
        )));
    }
    Ok(())
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(PipError::InvalidFrame(format!(
            "empty frame {width}x{height}"
        )));
    }
    Ok(())
}

/// Planar 4:2:0 buffer with three independently strided planes
#[derive(Clone)]
pub struct I420Buffer {
    width: u32,
    height: u32,
    data_y: Arc<[u8]>,
    data_u: Arc<[u8]>,
    data_v: Arc<[u8]>,
    stride_y: usize,
    stride_u: usize,
    stride_v: usize,
}

impl I420Buffer {
    /// Wrap existing planes, validating them against the declared strides.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        width: u32,
        height: u32,
        data_y: Arc<[u8]>,
        stride_y: usize,
        data_u: Arc<[u8]>,
        stride_u: usize,
        data_v: Arc<[u8]>,
        stride_v: usize,
    ) -> Result<Self> {
        check_dimensions(width, height)?;
        let (cw, ch) = chroma_dimensions(width, height);
        check_plane("Y", &data_y, stride_y, width as usize, height as usize)?;
        check_plane("U", &data_u, stride_u, cw as usize, ch as usize)?;
        check_plane("V", &data_v, stride_v, cw as usize, ch as usize)?;

        Ok(Self {
            width,
            height,
            data_y,
            data_u,
            data_v,
            stride_y,
            stride_u,
            stride_v,
        })
    }

    /// Tightly packed planes (stride == row width)
    pub fn from_planes(width: u32, height: u32, y: Vec<u8>, u: Vec<u8>, v: Vec<u8>) -> Result<Self> {
        let (cw, _) = chroma_dimensions(width, height);
        Self::new(
            width,
            height,
            y.into(),
            width as usize,
            u.into(),
            cw as usize,
            v.into(),
            cw as usize,
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data_y(&self) -> &[u8] {
        &self.data_y
    }

    pub fn data_u(&self) -> &[u8] {
        &self.data_u
    }

    pub fn data_v(&self) -> &[u8] {
        &self.data_v
    }

    pub fn stride_y(&self) -> usize {
        self.stride_y
    }

    pub fn stride_u(&self) -> usize {
        self.stride_u
    }

    pub fn stride_v(&self) -> usize {
        self.stride_v
    }
}

/// Biplanar 4:2:0 buffer: Y plane plus one interleaved UV plane
#[derive(Clone)]
pub struct Nv12Buffer {
    width: u32,
    height: u32,
    data_y: Arc<[u8]>,
    data_uv: Arc<[u8]>,
    stride_y: usize,
    stride_uv: usize,
}

impl Nv12Buffer {
    pub fn new(
        width: u32,
        height: u32,
        data_y: Arc<[u8]>,
        stride_y: usize,
        data_uv: Arc<[u8]>,
        stride_uv: usize,
    ) -> Result<Self> {
        check_dimensions(width, height)?;
        let (cw, ch) = chroma_dimensions(width, height);
        check_plane("Y", &data_y, stride_y, width as usize, height as usize)?;
        check_plane("UV", &data_uv, stride_uv, cw as usize * 2, ch as usize)?;

        Ok(Self {
            width,
            height,
            data_y,
            data_uv,
            stride_y,
            stride_uv,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data_y(&self) -> &[u8] {
        &self.data_y
    }

    pub fn data_uv(&self) -> &[u8] {
        &self.data_uv
    }

    pub fn stride_y(&self) -> usize {
        self.stride_y
    }

    pub fn stride_uv(&self) -> usize {
        self.stride_uv
    }
}

/// Concrete layout of an incoming frame
#[derive(Clone)]
pub enum FrameBuffer {
    I420(I420Buffer),
    Nv12(Nv12Buffer),
}

impl FrameBuffer {
    pub fn format(&self) -> VideoFormat {
        match self {
            FrameBuffer::I420(_) => VideoFormat::I420,
            FrameBuffer::Nv12(_) => VideoFormat::NV12,
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            FrameBuffer::I420(b) => b.width(),
            FrameBuffer::Nv12(b) => b.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            FrameBuffer::I420(b) => b.height(),
            FrameBuffer::Nv12(b) => b.height(),
        }
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("format", &self.format())
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Decoded video frame handed over by the media pipeline
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub buffer: FrameBuffer,
    pub timestamp: u64, // Producer clock, nanoseconds
}

impl VideoFrame {
    pub fn new(buffer: FrameBuffer, timestamp: u64) -> Self {
        Self { buffer, timestamp }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }
}

impl From<I420Buffer> for VideoFrame {
    fn from(buffer: I420Buffer) -> Self {
        Self::new(FrameBuffer::I420(buffer), 0)
    }
}

impl From<Nv12Buffer> for VideoFrame {
    fn from(buffer: Nv12Buffer) -> Self {
        Self::new(FrameBuffer::Nv12(buffer), 0)
    }
}
