//! Displayable samples: a converted buffer plus format and timing

use crate::error::{PipError, Result};
use crate::pixel_buffer::PixelBuffer;
use crate::types::{chroma_dimensions, Size, VideoFormat};
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

/// Presentation timescale: timestamps are in milliseconds
pub const TIMESCALE: i32 = 1000;

/// Rational timestamp `value / timescale` seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PresentationTime {
    pub value: i64,
    pub timescale: i32,
}

fn clock_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

impl PresentationTime {
    pub fn from_millis(value: i64) -> Self {
        Self {
            value,
            timescale: TIMESCALE,
        }
    }

    /// Monotonic milliseconds since the first call in this process
    pub fn now() -> Self {
        Self::from_millis(clock_epoch().elapsed().as_millis() as i64)
    }
}

/// Describes the pixel layout of a sample to the display surface
///
/// Converted samples are always full range (0-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescription {
    pub format: VideoFormat,
    pub dimensions: Size,
}

impl FormatDescription {
    /// Build a description for `buffer`, checking that its planes are usable
    pub fn for_buffer(buffer: &PixelBuffer) -> Result<Self> {
        let size = buffer.size();
        if size.is_empty() || size.width % 2 != 0 || size.height % 2 != 0 {
            return Err(PipError::FormatDescription(format!(
                "dimensions {size} are not valid for 4:2:0"
            )));
        }

        let (_, ch) = chroma_dimensions(size.width, size.height);
        let planes = buffer.lock_planes();
        if planes.y.len() < buffer.stride_y() * size.height as usize
            || planes.uv.len() < buffer.stride_uv() * ch as usize
        {
            return Err(PipError::FormatDescription(format!(
                "plane storage too small for {size}"
            )));
        }

        Ok(Self {
            format: buffer.format(),
            dimensions: size,
        })
    }
}

/// A converted frame ready to be enqueued on a display surface
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    buffer: Arc<PixelBuffer>,
    format: FormatDescription,
    pts: PresentationTime,
    display_immediately: bool,
}

impl SampleBuffer {
    pub fn new(buffer: Arc<PixelBuffer>, pts: PresentationTime) -> Result<Self> {
        let format = FormatDescription::for_buffer(&buffer)?;

        Ok(Self {
            buffer,
            format,
            pts,
            display_immediately: true,
        })
    }

    pub fn pixel_buffer(&self) -> &Arc<PixelBuffer> {
        &self.buffer
    }

    pub fn format_description(&self) -> &FormatDescription {
        &self.format
    }

    pub fn presentation_time(&self) -> PresentationTime {
        self.pts
    }

    /// Samples are shown as soon as they are enqueued, not at their timestamp
    pub fn display_immediately(&self) -> bool {
        self.display_immediately
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presentation_time_is_monotonic() {
        let a = PresentationTime::now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = PresentationTime::now();

        assert_eq!(a.timescale, TIMESCALE);
        assert!(b.value >= a.value);
    }

    #[test]
    fn test_sample_format_description() {
        let buffer = Arc::new(PixelBuffer::allocate(64, 36).unwrap());
        let sample = SampleBuffer::new(buffer.clone(), PresentationTime::from_millis(7)).unwrap();

        let format = sample.format_description();
        assert_eq!(format.format, VideoFormat::NV12);
        assert_eq!(format.dimensions, Size::new(64, 36));
        assert!(Arc::ptr_eq(sample.pixel_buffer(), &buffer));
        assert!(sample.display_immediately());
    }

    #[test]
    fn test_format_description_rejects_truncated_planes() {
        let buffer = PixelBuffer::allocate(8, 8).unwrap();
        buffer.lock_planes_mut().uv.truncate(3);

        assert!(matches!(
            FormatDescription::for_buffer(&buffer),
            Err(PipError::FormatDescription(_))
        ));
    }
}
