//! Renderer configuration

use crate::types::Size;

/// Inverse mapping used when sampling the source for a destination pixel
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleMode {
    /// `ceil(dst / scale)`, biased toward higher source indices.
    /// Matches the output of the existing renderer bit for bit.
    #[default]
    Ceil = 0,
    /// `round(dst / scale)`
    Nearest = 1,
}

impl SampleMode {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => SampleMode::Nearest,
            _ => SampleMode::Ceil,
        }
    }
}

/// Picture-in-picture renderer configuration
#[derive(Debug, Clone)]
pub struct PipConfig {
    /// Bounding box the converted frame is fitted into
    pub target_size: Size,
    pub sample_mode: SampleMode,
    /// Name of the conversion worker thread
    pub convert_thread_name: String,
    /// Name of the default presentation thread
    pub present_thread_name: String,
}

impl Default for PipConfig {
    fn default() -> Self {
        Self {
            target_size: Size::new(640, 360),
            sample_mode: SampleMode::Ceil,
            convert_thread_name: "pip-convert".to_string(),
            present_thread_name: "pip-present".to_string(),
        }
    }
}

impl PipConfig {
    pub fn with_target_size(mut self, width: u32, height: u32) -> Self {
        self.target_size = Size::new(width, height);
        self
    }

    pub fn with_sample_mode(mut self, sample_mode: SampleMode) -> Self {
        self.sample_mode = sample_mode;
        self
    }
}
