//! Error type shared by the conversion and dispatch stages

use thiserror::Error;

/// Every variant is terminal for a single frame only: the frame is logged and
/// dropped, and the next frame starts from a clean slate.
#[derive(Debug, Error)]
pub enum PipError {
    /// Source frame planes are missing, empty or too short for their strides.
    #[error("invalid source frame: {0}")]
    InvalidFrame(String),

    /// Target pixel buffer could not be allocated.
    #[error("failed to allocate {width}x{height} pixel buffer ({bytes} bytes)")]
    Allocation { width: u32, height: u32, bytes: usize },

    /// Format description could not be built for the converted buffer.
    #[error("failed to create format description: {0}")]
    FormatDescription(String),

    /// A queue on the other side of a channel has shut down.
    #[error("{0} queue disconnected")]
    Disconnected(&'static str),

    /// A pipeline thread could not be started.
    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipError>;
