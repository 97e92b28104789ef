//! PiP Video Pipeline
//!
//! Picture-in-picture rendering for remote participant video.
//!
//! Pipeline stages:
//! - Pixel buffer conversion: scale-to-fit, optional mirroring, 4:2:0 biplanar output
//! - Single-entry buffer cache keyed by output size
//! - Serialized dispatch with at most one frame in flight (late frames are dropped)
//! - Display adapter that presents only when the surface is ready

pub mod buffer_cache;
pub mod config;
pub mod converter;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod format_conversion;
pub mod pixel_buffer;
pub mod queue;
pub mod sample;
pub mod types;

pub use buffer_cache::*;
pub use config::*;
pub use converter::*;
pub use dispatcher::*;
pub use display::*;
pub use error::*;
pub use format_conversion::*;
pub use pixel_buffer::*;
pub use queue::*;
pub use sample::*;
pub use types::*;

