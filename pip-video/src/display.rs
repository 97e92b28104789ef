//! Display surface adapter

use crate::sample::SampleBuffer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Compressed-sample display surface provided by the host platform
///
/// Called from the presentation queue only.
pub trait DisplayLayer: Send + Sync {
    /// Whether the surface can take another sample right now
    fn is_ready_for_more_media_data(&self) -> bool;

    /// Queue a sample for display
    fn enqueue(&self, sample: SampleBuffer);

    /// Drop queued samples and clear the current image
    fn flush_and_remove_image(&self) {}
}

/// Presents at most one sample at a time, never retrying
pub struct DisplayAdapter {
    layer: Arc<dyn DisplayLayer>,
    stopped: AtomicBool,

    // Statistics (atomic for lock-free reads)
    presented: AtomicU64,
    not_ready: AtomicU64,
    suppressed: AtomicU64,
}

impl DisplayAdapter {
    pub fn new(layer: Arc<dyn DisplayLayer>) -> Self {
        Self {
            layer,
            stopped: AtomicBool::new(false),
            presented: AtomicU64::new(0),
            not_ready: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
        }
    }

    /// Enqueue `sample` if the surface is ready and presentation is running.
    ///
    /// Returns whether the sample reached the surface.
    pub fn present(&self, sample: SampleBuffer) -> bool {
        if self.is_stopped() {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        if !self.layer.is_ready_for_more_media_data() {
            self.not_ready.fetch_add(1, Ordering::Relaxed);
            log::trace!("Display layer not ready, dropping sample");
            return false;
        }

        self.layer.enqueue(sample);
        self.presented.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Stop presenting. Later samples are dropped.
    ///
    /// Returns `true` for the call that performed the transition; that caller
    /// is responsible for scheduling [`flush`](Self::flush) on the presentation
    /// queue.
    pub fn stop(&self) -> bool {
        let first = !self.stopped.swap(true, Ordering::SeqCst);
        if first {
            log::info!("PiP presentation stopped");
        }
        first
    }

    /// Clear the surface. Must run on the presentation queue.
    pub fn flush(&self) {
        self.layer.flush_and_remove_image();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Record a sample that was discarded before reaching [`present`](Self::present)
    pub(crate) fn note_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> DisplayStats {
        DisplayStats {
            presented: self.presented.load(Ordering::Relaxed),
            not_ready: self.not_ready.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DisplayStats {
    pub presented: u64,
    /// Dropped because the surface was busy
    pub not_ready: u64,
    /// Dropped because presentation was stopped
    pub suppressed: u64,
}
