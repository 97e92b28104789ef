//! Serialized frame dispatch
//!
//! Frames arrive on producer threads. At most one frame is in flight between
//! arrival and presentation; anything that arrives meanwhile is dropped, so a
//! slow conversion lowers the output frame rate instead of growing a queue.
//!
//! ```text
//! producer ──submit──► [busy?] ──► pip-convert ──► presentation ──► DisplayLayer
//!                         │         (converter,      executor
//!                         ▼          buffer cache)
//!                       drop
//! ```

use crate::config::PipConfig;
use crate::converter::{FrameRenderer, PixelBufferConverter};
use crate::display::{DisplayAdapter, DisplayLayer, DisplayStats};
use crate::error::{PipError, Result};
use crate::queue::{Executor, MainQueue};
use crate::types::{Size, VideoFrame};
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    accepted: AtomicU64,
    dropped_busy: AtomicU64,
    dropped_stopped: AtomicU64,
    conversion_failures: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Holds the dispatcher busy; dropping it returns to idle.
///
/// Travels with the frame from arrival to presentation, so a request lost on
/// any path (failed conversion, dropped presentation job) still frees the
/// pipeline.
struct InFlight {
    busy: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl InFlight {
    fn begin(busy: Arc<AtomicBool>, counters: Arc<Counters>) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { busy, counters }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.busy.store(false, Ordering::Release);
    }
}

struct RenderRequest {
    frame: VideoFrame,
    flip: bool,
    target: Size,
    in_flight: InFlight,
}

/// Picture-in-picture frame dispatcher
pub struct FrameDispatcher {
    config: PipConfig,
    busy: Arc<AtomicBool>,
    request_tx: Option<Sender<RenderRequest>>,
    display: Arc<DisplayAdapter>,
    presenter: Option<Arc<dyn Executor>>,
    counters: Arc<Counters>,
    thread_handle: Option<JoinHandle<()>>,
}

impl FrameDispatcher {
    /// Create a dispatcher presenting on its own presentation thread
    pub fn new(config: PipConfig, layer: Arc<dyn DisplayLayer>) -> Result<Self> {
        let presenter = Arc::new(MainQueue::spawn(&config.present_thread_name)?);
        Self::with_executor(config, layer, presenter)
    }

    /// Create a dispatcher presenting through a host-provided queue
    pub fn with_executor(
        config: PipConfig,
        layer: Arc<dyn DisplayLayer>,
        presenter: Arc<dyn Executor>,
    ) -> Result<Self> {
        let renderer = Box::new(PixelBufferConverter::new(config.sample_mode));
        Self::with_renderer(config, layer, presenter, renderer)
    }

    /// Create a dispatcher with a custom conversion stage
    pub fn with_renderer(
        config: PipConfig,
        layer: Arc<dyn DisplayLayer>,
        presenter: Arc<dyn Executor>,
        renderer: Box<dyn FrameRenderer>,
    ) -> Result<Self> {
        let (request_tx, request_rx) = channel::unbounded();
        let display = Arc::new(DisplayAdapter::new(layer));
        let counters = Arc::new(Counters::default());

        let thread_handle = Self::spawn_convert_thread(
            &config,
            request_rx,
            renderer,
            display.clone(),
            presenter.clone(),
            counters.clone(),
        )?;

        log::info!(
            "PiP dispatcher started, target {} ({:?} sampling)",
            config.target_size,
            config.sample_mode
        );

        Ok(Self {
            config,
            busy: Arc::new(AtomicBool::new(false)),
            request_tx: Some(request_tx),
            display,
            presenter: Some(presenter),
            counters,
            thread_handle: Some(thread_handle),
        })
    }

    /// Offer a frame (called by the media pipeline, any thread)
    ///
    /// Returns `false` when the frame was dropped because another frame is in
    /// flight or presentation has stopped.
    pub fn submit(&self, frame: VideoFrame, flip: bool) -> bool {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        if self.display.is_stopped() {
            self.counters.dropped_stopped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.counters.dropped_busy.fetch_add(1, Ordering::Relaxed);
            log::trace!("PiP pipeline busy, dropping frame {}", frame.size());
            return false;
        }

        let request = RenderRequest {
            frame,
            flip,
            target: self.config.target_size,
            in_flight: InFlight::begin(self.busy.clone(), self.counters.clone()),
        };

        let sent = match &self.request_tx {
            Some(tx) => tx.send(request).is_ok(),
            None => false,
        };

        if sent {
            self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            log::warn!("{}", PipError::Disconnected("conversion"));
        }
        sent
    }

    /// Resize the PiP surface. The output size follows `PipConfig::target_size`.
    pub fn set_size(&self, size: Size) {
        log::debug!(
            "Ignoring PiP resize to {}, rendering at {}",
            size,
            self.config.target_size
        );
    }

    /// Stop presenting. In-flight conversions finish but are not displayed.
    ///
    /// The stop takes effect immediately; the surface is flushed on the
    /// presentation queue, after any presentation job already posted.
    pub fn clean(&self) {
        if !self.display.stop() {
            return;
        }

        match &self.presenter {
            Some(presenter) => {
                let display = self.display.clone();
                presenter.execute(Box::new(move || display.flush()));
            }
            // Presentation queue already released
            None => self.display.flush(),
        }
    }

    /// Whether a frame is currently in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &PipConfig {
        &self.config
    }

    /// Get statistics
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            received: self.counters.received.load(Ordering::Relaxed),
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            dropped_busy: self.counters.dropped_busy.load(Ordering::Relaxed),
            dropped_stopped: self.counters.dropped_stopped.load(Ordering::Relaxed),
            conversion_failures: self.counters.conversion_failures.load(Ordering::Relaxed),
            max_in_flight: self.counters.max_in_flight.load(Ordering::SeqCst),
            display: self.display.stats(),
        }
    }

    /// Spawn the conversion thread
    ///
    /// The thread owns the renderer and its buffer cache.
    fn spawn_convert_thread(
        config: &PipConfig,
        request_rx: Receiver<RenderRequest>,
        mut renderer: Box<dyn FrameRenderer>,
        display: Arc<DisplayAdapter>,
        presenter: Arc<dyn Executor>,
        counters: Arc<Counters>,
    ) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name(config.convert_thread_name.clone())
            .spawn(move || {
                let mut handled = 0u64;

                for request in request_rx.iter() {
                    handled += 1;
                    let RenderRequest {
                        frame,
                        flip,
                        target,
                        in_flight,
                    } = request;

                    let Some(sample) = renderer.render(&frame, target, flip) else {
                        counters.conversion_failures.fetch_add(1, Ordering::Relaxed);
                        continue;
                    };

                    if display.is_stopped() {
                        display.note_suppressed();
                        continue;
                    }

                    let display = display.clone();
                    presenter.execute(Box::new(move || {
                        display.present(sample);
                        drop(in_flight);
                    }));
                }

                log::info!(
                    "PiP conversion thread exiting after {} frames ({} failed)",
                    handled,
                    counters.conversion_failures.load(Ordering::Relaxed)
                );
            })?;

        Ok(handle)
    }

    /// Stop the conversion thread after it finishes the current request
    ///
    /// Releases the presentation queue last, so a queue owned by the
    /// dispatcher runs the posted jobs before its thread exits.
    pub fn shutdown(&mut self) {
        self.request_tx.take();

        if let Some(handle) = self.thread_handle.take() {
            handle.join().ok();
        }

        self.presenter.take();
    }
}

impl Drop for FrameDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatcherStats {
    pub received: u64,
    pub accepted: u64,
    pub dropped_busy: u64,
    pub dropped_stopped: u64,
    pub conversion_failures: u64,
    /// Highest number of frames ever in flight at once (never above 1)
    pub max_in_flight: usize,
    pub display: DisplayStats,
}
