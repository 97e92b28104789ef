//! PiP FFI - C Foreign Function Interface
//!
//! Provides a C-compatible API so the host UI layer can feed decoded frames
//! and supply its display surface.

use bytemuck::{Pod, Zeroable};
use libc::{c_char, c_int};
use std::ptr;
use std::slice;
use std::sync::Arc;

use pip_video::{
    chroma_dimensions, FrameBuffer, FrameDispatcher, I420Buffer, Nv12Buffer, PipConfig, PipError,
    SampleMode, Size, VideoFrame,
};

mod display_ffi;
pub use display_ffi::*;

/// Opaque handle to FrameDispatcher (C-compatible)
pub struct PipRenderer {
    _private: [u8; 0],
}

/// C-compatible renderer configuration
///
/// A zero width or height selects the default target size.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CPipConfig {
    pub target_width: u32,
    pub target_height: u32,
    pub sample_mode: u32, // 0 = ceil, 1 = nearest
}

impl From<CPipConfig> for PipConfig {
    fn from(c: CPipConfig) -> Self {
        let defaults = PipConfig::default();
        let target_size = if c.target_width == 0 || c.target_height == 0 {
            defaults.target_size
        } else {
            Size::new(c.target_width, c.target_height)
        };

        PipConfig {
            target_size,
            sample_mode: SampleMode::from_u32(c.sample_mode),
            ..defaults
        }
    }
}

/// C-compatible dispatcher statistics
#[repr(C)]
#[derive(Debug, Default)]
pub struct CPipStats {
    pub received: u64,
    pub accepted: u64,
    pub dropped_busy: u64,
    pub dropped_stopped: u64,
    pub conversion_failures: u64,
    pub presented: u64,
    pub not_ready: u64,
    pub suppressed: u64,
}

/// Bytes covered by `rows` rows of `row_bytes` at `stride`
fn plane_len(stride: u32, row_bytes: u32, rows: u32) -> Option<usize> {
    if stride < row_bytes || rows == 0 {
        return None;
    }
    (stride as usize)
        .checked_mul(rows as usize - 1)?
        .checked_add(row_bytes as usize)
}

/// Copy a caller-owned plane so it can outlive the submit call
///
/// # Safety
/// `data` must be null or valid for `len` bytes.
unsafe fn copy_plane(name: &str, data: *const u8, len: Option<usize>) -> Result<Arc<[u8]>, PipError> {
    if data.is_null() {
        return Err(PipError::InvalidFrame(format!("{name} plane pointer is null")));
    }
    let len = len.ok_or_else(|| PipError::InvalidFrame(format!("{name} plane geometry is invalid")))?;
    Ok(Arc::from(slice::from_raw_parts(data, len)))
}

unsafe fn submit(ptr: *mut PipRenderer, buffer: Result<FrameBuffer, PipError>, timestamp: u64, flip: c_int) -> c_int {
    let dispatcher = &*(ptr as *const FrameDispatcher);

    match buffer {
        Ok(buffer) => dispatcher.submit(VideoFrame::new(buffer, timestamp), flip != 0) as c_int,
        Err(e) => {
            log::warn!("Dropping frame from host: {e}");
            0
        }
    }
}

// ============================================================================
// RENDERER API
// ============================================================================

/// Create a new PiP renderer
///
/// `config` may be null for defaults. Returns null if the `enqueue` callback
/// is missing or the pipeline threads cannot start; `release` is not called
/// in that case.
///
/// # Safety
/// `config` must be null or valid. Callbacks must be callable from any thread.
#[no_mangle]
pub unsafe extern "C" fn pip_renderer_create(
    config: *const CPipConfig,
    callbacks: CPipDisplayCallbacks,
) -> *mut PipRenderer {
    let config = if config.is_null() {
        PipConfig::default()
    } else {
        PipConfig::from(*config)
    };

    let Some(layer) = CallbackLayer::new(callbacks) else {
        log::warn!("pip_renderer_create: enqueue callback is required");
        return ptr::null_mut();
    };

    match FrameDispatcher::new(config, Arc::new(layer)) {
        Ok(dispatcher) => Box::into_raw(Box::new(dispatcher)) as *mut PipRenderer,
        Err(e) => {
            log::warn!("pip_renderer_create failed: {e}");
            ptr::null_mut()
        }
    }
}

/// Destroy a renderer
///
/// Waits for the in-flight frame, then calls the `release` callback.
///
/// # Safety
/// Caller must ensure ptr is valid and not already freed.
#[no_mangle]
pub unsafe extern "C" fn pip_renderer_destroy(ptr: *mut PipRenderer) {
    if !ptr.is_null() {
        let _ = Box::from_raw(ptr as *mut FrameDispatcher);
    }
}

/// Submit a planar I420 frame. Returns 1 if accepted, 0 if dropped.
///
/// Planes are copied before returning.
///
/// # Safety
/// Caller must ensure ptr is valid and each plane pointer is null or covers
/// its declared stride and height.
#[no_mangle]
pub unsafe extern "C" fn pip_renderer_submit_i420(
    ptr: *mut PipRenderer,
    width: u32,
    height: u32,
    data_y: *const u8,
    stride_y: u32,
    data_u: *const u8,
    stride_u: u32,
    data_v: *const u8,
    stride_v: u32,
    timestamp: u64,
    flip: c_int,
) -> c_int {
    if ptr.is_null() {
        return 0;
    }

    let (cw, ch) = chroma_dimensions(width, height);
    let buffer = (|| {
        let y = copy_plane("Y", data_y, plane_len(stride_y, width, height))?;
        let u = copy_plane("U", data_u, plane_len(stride_u, cw, ch))?;
        let v = copy_plane("V", data_v, plane_len(stride_v, cw, ch))?;
        I420Buffer::new(
            width,
            height,
            y,
            stride_y as usize,
            u,
            stride_u as usize,
            v,
            stride_v as usize,
        )
        .map(FrameBuffer::I420)
    })();

    submit(ptr, buffer, timestamp, flip)
}

/// Submit a biplanar NV12 frame. Returns 1 if accepted, 0 if dropped.
///
/// # Safety
/// Same requirements as `pip_renderer_submit_i420`.
#[no_mangle]
pub unsafe extern "C" fn pip_renderer_submit_nv12(
    ptr: *mut PipRenderer,
    width: u32,
    height: u32,
    data_y: *const u8,
    stride_y: u32,
    data_uv: *const u8,
    stride_uv: u32,
    timestamp: u64,
    flip: c_int,
) -> c_int {
    if ptr.is_null() {
        return 0;
    }

    let (cw, ch) = chroma_dimensions(width, height);
    let buffer = (|| {
        let y = copy_plane("Y", data_y, plane_len(stride_y, width, height))?;
        let uv = copy_plane("UV", data_uv, plane_len(stride_uv, cw.saturating_mul(2), ch))?;
        Nv12Buffer::new(width, height, y, stride_y as usize, uv, stride_uv as usize)
            .map(FrameBuffer::Nv12)
    })();

    submit(ptr, buffer, timestamp, flip)
}

/// Notify the renderer that the PiP surface was resized
///
/// # Safety
/// Caller must ensure ptr is valid.
#[no_mangle]
pub unsafe extern "C" fn pip_renderer_set_size(ptr: *mut PipRenderer, width: u32, height: u32) {
    if ptr.is_null() {
        return;
    }

    let dispatcher = &*(ptr as *const FrameDispatcher);
    dispatcher.set_size(Size::new(width, height));
}

/// Stop presenting frames
///
/// # Safety
/// Caller must ensure ptr is valid.
#[no_mangle]
pub unsafe extern "C" fn pip_renderer_clean(ptr: *mut PipRenderer) {
    if ptr.is_null() {
        return;
    }

    let dispatcher = &*(ptr as *const FrameDispatcher);
    dispatcher.clean();
}

/// Get renderer statistics. Returns 1 on success.
///
/// # Safety
/// Caller must ensure ptr and stats_out are valid.
#[no_mangle]
pub unsafe extern "C" fn pip_renderer_get_stats(
    ptr: *const PipRenderer,
    stats_out: *mut CPipStats,
) -> c_int {
    if ptr.is_null() || stats_out.is_null() {
        return 0;
    }

    let stats = (*(ptr as *const FrameDispatcher)).stats();
    *stats_out = CPipStats {
        received: stats.received,
        accepted: stats.accepted,
        dropped_busy: stats.dropped_busy,
        dropped_stopped: stats.dropped_stopped,
        conversion_failures: stats.conversion_failures,
        presented: stats.display.presented,
        not_ready: stats.display.not_ready,
        suppressed: stats.display.suppressed,
    };
    1
}

// ============================================================================
// UTILITY FUNCTIONS
// ============================================================================

/// Get library version string
#[no_mangle]
pub extern "C" fn pip_version() -> *const c_char {
    "0.1.0\0".as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use libc::c_void;
    use std::ffi::CStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct HostSurface {
        enqueued: AtomicUsize,
        released: AtomicUsize,
        flushed: AtomicUsize,
        last_width: AtomicUsize,
        first_luma: AtomicUsize,
    }

    unsafe extern "C" fn host_enqueue(user_data: *mut c_void, sample: *const CPipSample) {
        let host = &*(user_data as *const HostSurface);
        let sample = &*sample;
        host.last_width.store(sample.width as usize, Ordering::SeqCst);
        host.first_luma.store(*sample.data_y as usize, Ordering::SeqCst);
        host.enqueued.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn host_flush(user_data: *mut c_void) {
        let host = &*(user_data as *const HostSurface);
        host.flushed.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn host_release(user_data: *mut c_void) {
        let host = &*(user_data as *const HostSurface);
        host.released.fetch_add(1, Ordering::SeqCst);
    }

    fn callbacks(host: &HostSurface) -> CPipDisplayCallbacks {
        CPipDisplayCallbacks {
            user_data: host as *const HostSurface as *mut c_void,
            is_ready_for_more_media_data: None,
            enqueue: Some(host_enqueue),
            flush_and_remove_image: Some(host_flush),
            release: Some(host_release),
        }
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    fn config() -> CPipConfig {
        CPipConfig {
            target_width: 8,
            target_height: 8,
            sample_mode: 0,
        }
    }

    #[test]
    fn test_renderer_ffi_i420() {
        let host = HostSurface::default();
        let y = [42u8; 16];
        let uv = [128u8; 4];

        unsafe {
            let renderer = pip_renderer_create(&config(), callbacks(&host));
            assert!(!renderer.is_null());

            let accepted = pip_renderer_submit_i420(
                renderer,
                4,
                4,
                y.as_ptr(),
                4,
                uv.as_ptr(),
                2,
                uv.as_ptr(),
                2,
                0,
                0,
            );
            assert_eq!(accepted, 1);
            assert!(wait_until(|| host.enqueued.load(Ordering::SeqCst) == 1));
            assert_eq!(host.last_width.load(Ordering::SeqCst), 8);
            assert_eq!(host.first_luma.load(Ordering::SeqCst), 42);

            let mut stats = CPipStats::default();
            assert_eq!(pip_renderer_get_stats(renderer, &mut stats), 1);
            assert_eq!(stats.accepted, 1);

            pip_renderer_destroy(renderer);
        }

        assert_eq!(host.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_null_plane_rejected() {
        let host = HostSurface::default();
        let y = [0u8; 16];
        let uv = [0u8; 8];

        unsafe {
            let renderer = pip_renderer_create(ptr::null(), callbacks(&host));
            assert!(!renderer.is_null());

            let accepted = pip_renderer_submit_nv12(
                renderer,
                4,
                4,
                y.as_ptr(),
                4,
                ptr::null(),
                4,
                0,
                0,
            );
            assert_eq!(accepted, 0);

            let accepted = pip_renderer_submit_nv12(renderer, 4, 4, y.as_ptr(), 4, uv.as_ptr(), 4, 0, 1);
            assert_eq!(accepted, 1);
            assert!(wait_until(|| host.enqueued.load(Ordering::SeqCst) == 1));

            pip_renderer_destroy(renderer);
        }
    }

    #[test]
    fn test_clean_flushes_and_stops() {
        let host = HostSurface::default();
        let y = [0u8; 16];
        let uv = [0u8; 4];

        unsafe {
            let renderer = pip_renderer_create(&config(), callbacks(&host));
            pip_renderer_set_size(renderer, 100, 100);
            pip_renderer_clean(renderer);

            let accepted =
                pip_renderer_submit_i420(renderer, 4, 4, y.as_ptr(), 4, uv.as_ptr(), 2, uv.as_ptr(), 2, 0, 0);
            assert_eq!(accepted, 0);
            assert!(wait_until(|| host.flushed.load(Ordering::SeqCst) == 1));

            pip_renderer_destroy(renderer);
        }

        assert_eq!(host.enqueued.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_c_config_zero_size_falls_back_to_default() {
        let config = PipConfig::from(CPipConfig::zeroed());
        assert_eq!(config.target_size, PipConfig::default().target_size);
        assert_eq!(config.sample_mode, SampleMode::Ceil);
    }

    #[test]
    fn test_c_config_conversion() {
        let config = PipConfig::from(CPipConfig {
            target_width: 320,
            target_height: 240,
            sample_mode: SampleMode::Nearest as u32,
        });
        assert_eq!(config.target_size, Size::new(320, 240));
        assert_eq!(config.sample_mode, SampleMode::Nearest);
    }

    #[test]
    fn test_header_declares_config_before_use() {
        let header = std::fs::read_to_string(concat!(env!("OUT_DIR"), "/pip_ffi.h")).unwrap();

        let config = header.find("struct CPipConfig {").expect("CPipConfig is declared");
        let create = header.find("pip_renderer_create(").expect("create is declared");
        assert!(config < create);
        assert!(header.contains("struct CPipDisplayCallbacks {"));
        assert!(header.contains("struct CPipStats {"));
    }

    #[test]
    fn test_missing_enqueue_callback() {
        let host = HostSurface::default();
        let mut table = callbacks(&host);
        table.enqueue = None;

        unsafe {
            assert!(pip_renderer_create(ptr::null(), table).is_null());
        }
    }

    #[test]
    fn test_plane_len() {
        assert_eq!(plane_len(6, 4, 3), Some(16));
        assert_eq!(plane_len(2, 4, 3), None);
        assert_eq!(plane_len(4, 4, 0), None);
    }

    #[test]
    fn test_version() {
        unsafe {
            let version = pip_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, "0.1.0");
        }
    }
}
