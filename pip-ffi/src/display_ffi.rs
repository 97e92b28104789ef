//! Display surface FFI bindings
//!
//! Lets a C host supply the display surface as a table of callbacks.

use libc::{c_int, c_void};
use pip_video::{DisplayLayer, SampleBuffer};

/// Borrowed view of a converted NV12 full-range sample
///
/// Plane pointers are only valid for the duration of the `enqueue` callback;
/// hosts that keep the image must copy it.
#[repr(C)]
pub struct CPipSample {
    pub data_y: *const u8,
    pub stride_y: u32,
    pub data_uv: *const u8,
    pub stride_uv: u32,
    pub width: u32,
    pub height: u32,
    pub pts_value: i64,
    pub pts_timescale: i32,
}

/// Host display surface callbacks
///
/// Every callback receives `user_data`. `enqueue` is required; a missing
/// `is_ready_for_more_media_data` means the surface is always ready.
/// `release` is called once when the renderer is destroyed.
#[repr(C)]
pub struct CPipDisplayCallbacks {
    pub user_data: *mut c_void,
    pub is_ready_for_more_media_data: Option<unsafe extern "C" fn(user_data: *mut c_void) -> c_int>,
    pub enqueue: Option<unsafe extern "C" fn(user_data: *mut c_void, sample: *const CPipSample)>,
    pub flush_and_remove_image: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
    pub release: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
}

/// [`DisplayLayer`] backed by C callbacks
pub(crate) struct CallbackLayer {
    callbacks: CPipDisplayCallbacks,
}

// The host guarantees its callbacks may be invoked from the presentation thread.
unsafe impl Send for CallbackLayer {}
unsafe impl Sync for CallbackLayer {}

impl CallbackLayer {
    /// Returns `None` when the required `enqueue` callback is missing.
    pub(crate) fn new(callbacks: CPipDisplayCallbacks) -> Option<Self> {
        if callbacks.enqueue.is_none() {
            return None;
        }
        Some(Self { callbacks })
    }
}

impl DisplayLayer for CallbackLayer {
    fn is_ready_for_more_media_data(&self) -> bool {
        match self.callbacks.is_ready_for_more_media_data {
            Some(is_ready) => unsafe { is_ready(self.callbacks.user_data) != 0 },
            None => true,
        }
    }

    fn enqueue(&self, sample: SampleBuffer) {
        let Some(enqueue) = self.callbacks.enqueue else {
            return;
        };

        let buffer = sample.pixel_buffer();
        let planes = buffer.lock_planes();
        let pts = sample.presentation_time();

        let view = CPipSample {
            data_y: planes.y.as_ptr(),
            stride_y: buffer.stride_y() as u32,
            data_uv: planes.uv.as_ptr(),
            stride_uv: buffer.stride_uv() as u32,
            width: buffer.width(),
            height: buffer.height(),
            pts_value: pts.value,
            pts_timescale: pts.timescale,
        };

        unsafe { enqueue(self.callbacks.user_data, &view) };
    }

    fn flush_and_remove_image(&self) {
        if let Some(flush) = self.callbacks.flush_and_remove_image {
            unsafe { flush(self.callbacks.user_data) };
        }
    }
}

impl Drop for CallbackLayer {
    fn drop(&mut self) {
        if let Some(release) = self.callbacks.release {
            unsafe { release(self.callbacks.user_data) };
        }
    }
}
