//! Single-entry target buffer cache
//!
//! The converter renders every frame into the same pixel buffer as long as the
//! output size stays the same. A size change discards the old buffer and
//! allocates a new one.

use crate::error::Result;
use crate::pixel_buffer::PixelBuffer;
use crate::types::Size;
use std::sync::Arc;

/// Cache of one pixel buffer keyed by `"{width}_{height}"`
#[derive(Default)]
pub struct BufferCache {
    key: Option<String>,
    buffer: Option<Arc<PixelBuffer>>,
    allocations: u64,
    reuses: u64,
}

impl BufferCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the buffer for `size`, reallocating only when the key changes.
    ///
    /// On allocation failure the previously cached buffer is kept.
    pub fn acquire(&mut self, size: Size) -> Result<Arc<PixelBuffer>> {
        let key = size.key();

        if self.key.as_deref() == Some(key.as_str()) {
            if let Some(buffer) = &self.buffer {
                self.reuses += 1;
                return Ok(Arc::clone(buffer));
            }
        }

        let buffer = Arc::new(PixelBuffer::allocate(size.width, size.height)?);

        log::debug!(
            "Allocated pixel buffer {} for key {} (previous key {:?})",
            buffer.id(),
            key,
            self.key
        );

        self.buffer = Some(Arc::clone(&buffer));
        self.key = Some(key);
        self.allocations += 1;

        Ok(buffer)
    }

    /// Key of the cached buffer, if any
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Drop the cached buffer
    pub fn clear(&mut self) {
        self.buffer = None;
        self.key = None;
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            allocations: self.allocations,
            reuses: self.reuses,
            current: self.buffer.as_ref().map(|b| b.size()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub allocations: u64,
    pub reuses: u64,
    pub current: Option<Size>,
}
