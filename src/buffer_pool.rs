//! A per-connection scratch-buffer arena.
//!
//! Grounded on the Go reference's `sync.Pool` use in `connection.go`
//! (`c.buffers`), restated per `SPEC_FULL.md`'s REDESIGN FLAGS as a scoped
//! acquisition with guaranteed release on every exit path, rather than a
//! manual get/put pair a caller could forget to balance.

use std::sync::Mutex;

/// A simple pool of reusable byte buffers. Buffers are reset (cleared,
/// capacity retained) on acquisition and returned to the pool when the
/// guard drops — including on early return or panic unwinding — so
/// callers can't leak a buffer by forgetting to put it back.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a buffer, reusing one from the pool if available.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let mut buf = self
            .free
            .lock()
            .expect("buffer pool mutex poisoned")
            .pop()
            .unwrap_or_default();
        buf.clear();
        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }
}

/// A buffer checked out of a [`BufferPool`]. Returned to the pool on drop.
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Vec<u8>>,
}

impl std::ops::Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        self.buf.as_ref().expect("buffer taken before drop")
    }
}

impl std::ops::DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.as_mut().expect("buffer taken before drop")
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.free.lock().expect("buffer pool mutex poisoned").push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_reset_on_acquisition() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"leftover");
        }
        let buf = pool.acquire();
        assert!(buf.is_empty());
    }

    #[test]
    fn buffers_are_returned_on_drop() {
        let pool = BufferPool::new();
        for _ in 0..3 {
            let _buf = pool.acquire();
        }
        // All three acquisitions should have reused the single freed buffer.
        assert_eq!(pool.free.lock().unwrap().len(), 1);
    }
}
