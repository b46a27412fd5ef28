//! Bucketed scratch-buffer pool.
//!
//! Buffers are grouped into seven power-of-four size classes from 256 bytes
//! to 1 MiB. [`BufferPool::acquire`] hands out a buffer whose capacity is at
//! least the class ceiling for the request; [`BufferPool::release`] files a
//! buffer under the largest class it can fully serve, so any buffer taken
//! from a class is big enough for every request mapped to it.
//!
//! # Example
//!
//! ```rust
//! use zenwebp_core::pool::BufferPool;
//!
//! let pool = BufferPool::new();
//! let mut scratch = pool.scoped(1000);
//! scratch.fill(0);
//! assert_eq!(scratch.len(), 1000);
//! // returned to the pool here
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, OnceLock, PoisonError};

use log::trace;

/// Size classes in bytes, ascending.
pub const SIZE_CLASSES: [usize; 7] = [
    256,
    1 << 10,
    4 << 10,
    16 << 10,
    64 << 10,
    256 << 10,
    1 << 20,
];

/// Upper bound on idle buffers kept per class.
const MAX_PER_CLASS: usize = 16;

/// Index of the smallest class that can hold `size` bytes, or `None` when
/// the request exceeds the largest class.
pub fn bucket_index(size: usize) -> Option<usize> {
    SIZE_CLASSES.iter().position(|&class| size <= class)
}

/// Index of the largest class whose size is at most `capacity`.
fn release_index(capacity: usize) -> Option<usize> {
    SIZE_CLASSES.iter().rposition(|&class| class <= capacity)
}

/// Thread-safe pool of reusable byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    classes: [Mutex<Vec<Vec<u8>>>; SIZE_CLASSES.len()],
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            classes: std::array::from_fn(|_| Mutex::new(Vec::new())),
        }
    }

    /// Take a buffer of length `size`. Contents are unspecified.
    pub fn acquire(&self, size: usize) -> Vec<u8> {
        let Some(idx) = bucket_index(size) else {
            trace!("pool: oversized request of {size} bytes");
            return vec![0; size];
        };
        let pooled = self.classes[idx]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let mut buf = match pooled {
            Some(buf) if buf.capacity() >= size => buf,
            _ => Vec::with_capacity(SIZE_CLASSES[idx]),
        };
        buf.resize(size, 0);
        buf
    }

    /// Return a buffer to the pool. Buffers smaller than the first class
    /// are dropped.
    pub fn release(&self, mut buf: Vec<u8>) {
        let Some(idx) = release_index(buf.capacity()) else {
            return;
        };
        buf.clear();
        let mut class = self.classes[idx]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if class.len() < MAX_PER_CLASS {
            class.push(buf);
        }
    }

    /// Take a buffer that goes back to this pool when the guard is dropped.
    pub fn scoped(&self, size: usize) -> PooledBuf<'_> {
        PooledBuf {
            pool: self,
            buf: self.acquire(size),
        }
    }

    /// Number of idle buffers held in class `idx`.
    pub fn idle_count(&self, idx: usize) -> usize {
        self.classes
            .get(idx)
            .map(|c| c.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }
}

/// Process-wide pool.
pub fn global() -> &'static BufferPool {
    static POOL: OnceLock<BufferPool> = OnceLock::new();
    POOL.get_or_init(BufferPool::new)
}

/// A pooled buffer released on drop.
#[derive(Debug)]
pub struct PooledBuf<'p> {
    pool: &'p BufferPool,
    buf: Vec<u8>,
}

impl PooledBuf<'_> {
    /// Detach the buffer from the pool.
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

impl Deref for PooledBuf<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for PooledBuf<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.release(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), Some(0));
        assert_eq!(bucket_index(256), Some(0));
        assert_eq!(bucket_index(257), Some(1));
        assert_eq!(bucket_index(1 << 20), Some(6));
        assert_eq!(bucket_index((1 << 20) + 1), None);
    }

    #[test]
    fn test_acquire_capacity_covers_class() {
        let pool = BufferPool::new();
        for &size in &[1usize, 100, 256, 300, 5000, 70_000, 1 << 20] {
            let buf = pool.acquire(size);
            assert_eq!(buf.len(), size);
            let idx = bucket_index(size).unwrap();
            assert!(buf.capacity() >= SIZE_CLASSES[idx]);
        }
    }

    #[test]
    fn test_oversized() {
        let pool = BufferPool::new();
        let buf = pool.acquire(3 << 20);
        assert_eq!(buf.len(), 3 << 20);
        pool.release(buf);
        assert_eq!(pool.idle_count(6), 1);
    }

    #[test]
    fn test_release_reuse() {
        let pool = BufferPool::new();
        let buf = pool.acquire(1000);
        pool.release(buf);
        assert_eq!(pool.idle_count(1), 1);
        let again = pool.acquire(900);
        assert_eq!(again.len(), 900);
        assert_eq!(pool.idle_count(1), 0);
    }

    #[test]
    fn test_small_buffer_dropped() {
        let pool = BufferPool::new();
        pool.release(Vec::with_capacity(100));
        for i in 0..SIZE_CLASSES.len() {
            assert_eq!(pool.idle_count(i), 0);
        }
    }

    #[test]
    fn test_release_files_under_lower_class() {
        // 3000 bytes of capacity cannot serve a 4 KiB request
        let pool = BufferPool::new();
        pool.release(Vec::with_capacity(3000));
        assert_eq!(pool.idle_count(1), 1);
        assert_eq!(pool.idle_count(2), 0);
    }

    #[test]
    fn test_scoped_returns_on_drop() {
        let pool = BufferPool::new();
        {
            let mut guard = pool.scoped(2000);
            guard[0] = 7;
            assert_eq!(guard.len(), 2000);
        }
        assert_eq!(pool.idle_count(2), 1);
    }

    #[test]
    fn test_class_limit() {
        let pool = BufferPool::new();
        for _ in 0..(MAX_PER_CLASS + 5) {
            pool.release(Vec::with_capacity(256));
        }
        assert_eq!(pool.idle_count(0), MAX_PER_CLASS);
    }
}
