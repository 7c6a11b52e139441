//! Buffer pools for the temporary read buffer used while stripping the
//! response header.
//!
//! A stream acquires one buffer for the first read from the transport. The
//! buffer goes back to its pool as soon as it is no longer needed, or, when
//! part of the payload did not fit in the caller's buffer, once that holdover
//! has been fully drained.
use core::{
    fmt::{Debug, Formatter},
    ops::{Deref, DerefMut},
};
use std::sync::{Arc, LazyLock, Mutex};

/// Size of the buffers handed out by [`RelayBufferPool`].
pub const RELAY_BUFFER_SIZE: usize = 20 * 1024;

/// The pool shared by streams that are not given one explicitly.
static DEFAULT_POOL: LazyLock<Arc<RelayBufferPool>> =
    LazyLock::new(|| Arc::new(RelayBufferPool::with_capacity(256)));

/// A source of reusable read buffers.
///
/// Implementations must be safe to share between the streams of many
/// connections.
pub trait BufferPool: Debug + Send + Sync {
    /// Returns a buffer to read into. Its length is the number of bytes the
    /// stream may read at once; it must not be empty.
    fn acquire(&self) -> Vec<u8>;

    /// Gives back a buffer previously returned by [`acquire`].
    ///
    /// [`acquire`]: BufferPool::acquire
    fn release(&self, buf: Vec<u8>);
}

/// A [`BufferPool`] handing out [`RELAY_BUFFER_SIZE`]-byte buffers and keeping
/// up to `capacity` idle buffers around for reuse.
#[derive(Debug)]
pub struct RelayBufferPool(Mutex<Inner>);

#[derive(Debug)]
struct Inner {
    idle: Vec<Vec<u8>>,
    capacity: usize,
}

impl RelayBufferPool {
    /// Creates an empty pool that keeps at most `capacity` idle buffers.
    pub fn with_capacity(capacity: usize) -> Self {
        RelayBufferPool(Mutex::new(Inner {
            idle: Vec::with_capacity(capacity),
            capacity,
        }))
    }

    /// Returns the number of idle buffers.
    pub fn idle(&self) -> usize {
        self.lock().idle.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // The inner state is a plain free list; a poisoned lock leaves it valid.
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BufferPool for RelayBufferPool {
    fn acquire(&self) -> Vec<u8> {
        match self.lock().idle.pop() {
            Some(buf) => buf,
            None => vec![0u8; RELAY_BUFFER_SIZE],
        }
    }

    fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() < RELAY_BUFFER_SIZE {
            return;
        }
        buf.resize(RELAY_BUFFER_SIZE, 0);
        let mut inner = self.lock();
        if inner.idle.len() < inner.capacity {
            inner.idle.push(buf);
        }
    }
}

/// Returns the process-wide default pool.
pub(crate) fn default_pool() -> Arc<dyn BufferPool> {
    DEFAULT_POOL.clone()
}

/// A buffer borrowed from a [`BufferPool`], given back when dropped.
pub(crate) struct PooledBuf {
    buf: Vec<u8>,
    pool: Arc<dyn BufferPool>,
}

impl PooledBuf {
    pub(crate) fn acquire_from(pool: &Arc<dyn BufferPool>) -> Self {
        Self {
            buf: pool.acquire(),
            pool: pool.clone(),
        }
    }
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        self.pool.release(core::mem::take(&mut self.buf));
    }
}

impl Debug for PooledBuf {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PooledBuf")
            .field("len", &self.buf.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_relay_pool_reuse() {
        let pool = RelayBufferPool::with_capacity(1);
        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(a.len(), RELAY_BUFFER_SIZE);
        assert_eq!(pool.idle(), 0);

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle(), 1);

        let c = pool.acquire();
        assert_eq!(c.len(), RELAY_BUFFER_SIZE);
        assert_eq!(pool.idle(), 0);

        // Foreign, undersized buffers are not kept.
        pool.release(vec![0u8; 16]);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_pooled_buf_released_on_drop() {
        let relay = Arc::new(RelayBufferPool::with_capacity(4));
        let pool: Arc<dyn BufferPool> = relay.clone();
        {
            let mut buf = PooledBuf::acquire_from(&pool);
            buf[0] = 0xaa;
            assert_eq!(relay.idle(), 0);
        }
        assert_eq!(relay.idle(), 1);
    }
}
