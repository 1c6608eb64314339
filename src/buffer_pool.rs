//! Pool of connection buffers shared by a server.

use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, LazyLock};

use crossbeam_queue::ArrayQueue;

use crate::buffer_set::BufferSet;

const POOL_CAPACITY: usize = 128;

/// Buffers grown past this are shrunk before they go back into the pool.
const RETAINED_CAPACITY: usize = 1 << 20;

/// Pool used by [`Opts::default`](crate::Opts).
pub static GLOBAL_BUFFER_POOL: LazyLock<Arc<BufferPool>> =
    LazyLock::new(|| Arc::new(BufferPool::default()));

/// A pooled `BufferSet` that returns itself to the pool on drop.
pub struct PooledBufferSet {
    pool: Arc<BufferPool>,
    inner: ManuallyDrop<BufferSet>,
}

impl std::fmt::Debug for PooledBufferSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBufferSet")
            .field("inner", &*self.inner)
            .finish_non_exhaustive()
    }
}

impl Deref for PooledBufferSet {
    type Target = BufferSet;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for PooledBufferSet {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl Drop for PooledBufferSet {
    fn drop(&mut self) {
        // SAFETY: inner is never accessed after this
        let buffer_set = unsafe { ManuallyDrop::take(&mut self.inner) };
        self.pool.release(buffer_set);
    }
}

/// Lock-free pool of [`BufferSet`]s, one checked out per live connection.
#[derive(Debug)]
pub struct BufferPool {
    buffer_sets: ArrayQueue<BufferSet>,
    retained_capacity: usize,
}

impl BufferPool {
    /// Create a pool holding at most `capacity` idle buffer sets.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer_sets: ArrayQueue::new(capacity),
            retained_capacity: RETAINED_CAPACITY,
        }
    }

    /// Set the largest per-buffer capacity kept when a set is released.
    pub fn with_retained_capacity(mut self, bytes: usize) -> Self {
        self.retained_capacity = bytes;
        self
    }

    /// Check out a buffer set, allocating one if the pool is empty.
    pub fn get_buffer_set(self: &Arc<Self>) -> PooledBufferSet {
        let buffer_set = self.buffer_sets.pop().unwrap_or_default();
        PooledBufferSet {
            pool: Arc::clone(self),
            inner: ManuallyDrop::new(buffer_set),
        }
    }

    /// Number of idle buffer sets.
    pub fn idle(&self) -> usize {
        self.buffer_sets.len()
    }

    fn release(&self, mut buffer_set: BufferSet) {
        for buf in [&mut buffer_set.read_buffer, &mut buffer_set.write_buffer] {
            buf.clear();
            if buf.capacity() > self.retained_capacity {
                buf.shrink_to(self.retained_capacity);
            }
        }
        // Dropped if the pool is full
        let _ = self.buffer_sets.push(buffer_set);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(POOL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_buffers_are_cleared_and_reused() {
        let pool = Arc::new(BufferPool::new(1));
        {
            let mut buffers = pool.get_buffer_set();
            buffers.read_buffer.extend_from_slice(b"leftover");
            buffers.write_buffer.reserve(1 << 16);
        }
        assert_eq!(pool.idle(), 1);

        let buffers = pool.get_buffer_set();
        assert!(buffers.read_buffer.is_empty());
        assert!(buffers.write_buffer.is_empty());
        assert!(buffers.write_buffer.capacity() >= 1 << 16);
    }

    #[test]
    fn oversized_buffers_are_shrunk() {
        let pool = Arc::new(BufferPool::new(1).with_retained_capacity(1024));
        {
            let mut buffers = pool.get_buffer_set();
            buffers.read_buffer.reserve(1 << 20);
        }
        let buffers = pool.get_buffer_set();
        assert!(buffers.read_buffer.capacity() < 1 << 20);
    }

    #[test]
    fn full_pool_drops_extra_sets() {
        let pool = Arc::new(BufferPool::new(1));
        let a = pool.get_buffer_set();
        let b = pool.get_buffer_set();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }
}
