//! Reusable body buffers.
//!
//! A [`BufferPool`] is owned by a client or responder and shared between the calls
//! it serves. Buffers are handed out as [`PooledBuffer`] guards: they are empty when
//! acquired and go back to the pool, cleared, when the guard drops, so an early
//! return or a panic during decode cannot leak a dirty buffer.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

const DEFAULT_MAX_IDLE: usize = 64;
const DEFAULT_MAX_CAPACITY: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    idle: Mutex<Vec<Vec<u8>>>,
    max_idle: usize,
    max_capacity: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE, DEFAULT_MAX_CAPACITY)
    }
}

impl BufferPool {
    /// Keeps at most `max_idle` buffers, dropping any that grew beyond `max_capacity`.
    pub fn new(max_idle: usize, max_capacity: usize) -> Self {
        Self { inner: Arc::new(Inner { idle: Mutex::new(Vec::new()), max_idle, max_capacity }) }
    }

    pub fn acquire(&self) -> PooledBuffer {
        let buf = self.idle().pop().unwrap_or_default();
        PooledBuffer { buf, pool: Arc::clone(&self.inner) }
    }

    /// The number of buffers waiting to be reused.
    pub fn idle_count(&self) -> usize {
        self.idle().len()
    }

    fn idle(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        self.inner.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: Arc<Inner>,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if self.buf.capacity() > self.pool.max_capacity {
            return;
        }
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();

        let mut idle = self.pool.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.pool.max_idle {
            idle.push(buf);
        }
    }
}
