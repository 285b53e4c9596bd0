// src/render/pool.rs
// =============================================================================
// Fixed-size pool of renderer handles.
//
// All W handles are created up front and handed to the pool. A worker calls
// acquire(), which waits on a semaphore until a handle is free, and gets back
// a PooledHandle guard. Dropping the guard puts the handle back, on every
// path out of the worker (success, error or panic unwind).
//
// Invariants:
// - permits available == handles sitting in the pool
// - outstanding handles never exceed the capacity
// - a handle is only reachable through the one guard that owns it
// =============================================================================

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::warn;

use crate::error::PoolError;

#[derive(Debug)]
pub struct ResourcePool<H> {
    idle: Mutex<Vec<H>>,
    permits: Semaphore,
    capacity: usize,
    outstanding: AtomicUsize,
}

impl<H> ResourcePool<H> {
    /// Takes ownership of the pre-created handles.
    pub fn new(handles: Vec<H>) -> Result<Self, PoolError> {
        if handles.is_empty() {
            return Err(PoolError::Empty);
        }
        let capacity = handles.len();
        Ok(Self {
            idle: Mutex::new(handles),
            permits: Semaphore::new(capacity),
            capacity,
            outstanding: AtomicUsize::new(0),
        })
    }

    /// Waits until a handle is free and borrows it.
    pub async fn acquire(&self) -> Result<PooledHandle<'_, H>, PoolError> {
        let permit = self.permits.acquire().await.map_err(|_| PoolError::Closed)?;
        // A permit guarantees an idle handle; an empty vec means shutdown won the race
        let handle = self.idle.lock().pop().ok_or(PoolError::Closed)?;
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Ok(PooledHandle {
            pool: self,
            handle: Some(handle),
            _permit: permit,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Handles currently borrowed by workers.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stops handing out handles and returns every idle one for destruction.
    ///
    /// Call only after all workers have stopped.
    pub fn shutdown(&self) -> Vec<H> {
        self.permits.close();
        let handles: Vec<H> = std::mem::take(&mut *self.idle.lock());
        if handles.len() != self.capacity {
            warn!(
                returned = handles.len(),
                capacity = self.capacity,
                "resource pool shut down with handles still borrowed"
            );
        }
        handles
    }

    fn give_back(&self, handle: H) {
        self.idle.lock().push(handle);
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Exclusive borrow of one pooled handle.
#[derive(Debug)]
pub struct PooledHandle<'a, H> {
    pool: &'a ResourcePool<H>,
    handle: Option<H>,
    // Released after Drop::drop has returned the handle
    _permit: SemaphorePermit<'a>,
}

impl<H> Deref for PooledHandle<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        match self.handle.as_ref() {
            Some(handle) => handle,
            None => unreachable!("pooled handle is only taken in drop"),
        }
    }
}

impl<H> DerefMut for PooledHandle<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        match self.handle.as_mut() {
            Some(handle) => handle,
            None => unreachable!("pooled handle is only taken in drop"),
        }
    }
}

impl<H> Drop for PooledHandle<'_, H> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.give_back(handle);
        }
    }
}
