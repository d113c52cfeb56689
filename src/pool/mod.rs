//! Scratch resource pools.
//!
//! # Responsibilities
//! - Hand out reusable scratch objects (decompressors, byte buffers)
//! - Guarantee exclusive ownership while an object is checked out
//! - Reset every object before it re-enters the pool
//!
//! # Design Decisions
//! - Release happens in `Drop`, so early returns and `?` paths release too
//! - Idle objects are capped; surplus objects are dropped instead of pooled
//! - A poisoned lock is recovered, the pooled objects carry no invariants

pub mod scratch;

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

pub use scratch::{Inflater, ScratchPools};

/// An object that can be returned to a request-independent state.
pub trait Reset {
    /// Clear all state left behind by the previous user.
    fn reset(&mut self);
}

impl Reset for Vec<u8> {
    fn reset(&mut self) {
        self.clear();
        if self.capacity() > scratch::MAX_RETAINED_BUFFER {
            self.shrink_to(scratch::MAX_RETAINED_BUFFER);
        }
    }
}

/// A bounded pool of reusable objects.
pub struct Pool<T: Reset> {
    idle: Mutex<Vec<T>>,
    make: fn() -> T,
    max_idle: usize,
}

impl<T: Reset> Pool<T> {
    /// Create an empty pool. New objects are built with `make` on demand.
    pub fn new(make: fn() -> T, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            make,
            max_idle,
        }
    }

    /// Check out an object. It returns to the pool when the guard drops.
    pub fn acquire(&self) -> Pooled<'_, T> {
        let item = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(self.make);
        Pooled {
            item: Some(item),
            pool: self,
        }
    }

    /// Number of objects currently waiting in the pool.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release(&self, mut item: T) {
        item.reset();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(item);
        }
    }
}

impl<T: Reset> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle_count())
            .field("max_idle", &self.max_idle)
            .finish()
    }
}

/// Scoped checkout of a pooled object.
pub struct Pooled<'a, T: Reset> {
    item: Option<T>,
    pool: &'a Pool<T>,
}

impl<T: Reset> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // `item` is only taken in `drop`.
        match &self.item {
            Some(item) => item,
            None => unreachable!("pooled item accessed after release"),
        }
    }
}

impl<T: Reset> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("pooled item accessed after release"),
        }
    }
}

impl<T: Reset> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}
