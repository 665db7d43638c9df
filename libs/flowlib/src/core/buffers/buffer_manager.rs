// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Reference-counted, reusable payload buffer.
//!
//! The lock count and the reuse generation live in one `AtomicU64`
//! (`generation << 32 | count`), so `try_lock` can detect a concurrent
//! recycle-to-zero and a reuse in the same compare-and-swap.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::buffer_pool::PoolShared;
use crate::core::types::{DataType, PortValue};

const COUNT_MASK: u64 = 0xFFFF_FFFF;
const GENERATION_SHIFT: u32 = 32;

#[inline]
fn count_of(state: u64) -> u32 {
    (state & COUNT_MASK) as u32
}

#[inline]
fn generation_of(state: u64) -> u32 {
    (state >> GENERATION_SHIFT) as u32
}

/// One payload instance plus its lock bookkeeping.
///
/// While `unused` the buffer is only reachable through an
/// [`UnusedBuffer`](super::UnusedBuffer) on its owner thread. Once locked the
/// payload must be treated as immutable.
pub struct BufferManager {
    state: AtomicU64,
    unused: AtomicBool,
    owner: ThreadId,
    data_type: DataType,
    pool: Weak<PoolShared>,
    timestamp_ns: AtomicI64,
    data: RwLock<Box<dyn PortValue>>,
}

impl BufferManager {
    pub(crate) fn new(data_type: DataType, owner: ThreadId, pool: Weak<PoolShared>) -> Self {
        let data = data_type.create_instance();
        Self {
            state: AtomicU64::new(0),
            unused: AtomicBool::new(true),
            owner,
            data_type,
            pool,
            timestamp_ns: AtomicI64::new(0),
            data: RwLock::new(data),
        }
    }

    /// Pool-less buffer holding a copy of `value`, locked once.
    ///
    /// Used for port default values; dropped when its last lock goes.
    pub(crate) fn standalone(data_type: DataType, value: &dyn PortValue) -> Arc<Self> {
        let manager = Arc::new(Self::new(
            data_type,
            std::thread::current().id(),
            Weak::new(),
        ));
        manager.data.write().copy_from(value);
        manager.set_locks(1);
        manager
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn lock_count(&self) -> u32 {
        count_of(self.state.load(Ordering::Acquire))
    }

    pub fn generation(&self) -> u32 {
        generation_of(self.state.load(Ordering::Acquire))
    }

    pub fn is_unused(&self) -> bool {
        self.unused.load(Ordering::Acquire)
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns.load(Ordering::Relaxed)
    }

    pub(crate) fn set_timestamp_ns(&self, timestamp_ns: i64) {
        self.timestamp_ns.store(timestamp_ns, Ordering::Relaxed);
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Box<dyn PortValue>> {
        self.data.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Box<dyn PortValue>> {
        self.data.write()
    }

    /// Transition from unused to used with `locks` initial locks.
    pub(crate) fn set_locks(&self, locks: u32) {
        assert!(
            self.is_unused(),
            "set_locks on a buffer that is already in use"
        );
        assert!(locks > 0, "set_locks requires at least one lock");
        let generation = self.generation() as u64;
        self.state.store(
            (generation << GENERATION_SHIFT) | locks as u64,
            Ordering::Release,
        );
        self.unused.store(false, Ordering::Release);
    }

    /// Add `locks` to a buffer that is already locked.
    pub(crate) fn add_lock(&self, locks: u32) {
        assert!(
            !self.is_unused(),
            "add_lock on an unused buffer (use set_locks)"
        );
        let previous = self.state.fetch_add(locks as u64, Ordering::AcqRel);
        debug_assert!(
            count_of(previous) > 0,
            "add_lock on a buffer whose lock count already reached zero"
        );
    }

    /// Optimistically add one lock.
    ///
    /// Succeeds only while the count is above zero and the buffer is still in
    /// `generation`; a buffer recycled in between is never resurrected.
    pub(crate) fn try_lock(&self, generation: u32) -> bool {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if count_of(state) == 0 || generation_of(state) != generation {
                return false;
            }
            match self.state.compare_exchange_weak(
                state,
                state + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => state = actual,
            }
        }
    }

    /// Release `locks`. Reaching zero hands the buffer back to its pool: directly
    /// on the owner thread, through the pool's return queue otherwise.
    pub(crate) fn release_lock(self: &Arc<Self>, locks: u32) {
        let previous = self.state.fetch_sub(locks as u64, Ordering::AcqRel);
        let count = count_of(previous);
        assert!(
            count >= locks,
            "released {} locks on a buffer holding {} ({})",
            locks,
            count,
            self.data_type
        );
        if count == locks {
            self.on_last_lock_released();
        }
    }

    fn on_last_lock_released(self: &Arc<Self>) {
        let Some(pool) = self.pool.upgrade() else {
            // Pool-less or pool already gone: memory goes with the last Arc
            return;
        };
        if std::thread::current().id() == self.owner {
            pool.recycle(Arc::clone(self));
        } else {
            pool.enqueue_return(Arc::clone(self));
        }
    }

    /// Replace the payload with a fresh instance of its type.
    pub(crate) fn clear(&self) {
        *self.data.write() = self.data_type.create_instance();
        self.timestamp_ns.store(0, Ordering::Relaxed);
    }

    /// Reset payload-internal state and start a new generation. Owner thread only.
    pub(crate) fn recycle(&self) {
        debug_assert_eq!(std::thread::current().id(), self.owner);
        debug_assert_eq!(self.lock_count(), 0);
        self.clear();
        let next_generation = (self.generation() as u64 + 1) & COUNT_MASK;
        self.state
            .store(next_generation << GENERATION_SHIFT, Ordering::Release);
        self.unused.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferManager")
            .field("data_type", &self.data_type.name())
            .field("locks", &self.lock_count())
            .field("generation", &self.generation())
            .field("unused", &self.is_unused())
            .finish()
    }
}
