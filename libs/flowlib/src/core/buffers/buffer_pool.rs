// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-(type, thread) pool of reusable buffers.
//!
//! Only the owner thread recycles buffers and touches the free list. Other
//! threads that release the last lock push the buffer onto the return queue;
//! the owner drains it the next time it asks for an unused buffer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

use crossbeam_queue::SegQueue;

use super::buffer_manager::BufferManager;
use crate::core::types::DataType;

pub(crate) struct PoolShared {
    owner: ThreadId,
    data_type: DataType,
    free: SegQueue<Arc<BufferManager>>,
    returns: SegQueue<Arc<BufferManager>>,
    allocated: AtomicUsize,
}

impl PoolShared {
    /// Owner thread only.
    pub(crate) fn recycle(&self, buffer: Arc<BufferManager>) {
        debug_assert_eq!(std::thread::current().id(), self.owner);
        buffer.recycle();
        self.free.push(buffer);
    }

    /// Return an unused buffer that was never published. Owner thread only.
    pub(crate) fn put_back_unused(&self, buffer: Arc<BufferManager>) {
        debug_assert!(buffer.is_unused());
        buffer.clear();
        self.free.push(buffer);
    }

    /// Called by non-owner threads; leaves the buffer untouched.
    pub(crate) fn enqueue_return(&self, buffer: Arc<BufferManager>) {
        tracing::trace!(
            "Deferring recycle of {} buffer to owner thread {:?}",
            self.data_type,
            self.owner
        );
        self.returns.push(buffer);
    }
}

/// Pool of reusable [`BufferManager`]s for one data type, owned by one thread.
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    /// Create a pool owned by the calling thread.
    pub fn new(data_type: DataType) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                owner: std::thread::current().id(),
                data_type,
                free: SegQueue::new(),
                returns: SegQueue::new(),
                allocated: AtomicUsize::new(0),
            }),
        }
    }

    pub fn data_type(&self) -> &DataType {
        &self.shared.data_type
    }

    pub(crate) fn shared(&self) -> &Arc<PoolShared> {
        &self.shared
    }

    pub fn owner(&self) -> ThreadId {
        self.shared.owner
    }

    /// Unused buffer: a recycled one if available, otherwise a fresh one
    /// attached to this pool.
    ///
    /// # Panics
    ///
    /// Panics when called from any thread other than the owner.
    pub(crate) fn get_unused_buffer(&self) -> Arc<BufferManager> {
        assert_eq!(
            std::thread::current().id(),
            self.shared.owner,
            "buffer pool for {} used from a non-owner thread",
            self.shared.data_type
        );

        self.reclaim_returns();

        if let Some(buffer) = self.shared.free.pop() {
            debug_assert!(buffer.is_unused());
            return buffer;
        }

        let total = self.shared.allocated.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(
            "Allocating {} buffer #{} for thread {:?}",
            self.shared.data_type,
            total,
            self.shared.owner
        );
        Arc::new(BufferManager::new(
            self.shared.data_type.clone(),
            self.shared.owner,
            Arc::downgrade(&self.shared),
        ))
    }

    /// Recycle everything other threads handed back. Returns how many.
    pub fn reclaim_returns(&self) -> usize {
        let mut reclaimed = 0;
        while let Some(buffer) = self.shared.returns.pop() {
            self.shared.recycle(buffer);
            reclaimed += 1;
        }
        reclaimed
    }

    /// Buffers ever allocated by this pool.
    pub fn allocated(&self) -> usize {
        self.shared.allocated.load(Ordering::Relaxed)
    }

    /// Recycled buffers ready for reuse.
    pub fn available(&self) -> usize {
        self.shared.free.len()
    }

    /// Buffers released by other threads and not yet reclaimed.
    pub fn pending_returns(&self) -> usize {
        self.shared.returns.len()
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("data_type", &self.shared.data_type.name())
            .field("allocated", &self.allocated())
            .field("available", &self.available())
            .field("pending_returns", &self.pending_returns())
            .finish()
    }
}
