// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Bounded FIFO of values received by a port.
//!
//! On overflow the oldest unread value is dropped: a reader sees at most
//! `capacity` outstanding values, never the full history.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_queue::ArrayQueue;
use parking_lot::RwLock;

use crate::core::buffers::LockedBuffer;

pub struct PortQueue {
    entries: RwLock<ArrayQueue<LockedBuffer>>,
    dropped: AtomicU64,
}

impl PortQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(ArrayQueue::new(capacity.max(1))),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.read().capacity()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Values dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Never blocks. Drops (and unlocks) the oldest value when full.
    pub fn enqueue(&self, value: LockedBuffer) {
        if let Some(oldest) = self.entries.read().force_push(value) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            drop(oldest);
        }
    }

    pub fn dequeue_one(&self) -> Option<LockedBuffer> {
        self.entries.read().pop()
    }

    /// Move everything currently queued into `fragment`, oldest first.
    /// Returns the number of values moved.
    pub fn dequeue_all(&self, fragment: &mut QueueFragment) -> usize {
        let entries = self.entries.read();
        let mut moved = 0;
        while let Some(value) = entries.pop() {
            fragment.values.push_back(value);
            moved += 1;
        }
        moved
    }

    /// Replace the queue with one of `capacity`, keeping the newest values.
    ///
    /// Only valid while nothing publishes to the port.
    pub fn set_capacity(&self, capacity: usize) {
        let mut entries = self.entries.write();
        let replacement = ArrayQueue::new(capacity.max(1));
        while let Some(value) = entries.pop() {
            if replacement.force_push(value).is_some() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        *entries = replacement;
    }

    /// Unlock and drop every queued value.
    pub fn clear(&self) {
        let entries = self.entries.read();
        while entries.pop().is_some() {}
    }
}

impl std::fmt::Debug for PortQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("dropped", &self.dropped())
            .finish()
    }
}

/// Values taken out of a port queue in one go.
#[derive(Debug, Default)]
pub struct QueueFragment {
    values: VecDeque<LockedBuffer>,
}

impl QueueFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Oldest remaining value.
    pub fn pop_front(&mut self) -> Option<LockedBuffer> {
        self.values.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LockedBuffer> {
        self.values.iter()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = LockedBuffer> + '_ {
        self.values.drain(..)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffers::ThreadContext;
    use crate::core::types::TypeRegistry;

    fn value(ctx: &mut ThreadContext, registry: &TypeRegistry, v: i32) -> LockedBuffer {
        let mut buffer = ctx.get_unused_buffer(&registry.get::<i32>().unwrap());
        buffer.set(v).unwrap();
        buffer.into_locked()
    }

    #[test]
    fn test_fifo_order() {
        let registry = TypeRegistry::new();
        let mut ctx = ThreadContext::new("test");
        let queue = PortQueue::new(4);
        for v in 1..=3 {
            queue.enqueue(value(&mut ctx, &registry, v));
        }
        assert_eq!(queue.dequeue_one().unwrap().value::<i32>(), Some(1));
        assert_eq!(queue.dequeue_one().unwrap().value::<i32>(), Some(2));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_overflow_drops_oldest_and_unlocks_it() {
        let registry = TypeRegistry::new();
        let mut ctx = ThreadContext::new("test");
        let queue = PortQueue::new(2);

        let first = value(&mut ctx, &registry, 1);
        let observer = first.clone();
        queue.enqueue(first);
        queue.enqueue(value(&mut ctx, &registry, 2));
        queue.enqueue(value(&mut ctx, &registry, 3));

        assert_eq!(queue.dropped(), 1);
        assert_eq!(observer.lock_count(), 1);

        let mut fragment = QueueFragment::new();
        assert_eq!(queue.dequeue_all(&mut fragment), 2);
        let values: Vec<i32> = fragment.drain().filter_map(|b| b.value::<i32>()).collect();
        assert_eq!(values, vec![2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_shrink_keeps_newest() {
        let registry = TypeRegistry::new();
        let mut ctx = ThreadContext::new("test");
        let queue = PortQueue::new(8);
        for v in 1..=5 {
            queue.enqueue(value(&mut ctx, &registry, v));
        }
        queue.set_capacity(2);
        assert_eq!(queue.capacity(), 2);
        assert_eq!(queue.dequeue_one().unwrap().value::<i32>(), Some(4));
        assert_eq!(queue.dequeue_one().unwrap().value::<i32>(), Some(5));
    }
}
