// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-thread scratch state handed into publish, receive and pull.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::ThreadId;

use super::buffer_pool::BufferPool;
use super::handles::UnusedBuffer;
use crate::core::types::DataType;

/// Counters collected while propagating values from this thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishCache {
    /// Publish calls started on this thread.
    pub publishes: u64,
    /// Port assignments performed through receive.
    pub receives: u64,
    /// Values rejected by a bounds policy.
    pub discarded: u64,
    /// Pull operations started on this thread.
    pub pulls: u64,
    /// Deepest receive recursion seen.
    pub max_depth: usize,
    pub(crate) depth: usize,
}

impl PublishCache {
    pub(crate) fn enter(&mut self) {
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }
}

/// Buffer pools and publish scratch state of one thread.
///
/// Created on the thread that uses it and never moved (`!Send`). Every
/// thread container loop owns one; application threads create their own via
/// [`FlowRuntime::thread_context`](crate::core::FlowRuntime::thread_context).
pub struct ThreadContext {
    name: String,
    thread: ThreadId,
    pools: HashMap<u16, BufferPool>,
    cache: PublishCache,
    _not_send: PhantomData<*const ()>,
}

impl ThreadContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            thread: std::thread::current().id(),
            pools: HashMap::new(),
            cache: PublishCache::default(),
            _not_send: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    /// Unused buffer of `data_type` from this thread's pool.
    pub fn get_unused_buffer(&mut self, data_type: &DataType) -> UnusedBuffer {
        let pool = self
            .pools
            .entry(data_type.uid())
            .or_insert_with(|| BufferPool::new(data_type.clone()));
        let manager = pool.get_unused_buffer();
        UnusedBuffer::new(manager, pool_handle(pool))
    }

    pub fn pool(&self, data_type: &DataType) -> Option<&BufferPool> {
        self.pools.get(&data_type.uid())
    }

    /// Recycle buffers other threads returned to any of this thread's pools.
    pub fn reclaim_returns(&self) -> usize {
        self.pools.values().map(BufferPool::reclaim_returns).sum()
    }

    pub fn publish_cache(&self) -> &PublishCache {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut PublishCache {
        &mut self.cache
    }
}

fn pool_handle(pool: &BufferPool) -> std::sync::Weak<super::buffer_pool::PoolShared> {
    Arc::downgrade(pool.shared())
}

impl std::fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadContext")
            .field("name", &self.name)
            .field("thread", &self.thread)
            .field("pools", &self.pools.len())
            .field("cache", &self.cache)
            .finish()
    }
}
