// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Zero-copy buffer management: reference-counted buffers, per-thread pools
//! and the cross-thread return path.

mod buffer_manager;
mod buffer_pool;
mod handles;
mod thread_context;

pub use buffer_manager::BufferManager;
pub use buffer_pool::BufferPool;
pub use handles::{LockedBuffer, UnusedBuffer};
pub use thread_context::{PublishCache, ThreadContext};
