// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Owning handles around [`BufferManager`]s.
//!
//! - [`UnusedBuffer`]: exclusive, writable, pinned to the owner thread.
//! - [`LockedBuffer`]: one lock on a published buffer; cloning adds a lock,
//!   dropping releases it.

use std::io::{Read, Write};
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::buffer_manager::BufferManager;
use super::buffer_pool::PoolShared;
use crate::core::types::{DataType, PortValue};
use crate::core::{FlowError, Result};

/// Buffer obtained from a pool, not yet published.
///
/// Not `Send`: it may only be filled and published by the thread owning the
/// pool it came from. Dropping it without publishing returns it to the pool.
pub struct UnusedBuffer {
    manager: Option<Arc<BufferManager>>,
    pool: Weak<PoolShared>,
    _owner_thread: PhantomData<*const ()>,
}

impl UnusedBuffer {
    pub(crate) fn new(manager: Arc<BufferManager>, pool: Weak<PoolShared>) -> Self {
        debug_assert!(manager.is_unused());
        Self {
            manager: Some(manager),
            pool,
            _owner_thread: PhantomData,
        }
    }

    fn manager(&self) -> &Arc<BufferManager> {
        self.manager
            .as_ref()
            .expect("UnusedBuffer accessed after being published")
    }

    pub fn data_type(&self) -> &DataType {
        self.manager().data_type()
    }

    /// Overwrite the payload with `value`.
    pub fn set<T: PortValue>(&mut self, value: T) -> Result<()> {
        let manager = self.manager();
        let mut data = manager.write();
        match data.as_any_mut().downcast_mut::<T>() {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(FlowError::TypeMismatch(format!(
                "cannot store {} in a {} buffer",
                std::any::type_name::<T>(),
                manager.data_type()
            ))),
        }
    }

    /// Mutate the payload in place. `None` if `T` is not the payload type.
    pub fn with_mut<T: 'static, R>(&mut self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut data = self.manager().write();
        data.as_any_mut().downcast_mut::<T>().map(f)
    }

    pub(crate) fn payload_mut(&mut self) -> RwLockWriteGuard<'_, Box<dyn PortValue>> {
        self.manager().write()
    }

    /// Deep copy `source` into the payload. False on type mismatch.
    pub fn copy_from(&mut self, source: &dyn PortValue) -> bool {
        self.manager().write().copy_from(source)
    }

    pub fn deserialize(&mut self, reader: &mut dyn Read) -> Result<()> {
        self.manager().write().deserialize_from(reader)
    }

    pub fn set_timestamp_ns(&mut self, timestamp_ns: i64) {
        self.manager().set_timestamp_ns(timestamp_ns);
    }

    /// Lock the buffer once and hand out the lock.
    pub(crate) fn into_locked(mut self) -> LockedBuffer {
        let manager = self
            .manager
            .take()
            .expect("UnusedBuffer published twice");
        manager.set_locks(1);
        LockedBuffer { manager }
    }
}

impl Drop for UnusedBuffer {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.take() {
            if let Some(pool) = self.pool.upgrade() {
                pool.put_back_unused(manager);
            }
        }
    }
}

impl std::fmt::Debug for UnusedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("UnusedBuffer").field(&self.manager).finish()
    }
}

/// One lock on a published buffer.
///
/// The payload is immutable for as long as any lock exists.
pub struct LockedBuffer {
    manager: Arc<BufferManager>,
}

impl LockedBuffer {
    /// Wrap a manager on which the caller already holds one lock.
    pub(crate) fn adopt(manager: Arc<BufferManager>) -> Self {
        debug_assert!(manager.lock_count() > 0);
        Self { manager }
    }

    pub(crate) fn manager(&self) -> &Arc<BufferManager> {
        &self.manager
    }

    pub fn data_type(&self) -> &DataType {
        self.manager.data_type()
    }

    pub fn lock_count(&self) -> u32 {
        self.manager.lock_count()
    }

    pub fn generation(&self) -> u32 {
        self.manager.generation()
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.manager.timestamp_ns()
    }

    /// Read access to the type-erased payload.
    pub fn payload(&self) -> RwLockReadGuard<'_, Box<dyn PortValue>> {
        self.manager.read()
    }

    pub fn with<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let data = self.manager.read();
        data.as_any().downcast_ref::<T>().map(f)
    }

    pub fn value<T: Clone + 'static>(&self) -> Option<T> {
        self.with(|v: &T| v.clone())
    }

    pub fn equals(&self, other: &dyn PortValue) -> bool {
        self.manager.read().equals(other)
    }

    /// Whether both handles lock the same buffer instance.
    pub fn same_buffer(&self, other: &LockedBuffer) -> bool {
        Arc::ptr_eq(&self.manager, &other.manager)
    }

    pub fn serialize(&self, writer: &mut dyn Write) -> Result<()> {
        self.manager.read().serialize_into(writer)
    }

    /// Explicitly give up this lock.
    pub fn release(self) {}
}

impl Clone for LockedBuffer {
    fn clone(&self) -> Self {
        self.manager.add_lock(1);
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

impl Drop for LockedBuffer {
    fn drop(&mut self) {
        self.manager.release_lock(1);
    }
}

impl std::fmt::Debug for LockedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedBuffer")
            .field("data_type", &self.manager.data_type().name())
            .field("payload", &*self.manager.read())
            .field("locks", &self.manager.lock_count())
            .finish()
    }
}
