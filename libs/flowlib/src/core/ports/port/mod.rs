// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Typed, connectable port holding a current value.
//!
//! The current value is an atomically swappable reference to a
//! [`BufferManager`] on which the port always holds exactly one lock. Edge
//! and listener lists are copy-on-write snapshots so propagation can iterate
//! them while another thread connects or disconnects.

mod propagation;

use std::sync::atomic::{AtomicI16, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use parking_lot::RwLock;

use super::bounds::{Assign, Bounds};
use super::flags::PortFlags;
use super::listener::{PortListener, PullRequestHandler};
use super::options::{PortCreationInfo, DEFAULT_QUEUE_CAPACITY};
use super::queue::{PortQueue, QueueFragment};
use crate::core::buffers::{BufferManager, LockedBuffer, ThreadContext};
use crate::core::graph::ElementId;
use crate::core::types::{DataType, PortValue, Unit};
use crate::core::{FlowError, Result};

/// How values of a port are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Small payloads: readers copy the value optimistically.
    CheapCopy,
    /// Readers lock the current buffer.
    Standard,
}

pub struct Port {
    id: ElementId,
    name: String,
    data_type: DataType,
    kind: PortKind,
    unit: Unit,
    flags: AtomicU32,
    /// -1: nobody needs data, 0: pull, n > 0: push with n values queued.
    strategy: AtomicI16,
    current: ArcSwap<BufferManager>,
    default_value: LockedBuffer,
    assign: Assign,
    queue: Option<PortQueue>,
    outgoing: ArcSwap<Vec<Arc<Port>>>,
    incoming: ArcSwap<Vec<Weak<Port>>>,
    listeners: ArcSwap<Vec<Arc<dyn PortListener>>>,
    pull_handler: RwLock<Option<Arc<dyn PullRequestHandler>>>,
}

impl Port {
    /// Create a port whose current value is a copy of its default value.
    ///
    /// The port is not ready until [`set_ready`](Self::set_ready) is called.
    pub(crate) fn new(
        ctx: &mut ThreadContext,
        id: ElementId,
        info: PortCreationInfo,
    ) -> Result<Self> {
        let flags = info.effective_flags() - PortFlags::READY;
        let data_type = info.data_type;
        let unit = info.options.unit;

        let mut default_instance = data_type.create_instance();
        if let Some(value) = &info.default_value {
            if !default_instance.copy_from(&**value) {
                return Err(FlowError::TypeMismatch(format!(
                    "default value of port '{}' is not a {}",
                    info.name, data_type
                )));
            }
        }
        let default_value =
            LockedBuffer::adopt(BufferManager::standalone(data_type.clone(), &*default_instance));

        let assign = match &info.options.bounds {
            Some(config) => {
                if !data_type.is_numeric() {
                    return Err(FlowError::Configuration(format!(
                        "port '{}' has bounds but {} is not numeric",
                        info.name, data_type
                    )));
                }
                Assign::Bounded(Bounds::from_config(config, unit)?)
            }
            None => Assign::Standard,
        };

        let queue = flags.contains(PortFlags::HAS_QUEUE).then(|| {
            PortQueue::new(
                info.options
                    .queue_capacity
                    .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            )
        });

        let mut initial = ctx.get_unused_buffer(&data_type);
        if !initial.copy_from(&*default_instance) {
            return Err(FlowError::TypeMismatch(format!(
                "cannot initialise port '{}' with a {} buffer",
                info.name, data_type
            )));
        }
        let initial = initial.into_locked();
        let current = ArcSwap::new(Arc::clone(initial.manager()));
        // The port keeps its own lock; `initial` releases the creation lock.
        initial.manager().add_lock(1);
        drop(initial);

        let kind = if data_type.is_cheap_copy() {
            PortKind::CheapCopy
        } else {
            PortKind::Standard
        };

        let port = Self {
            id,
            name: info.name,
            data_type,
            kind,
            unit,
            flags: AtomicU32::new(flags.bits()),
            strategy: AtomicI16::new(-1),
            current,
            default_value,
            assign,
            queue,
            outgoing: ArcSwap::from_pointee(Vec::new()),
            incoming: ArcSwap::from_pointee(Vec::new()),
            listeners: ArcSwap::from_pointee(Vec::new()),
            pull_handler: RwLock::new(None),
        };
        port.strategy.store(port.own_strategy(), Ordering::Release);
        tracing::trace!("[{}] Created {:?} port of {}", port.name, kind, port.data_type);
        Ok(port)
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn bounds(&self) -> Option<&Bounds> {
        match &self.assign {
            Assign::Bounded(bounds) => Some(bounds),
            Assign::Standard => None,
        }
    }

    pub fn flags(&self) -> PortFlags {
        PortFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    fn set_flag(&self, flag: PortFlags, value: bool) {
        if value {
            self.flags.fetch_or(flag.bits(), Ordering::AcqRel);
        } else {
            self.flags.fetch_and(!flag.bits(), Ordering::AcqRel);
        }
    }

    pub fn is_ready(&self) -> bool {
        let flags = self.flags();
        flags.contains(PortFlags::READY) && !flags.contains(PortFlags::DELETED)
    }

    pub(crate) fn set_ready(&self) {
        self.set_flag(PortFlags::READY, true);
    }

    pub(crate) fn mark_deleted(&self) {
        self.set_flag(PortFlags::DELETED, true);
    }

    /// Whether buffers of `data_type` may be assigned to this port.
    pub fn accepts_type(&self, data_type: &DataType) -> bool {
        *data_type == self.data_type || self.flags().contains(PortFlags::MULTI_TYPE_BUFFER_POOL)
    }

    // ---- strategy ----

    pub fn strategy(&self) -> i16 {
        self.strategy.load(Ordering::Acquire)
    }

    /// Whether values should be pushed into this port, forwards or backwards.
    pub fn wants_push(&self, reverse: bool) -> bool {
        if reverse {
            self.flags().contains(PortFlags::PUSH_STRATEGY_REVERSE)
        } else {
            self.strategy() > 0
        }
    }

    fn own_strategy(&self) -> i16 {
        let flags = self.flags();
        if !flags.is_input() {
            return -1;
        }
        if !flags.contains(PortFlags::PUSH_STRATEGY) {
            return 0;
        }
        match &self.queue {
            Some(queue) => queue.capacity().clamp(1, i16::MAX as usize) as i16,
            None => 1,
        }
    }

    /// Recompute the strategy from the own flags and all destinations, and
    /// carry a change on towards the sources.
    pub(crate) fn update_strategy(&self) {
        let mut strategy = self.own_strategy();
        for destination in self.outgoing.load().iter() {
            strategy = strategy.max(destination.strategy());
        }
        let previous = self.strategy.swap(strategy, Ordering::AcqRel);
        if previous != strategy {
            tracing::trace!(
                "[{}] Strategy {} -> {}",
                self.name,
                previous,
                strategy
            );
            for source in self.incoming_ports() {
                source.update_strategy();
            }
        }
    }

    /// Switch an input between push and pull.
    pub fn set_push_strategy(&self, push: bool) {
        self.set_flag(PortFlags::PUSH_STRATEGY, push);
        self.update_strategy();
    }

    pub fn set_reverse_push_strategy(&self, reverse: bool) {
        self.set_flag(PortFlags::PUSH_STRATEGY_REVERSE, reverse);
    }

    // ---- edges ----

    /// Snapshot of the destinations, in connection order.
    pub fn outgoing_ports(&self) -> Vec<Arc<Port>> {
        self.outgoing.load().iter().cloned().collect()
    }

    /// Snapshot of the live sources, in connection order.
    pub fn incoming_ports(&self) -> Vec<Arc<Port>> {
        self.incoming.load().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn has_incoming(&self) -> bool {
        self.incoming.load().iter().any(|source| source.strong_count() > 0)
    }

    pub fn is_connected_to(&self, destination: &Port) -> bool {
        self.outgoing
            .load()
            .iter()
            .any(|port| port.id == destination.id)
    }

    pub(crate) fn add_destination(&self, destination: &Arc<Port>) {
        self.outgoing.rcu(|list| {
            let mut next = Vec::clone(list);
            next.push(Arc::clone(destination));
            next
        });
    }

    pub(crate) fn remove_destination(&self, destination: ElementId) {
        self.outgoing.rcu(|list| {
            list.iter()
                .filter(|port| port.id != destination)
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    pub(crate) fn add_source(&self, source: &Arc<Port>) {
        self.incoming.rcu(|list| {
            let mut next = Vec::clone(list);
            next.push(Arc::downgrade(source));
            next
        });
    }

    pub(crate) fn remove_source(&self, source: ElementId) {
        self.incoming.rcu(|list| {
            list.iter()
                .filter(|port| port.upgrade().is_some_and(|port| port.id != source))
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    // ---- listeners and pull handler ----

    pub fn add_listener(&self, listener: Arc<dyn PortListener>) {
        self.listeners.rcu(|list| {
            let mut next = Vec::clone(list);
            next.push(Arc::clone(&listener));
            next
        });
    }

    /// Remove a listener previously added; false if it was not registered.
    pub fn remove_listener(&self, listener: &Arc<dyn PortListener>) -> bool {
        let target = Arc::as_ptr(listener) as *const ();
        let previous = self.listeners.rcu(|list| {
            list.iter()
                .filter(|l| Arc::as_ptr(l) as *const () != target)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous
            .iter()
            .any(|l| Arc::as_ptr(l) as *const () == target)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load().len()
    }

    fn notify_listeners(&self, value: &LockedBuffer) {
        let listeners = self.listeners.load();
        for listener in listeners.iter() {
            listener.on_port_change(self, value);
        }
    }

    pub fn set_pull_handler(&self, handler: Arc<dyn PullRequestHandler>) {
        *self.pull_handler.write() = Some(handler);
    }

    pub fn clear_pull_handler(&self) {
        *self.pull_handler.write() = None;
    }

    fn pull_handler(&self) -> Option<Arc<dyn PullRequestHandler>> {
        self.pull_handler.read().clone()
    }

    // ---- reading ----

    /// Lock the current value.
    ///
    /// Retries when the buffer was replaced, recycled or reused between
    /// loading the reference and locking it.
    pub fn get_locked(&self) -> LockedBuffer {
        loop {
            let candidate = self.current.load_full();
            let generation = candidate.generation();
            if candidate.try_lock(generation) {
                if Arc::ptr_eq(&candidate, &self.current.load()) {
                    return LockedBuffer::adopt(candidate);
                }
                candidate.release_lock(1);
            }
            std::hint::spin_loop();
        }
    }

    /// Copy of the current value; `None` if `T` is not the payload type.
    pub fn get_value<T: Clone + 'static>(&self) -> Option<T> {
        match self.kind {
            PortKind::CheapCopy => loop {
                let candidate = self.current.load();
                let generation = candidate.generation();
                let value = candidate.read().as_any().downcast_ref::<T>().cloned();
                let unchanged = Arc::ptr_eq(&candidate, &self.current.load())
                    && candidate.generation() == generation
                    && candidate.lock_count() > 0;
                if unchanged {
                    return value;
                }
                std::hint::spin_loop();
            },
            PortKind::Standard => self.get_locked().value::<T>(),
        }
    }

    /// Current value, pulled from the sources when this port does not
    /// receive pushes.
    pub fn read(&self, ctx: &mut ThreadContext) -> LockedBuffer {
        if !self.wants_push(false) && self.has_incoming() {
            self.pull(ctx, false, false)
        } else {
            self.get_locked()
        }
    }

    /// Locks held on the current value's buffer.
    pub fn current_lock_count(&self) -> u32 {
        self.current.load().lock_count()
    }

    /// The port's default value.
    pub fn default_value(&self) -> LockedBuffer {
        self.default_value.clone()
    }

    // ---- queue ----

    pub fn has_queue(&self) -> bool {
        self.queue.is_some()
    }

    pub fn queue(&self) -> Option<&PortQueue> {
        self.queue.as_ref()
    }

    pub fn dequeue_one(&self) -> Option<LockedBuffer> {
        self.queue.as_ref().and_then(PortQueue::dequeue_one)
    }

    pub fn dequeue_all(&self, fragment: &mut QueueFragment) -> usize {
        self.queue
            .as_ref()
            .map_or(0, |queue| queue.dequeue_all(fragment))
    }

    /// Only valid while no value is being published to this port.
    pub fn set_queue_capacity(&self, capacity: usize) -> Result<()> {
        let queue = self.queue.as_ref().ok_or_else(|| {
            FlowError::Configuration(format!("port '{}' has no queue", self.name))
        })?;
        queue.set_capacity(capacity);
        self.update_strategy();
        Ok(())
    }

    /// Publish a copy of `value`.
    pub fn publish_value<T: PortValue>(&self, ctx: &mut ThreadContext, value: &T) -> Result<()> {
        let mut buffer = ctx.get_unused_buffer(&self.data_type);
        if !buffer.copy_from(value) {
            return Err(FlowError::TypeMismatch(format!(
                "cannot publish {} on port '{}' of {}",
                std::any::type_name::<T>(),
                self.name,
                self.data_type
            )));
        }
        self.publish(ctx, buffer)
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        self.current.load().release_lock(1);
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("data_type", &self.data_type.name())
            .field("flags", &self.flags())
            .field("strategy", &self.strategy())
            .finish()
    }
}
