// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Publish, receive and pull.
//!
//! Everything here runs synchronously on the caller's thread. Only the
//! public entry points report errors; inside the receive/pull recursion
//! problems are logged and the value is dropped.

use std::sync::{Arc, Weak};

use super::Port;
use crate::core::buffers::{LockedBuffer, ThreadContext, UnusedBuffer};
use crate::core::graph::ElementId;
use crate::core::ports::bounds::{Assign, AssignOutcome};
use crate::core::ports::flags::PortFlags;
use crate::core::types::DataType;
use crate::core::{FlowError, Result};

impl Port {
    /// Publish a filled buffer: assign it locally, then push it to every
    /// destination that wants push.
    pub fn publish(&self, ctx: &mut ThreadContext, buffer: UnusedBuffer) -> Result<()> {
        self.check_publishable(buffer.data_type())?;
        self.propagate(ctx, buffer.into_locked(), false);
        Ok(())
    }

    /// Publish a value that is already published elsewhere.
    pub fn publish_locked(&self, ctx: &mut ThreadContext, buffer: LockedBuffer) -> Result<()> {
        self.check_publishable(buffer.data_type())?;
        self.propagate(ctx, buffer, false);
        Ok(())
    }

    /// Publish an externally edited value. Also pushes it backwards into
    /// every source, whether or not they accept reverse pushes.
    pub fn browser_publish(&self, ctx: &mut ThreadContext, buffer: UnusedBuffer) -> Result<()> {
        self.check_publishable(buffer.data_type())?;
        self.propagate(ctx, buffer.into_locked(), true);
        Ok(())
    }

    fn check_publishable(&self, data_type: &DataType) -> Result<()> {
        if !self.is_ready() {
            return Err(FlowError::PortNotReady(format!(
                "port '{}' is not initialised",
                self.name
            )));
        }
        if !self.accepts_type(data_type) {
            return Err(FlowError::TypeMismatch(format!(
                "port '{}' of {} cannot publish a {} buffer",
                self.name, self.data_type, data_type
            )));
        }
        Ok(())
    }

    fn propagate(&self, ctx: &mut ThreadContext, buffer: LockedBuffer, browser: bool) {
        ctx.cache_mut().publishes += 1;
        let Some(value) = self.assign_value(ctx, buffer) else {
            return;
        };
        self.notify_listeners(&value);
        self.push_forward(ctx, &value, None);

        if browser {
            let sources = self.incoming.load_full();
            for source in sources.iter().filter_map(Weak::upgrade) {
                let lock = value.clone();
                source.receive(ctx, &lock, self, true);
                drop(lock);
            }
        }
    }

    /// Assign a pushed value and continue the push.
    ///
    /// Forwards into destinations wanting push and, when this port accepts
    /// reverse pushes or the value travels backwards, into sources wanting
    /// reverse push. `origin` is never pushed back into.
    pub(crate) fn receive(
        &self,
        ctx: &mut ThreadContext,
        buffer: &LockedBuffer,
        origin: &Port,
        is_reverse: bool,
    ) {
        if !self.is_ready() {
            tracing::trace!("[{}] Not ready, dropping value from '{}'", self.name, origin.name);
            return;
        }
        if !self.accepts_type(buffer.data_type()) {
            tracing::warn!(
                "[{}] Dropping {} value from '{}', port carries {}",
                self.name,
                buffer.data_type(),
                origin.name,
                self.data_type
            );
            return;
        }

        ctx.cache_mut().receives += 1;
        ctx.cache_mut().enter();

        if let Some(value) = self.assign_value(ctx, buffer.clone()) {
            self.notify_listeners(&value);
            self.push_forward(ctx, &value, Some(origin.id));
            if is_reverse || self.flags().contains(PortFlags::PUSH_STRATEGY_REVERSE) {
                self.push_reverse(ctx, &value, origin.id);
            }
        }

        ctx.cache_mut().leave();
    }

    fn push_forward(&self, ctx: &mut ThreadContext, value: &LockedBuffer, except: Option<ElementId>) {
        let destinations = self.outgoing.load_full();
        for destination in destinations.iter() {
            if Some(destination.id) == except || !destination.wants_push(false) {
                continue;
            }
            let lock = value.clone();
            destination.receive(ctx, &lock, self, false);
            drop(lock);
        }
    }

    fn push_reverse(&self, ctx: &mut ThreadContext, value: &LockedBuffer, except: ElementId) {
        let sources = self.incoming.load_full();
        for source in sources.iter().filter_map(Weak::upgrade) {
            if source.id == except || !source.wants_push(true) {
                continue;
            }
            let lock = value.clone();
            source.receive(ctx, &lock, self, true);
            drop(lock);
        }
    }

    /// Store `buffer` as the current value, through the bounds check when
    /// the port has one. Returns the value actually assigned.
    fn assign_value(&self, ctx: &mut ThreadContext, buffer: LockedBuffer) -> Option<LockedBuffer> {
        let value = match &self.assign {
            Assign::Standard => buffer,
            Assign::Bounded(bounds) => match bounds.check(ctx, &buffer, &self.default_value) {
                AssignOutcome::Assigned => buffer,
                AssignOutcome::Substituted(substitute) => substitute,
                AssignOutcome::Discarded => {
                    ctx.cache_mut().discarded += 1;
                    return None;
                }
            },
        };

        value.manager().add_lock(1);
        let previous = self.current.swap(Arc::clone(value.manager()));
        previous.release_lock(1);

        if let Some(queue) = &self.queue {
            queue.enqueue(value.clone());
        }
        Some(value)
    }

    /// Obtain a value from the sources on demand.
    ///
    /// Walks the incoming edges towards the first connected source, giving
    /// each port's pull handler a chance to answer first. The pulled value is
    /// assigned to this port and, with `intermediate_assign`, to every port
    /// on the way. Without a source the current value is returned. The
    /// result carries one lock owned by the caller.
    pub fn pull(
        &self,
        ctx: &mut ThreadContext,
        intermediate_assign: bool,
        ignore_handler_on_first_hop: bool,
    ) -> LockedBuffer {
        ctx.cache_mut().pulls += 1;
        self.pull_recursive(ctx, intermediate_assign, ignore_handler_on_first_hop, true)
    }

    fn pull_recursive(
        &self,
        ctx: &mut ThreadContext,
        intermediate_assign: bool,
        ignore_handler_on_first_hop: bool,
        first_hop: bool,
    ) -> LockedBuffer {
        let assign_here = first_hop || intermediate_assign;

        if !(first_hop && ignore_handler_on_first_hop) {
            if let Some(handler) = self.pull_handler() {
                if let Some(result) = handler.try_pull(self, ctx, intermediate_assign) {
                    return if assign_here {
                        self.assign_pulled(ctx, result)
                    } else {
                        result
                    };
                }
            }
        }

        let source = self.incoming.load().iter().find_map(Weak::upgrade);
        let Some(source) = source else {
            return self.get_locked();
        };

        let result = source.pull_recursive(ctx, intermediate_assign, ignore_handler_on_first_hop, false);
        if !self.accepts_type(result.data_type()) {
            tracing::warn!(
                "[{}] Pulled {} value from '{}', port carries {}",
                self.name,
                result.data_type(),
                source.name,
                self.data_type
            );
            return self.get_locked();
        }
        if assign_here {
            self.assign_pulled(ctx, result)
        } else {
            result
        }
    }

    fn assign_pulled(&self, ctx: &mut ThreadContext, result: LockedBuffer) -> LockedBuffer {
        match self.assign_value(ctx, result) {
            Some(value) => value,
            None => self.get_locked(),
        }
    }
}
