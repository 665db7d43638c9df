// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::buffers::ThreadContext;
use crate::core::graph::ElementId;

/// Work executed once per thread container cycle.
///
/// Failures are the task's own business: the container neither catches nor
/// retries anything.
pub trait Task: Send + Sync {
    fn execute(&self, ctx: &mut ThreadContext);
}

impl<F> Task for F
where
    F: Fn(&mut ThreadContext) + Send + Sync,
{
    fn execute(&self, ctx: &mut ThreadContext) {
        self(ctx)
    }
}

/// Where a periodic task sits in the data flow.
#[derive(Debug, Clone, Default)]
pub struct PeriodicTaskInfo {
    pub name: String,
    /// Interface groups the task reads from.
    pub incoming: Vec<ElementId>,
    /// Interface groups the task writes to.
    pub outgoing: Vec<ElementId>,
    /// Pure producer; scheduled before regular tasks.
    pub sensor: bool,
}

impl PeriodicTaskInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn incoming(mut self, interface: ElementId) -> Self {
        self.incoming.push(interface);
        self
    }

    pub fn outgoing(mut self, interface: ElementId) -> Self {
        self.outgoing.push(interface);
        self
    }

    pub fn sensor(mut self) -> Self {
        self.sensor = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
struct TaskLinks {
    previous: Vec<ElementId>,
    next: Vec<ElementId>,
}

/// A [`Task`] bound to its data boundary in the element tree.
pub struct PeriodicTask {
    id: ElementId,
    name: String,
    incoming: Vec<ElementId>,
    outgoing: Vec<ElementId>,
    sensor: bool,
    task: Arc<dyn Task>,
    links: Mutex<TaskLinks>,
}

impl PeriodicTask {
    pub(crate) fn new(id: ElementId, info: PeriodicTaskInfo, task: Arc<dyn Task>) -> Self {
        Self {
            id,
            name: info.name,
            incoming: info.incoming,
            outgoing: info.outgoing,
            sensor: info.sensor,
            task,
            links: Mutex::new(TaskLinks::default()),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn incoming(&self) -> &[ElementId] {
        &self.incoming
    }

    pub fn outgoing(&self) -> &[ElementId] {
        &self.outgoing
    }

    /// Explicitly declared as sensor task.
    pub fn is_sensor(&self) -> bool {
        self.sensor
    }

    pub fn execute(&self, ctx: &mut ThreadContext) {
        self.task.execute(ctx);
    }

    /// Tasks that must run before this one, as of the last reschedule.
    pub fn previous_tasks(&self) -> Vec<ElementId> {
        self.links.lock().previous.clone()
    }

    /// Tasks that must run after this one, as of the last reschedule.
    pub fn next_tasks(&self) -> Vec<ElementId> {
        self.links.lock().next.clone()
    }

    pub(crate) fn set_links(&self, previous: Vec<ElementId>, next: Vec<ElementId>) {
        *self.links.lock() = TaskLinks { previous, next };
    }
}

impl std::fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("incoming", &self.incoming)
            .field("outgoing", &self.outgoing)
            .field("sensor", &self.sensor)
            .finish()
    }
}
