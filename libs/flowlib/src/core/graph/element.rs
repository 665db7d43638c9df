// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::core::ports::Port;
use crate::core::scheduling::{PeriodicTask, ThreadContainer};

/// Stable handle of an element in the tree. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(u32);

impl ElementId {
    pub const ROOT: ElementId = ElementId(0);

    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ElementFlags: u32 {
        /// Edges of ports below this group are aggregated at the group.
        const EDGE_AGGREGATOR = 1 << 0;
        /// Port interface of a component; traced through by the scheduler.
        const INTERFACE = 1 << 1;
        /// Interface carrying sensor data.
        const SENSOR_INTERFACE = 1 << 2;
        /// Executes the periodic tasks below it.
        const THREAD_CONTAINER = 1 << 3;
        /// Initialised.
        const READY = 1 << 4;

        const PORT_INTERFACE = Self::EDGE_AGGREGATOR.bits() | Self::INTERFACE.bits();
    }
}

/// What an element is.
#[derive(Clone)]
pub enum ElementKind {
    Group,
    Port(Arc<Port>),
    Task(Arc<PeriodicTask>),
    ThreadContainer(Arc<ThreadContainer>),
}

impl ElementKind {
    pub fn label(&self) -> &'static str {
        match self {
            ElementKind::Group => "group",
            ElementKind::Port(_) => "port",
            ElementKind::Task(_) => "task",
            ElementKind::ThreadContainer(_) => "thread_container",
        }
    }
}

impl fmt::Debug for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Node of the element tree.
#[derive(Debug, Clone)]
pub struct Element {
    pub(crate) id: ElementId,
    pub(crate) name: String,
    pub(crate) parent: Option<ElementId>,
    pub(crate) children: Vec<ElementId>,
    pub(crate) flags: ElementFlags,
    pub(crate) kind: ElementKind,
}

impl Element {
    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    /// Children in creation order.
    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    pub fn flags(&self) -> ElementFlags {
        self.flags
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn is_ready(&self) -> bool {
        self.flags.contains(ElementFlags::READY)
    }

    pub fn as_port(&self) -> Option<&Arc<Port>> {
        match &self.kind {
            ElementKind::Port(port) => Some(port),
            _ => None,
        }
    }

    pub fn as_task(&self) -> Option<&Arc<PeriodicTask>> {
        match &self.kind {
            ElementKind::Task(task) => Some(task),
            _ => None,
        }
    }

    pub fn as_thread_container(&self) -> Option<&Arc<ThreadContainer>> {
        match &self.kind {
            ElementKind::ThreadContainer(container) => Some(container),
            _ => None,
        }
    }
}
