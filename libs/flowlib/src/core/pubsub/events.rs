// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::graph::{Edge, ElementId};

/// Common topic constants for runtime events
pub mod topics {
    /// Structural changes of the element tree and edge graph
    pub const STRUCTURE: &str = "runtime:structure";

    /// Thread container lifecycle
    pub const EXECUTION: &str = "runtime:execution";
}

/// Trait for objects that can receive events
pub trait EventListener: Send {
    fn on_event(&mut self, event: &Event) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Structure(StructureEvent),
    Execution(ExecutionEvent),
    Custom {
        topic: String,
        data: serde_json::Value,
    },
}

impl Event {
    /// Topic this event is published on.
    pub fn topic(&self) -> String {
        match self {
            Event::Structure(_) => topics::STRUCTURE.to_string(),
            Event::Execution(_) => topics::EXECUTION.to_string(),
            Event::Custom { topic, .. } => topic.clone(),
        }
    }
}

/// Change of the element tree or the edge graph.
///
/// `scope` lists every element the change is visible from: the affected
/// elements and all their ancestors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StructureEvent {
    ElementAdded {
        id: ElementId,
        path: String,
        scope: Vec<ElementId>,
    },
    ElementInitialized {
        id: ElementId,
        path: String,
        scope: Vec<ElementId>,
    },
    ElementRemoved {
        id: ElementId,
        path: String,
        scope: Vec<ElementId>,
    },
    EdgeAdded {
        edge: Edge,
        scope: Vec<ElementId>,
    },
    EdgeRemoved {
        edges: Vec<Edge>,
        scope: Vec<ElementId>,
    },
}

impl StructureEvent {
    pub fn scope(&self) -> &[ElementId] {
        match self {
            StructureEvent::ElementAdded { scope, .. }
            | StructureEvent::ElementInitialized { scope, .. }
            | StructureEvent::ElementRemoved { scope, .. }
            | StructureEvent::EdgeAdded { scope, .. }
            | StructureEvent::EdgeRemoved { scope, .. } => scope,
        }
    }

    /// Whether the change happened at or below `element`.
    pub fn affects(&self, element: ElementId) -> bool {
        self.scope().contains(&element)
    }
}

/// Thread container lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionEvent {
    Started { container: ElementId, name: String },
    Paused { container: ElementId, name: String },
    CycleBroken { container: ElementId, task: String },
}
