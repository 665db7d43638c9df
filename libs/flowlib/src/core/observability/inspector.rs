// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Graph inspection for runtime observation.

use std::sync::Arc;

use crate::core::graph::{outgoing_edges, Edge, ElementId, ElementTree};
use crate::core::ports::{Port, PortKind};
use crate::core::runtime::FlowRuntime;
use crate::core::scheduling::ThreadContainer;
use crate::core::{FlowError, Result};

use super::snapshots::{ContainerSnapshot, GraphSnapshot, PortSnapshot};

/// Inspector for observing a runtime without mutating it.
///
/// Every method takes the structural lock for its duration; none of them
/// touches port values beyond reading lock counts.
pub struct GraphInspector {
    runtime: FlowRuntime,
}

impl GraphInspector {
    pub fn new(runtime: &FlowRuntime) -> Self {
        Self {
            runtime: runtime.clone(),
        }
    }

    /// Get a snapshot of a specific port.
    pub fn port(&self, id: ElementId) -> Option<PortSnapshot> {
        let tree = self.runtime.tree();
        let port = tree.port(id).ok()?;
        Some(port_snapshot(&tree, port))
    }

    pub fn ports(&self) -> Vec<PortSnapshot> {
        let tree = self.runtime.tree();
        tree.ports().map(|port| port_snapshot(&tree, port)).collect()
    }

    /// Get a snapshot of a specific thread container.
    pub fn thread_container(&self, id: ElementId) -> Option<ContainerSnapshot> {
        let tree = self.runtime.tree();
        let container = tree.get(id)?.as_thread_container()?;
        Some(container_snapshot(&tree, container))
    }

    pub fn thread_containers(&self) -> Vec<ContainerSnapshot> {
        let tree = self.runtime.tree();
        tree.iter()
            .filter_map(|element| element.as_thread_container())
            .map(|container| container_snapshot(&tree, container))
            .collect()
    }

    /// All edges, grouped by source port in creation order.
    pub fn edges(&self) -> Vec<Edge> {
        let tree = self.runtime.tree();
        tree.ports().flat_map(|port| outgoing_edges(port)).collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges().len()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let tree = self.runtime.tree();
        GraphSnapshot {
            element_count: tree.len(),
            ports: tree.ports().map(|port| port_snapshot(&tree, port)).collect(),
            edges: tree.ports().flat_map(|port| outgoing_edges(port)).collect(),
            thread_containers: tree
                .iter()
                .filter_map(|element| element.as_thread_container())
                .map(|container| container_snapshot(&tree, container))
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self.snapshot())
            .map_err(|e| FlowError::Serialization(format!("Failed to serialize graph: {}", e)))
    }
}

fn port_snapshot(tree: &ElementTree, port: &Arc<Port>) -> PortSnapshot {
    let paths = |ports: Vec<Arc<Port>>| -> Vec<String> {
        ports.iter().map(|p| tree.path(p.id())).collect()
    };
    PortSnapshot {
        id: port.id(),
        path: tree.path(port.id()),
        data_type: port.data_type().name().to_string(),
        kind: match port.kind() {
            PortKind::CheapCopy => "cheap_copy".to_string(),
            PortKind::Standard => "standard".to_string(),
        },
        ready: port.is_ready(),
        strategy: port.strategy(),
        lock_count: port.current_lock_count(),
        destinations: paths(port.outgoing_ports()),
        sources: paths(port.incoming_ports()),
        listeners: port.listener_count(),
        queue_len: port.queue().map(|queue| queue.len()),
        queue_dropped: port.queue().map(|queue| queue.dropped()),
    }
}

fn container_snapshot(tree: &ElementTree, container: &Arc<ThreadContainer>) -> ContainerSnapshot {
    ContainerSnapshot {
        id: container.id(),
        path: tree.path(container.id()),
        cycle_time: container.cycle_time(),
        running: container.is_running(),
        stats: container.stats(),
        schedule: container.schedule_report(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::ElementFlags;
    use crate::core::ports::PortCreationInfo;

    #[test]
    fn test_inspector_empty_runtime() {
        let runtime = FlowRuntime::new();
        let inspector = GraphInspector::new(&runtime);

        let snapshot = inspector.snapshot();
        assert_eq!(snapshot.element_count, 1);
        assert!(snapshot.ports.is_empty());
        assert!(snapshot.thread_containers.is_empty());
        assert_eq!(inspector.edge_count(), 0);
    }

    #[test]
    fn test_inspector_ports_and_edges() {
        let runtime = FlowRuntime::new();
        let mut ctx = runtime.thread_context("test");
        let f64_type = runtime.type_registry().get::<f64>().unwrap();
        let group = runtime
            .create_group(ElementId::ROOT, "arm", ElementFlags::empty())
            .unwrap();
        let out = runtime
            .create_port(&mut ctx, group, PortCreationInfo::output("out", f64_type.clone()))
            .unwrap();
        let input = runtime
            .create_port(&mut ctx, group, PortCreationInfo::input("in", f64_type))
            .unwrap();
        runtime.connect(out.id(), input.id()).unwrap();

        let inspector = GraphInspector::new(&runtime);
        let snapshot = inspector.port(out.id()).unwrap();
        assert_eq!(snapshot.path, "/arm/out");
        assert_eq!(snapshot.data_type, "f64");
        assert_eq!(snapshot.kind, "cheap_copy");
        assert_eq!(snapshot.destinations, vec!["/arm/in".to_string()]);
        assert_eq!(snapshot.lock_count, 1);
        assert!(!snapshot.ready);
        assert_eq!(inspector.edges().len(), 1);

        let json = inspector.to_json().unwrap();
        assert_eq!(json["ports"][1]["sources"][0], "/arm/out");
        assert_eq!(json["edges"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_inspector_thread_container() {
        let runtime = FlowRuntime::new();
        let container = runtime
            .create_thread_container(ElementId::ROOT, "control")
            .unwrap();

        let inspector = GraphInspector::new(&runtime);
        let snapshot = inspector.thread_container(container.id()).unwrap();
        assert_eq!(snapshot.path, "/control");
        assert!(!snapshot.running);
        assert_eq!(snapshot.stats.cycles, 0);
        assert!(inspector.port(container.id()).is_none());
    }
}
