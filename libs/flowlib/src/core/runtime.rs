// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::core::buffers::ThreadContext;
use crate::core::config::RuntimeConfig;
use crate::core::graph::{
    connect_ports, disconnect_all, disconnect_ports, Edge, ElementFlags, ElementId, ElementKind,
    ElementTree,
};
use crate::core::ports::{Port, PortCreationInfo, PortFlags};
use crate::core::pubsub::{topics, Event, EventBus, StructureEvent};
use crate::core::scheduling::{PeriodicTask, PeriodicTaskInfo, Task, ThreadContainer};
use crate::core::types::TypeRegistry;
use crate::core::{FlowError, Result};

/// State shared between a [`FlowRuntime`] and its thread containers.
pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) registry: TypeRegistry,
    /// Structural lock. Held for every tree mutation, connect, disconnect
    /// and schedule rebuild.
    pub(crate) tree: Mutex<ElementTree>,
    pub(crate) bus: EventBus,
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        let tree = self.tree.get_mut();
        let containers: Vec<Arc<ThreadContainer>> = tree
            .iter()
            .filter_map(|element| element.as_thread_container().cloned())
            .collect();
        for container in containers {
            container.shutdown();
        }

        // Destinations are held strongly; a connection cycle would outlive us
        let ports: Vec<Arc<Port>> = tree
            .iter()
            .filter_map(|element| element.as_port().cloned())
            .collect();
        for port in &ports {
            disconnect_all(port);
        }
    }
}

/// The data-flow runtime: element tree, type registry and event bus.
///
/// # Thread Safety
///
/// All methods take `&self`. Cloning is cheap and yields a handle to the
/// same runtime. Structural operations serialize on one lock; publishing
/// and pulling never take it.
#[derive(Clone)]
pub struct FlowRuntime {
    inner: Arc<RuntimeInner>,
}

impl FlowRuntime {
    pub fn new() -> Self {
        Self::build(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RuntimeConfig) -> Self {
        let registry = TypeRegistry::new();
        tracing::debug!("Runtime created with {} payload types", registry.len());
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                registry,
                tree: Mutex::new(ElementTree::new()),
                bus: EventBus::new(),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn type_registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Scratch state for a thread that publishes into this runtime's ports.
    pub fn thread_context(&self, name: impl Into<String>) -> ThreadContext {
        ThreadContext::new(name)
    }

    /// Lock the element tree. Do not publish while holding the guard.
    pub fn tree(&self) -> MutexGuard<'_, ElementTree> {
        self.inner.tree.lock()
    }

    // =========================================================================
    // Element Creation
    // =========================================================================

    pub fn create_group(
        &self,
        parent: ElementId,
        name: &str,
        flags: ElementFlags,
    ) -> Result<ElementId> {
        let flags = flags - ElementFlags::THREAD_CONTAINER;
        let (id, event) = {
            let mut tree = self.tree();
            let id = tree.insert(parent, name, flags, ElementKind::Group)?;
            (id, added_event(&tree, id))
        };
        tracing::debug!("Created group {}", path_of(&event));
        self.announce(event);
        Ok(id)
    }

    /// Group whose port edges are aggregated and traced through by the
    /// scheduler.
    pub fn create_interface(&self, parent: ElementId, name: &str, sensor: bool) -> Result<ElementId> {
        let mut flags = ElementFlags::PORT_INTERFACE;
        if sensor {
            flags |= ElementFlags::SENSOR_INTERFACE;
        }
        self.create_group(parent, name, flags)
    }

    /// Create a port below `parent`. Its buffers come from `ctx`'s pools.
    pub fn create_port(
        &self,
        ctx: &mut ThreadContext,
        parent: ElementId,
        mut info: PortCreationInfo,
    ) -> Result<Arc<Port>> {
        if info.effective_flags().contains(PortFlags::HAS_QUEUE)
            && info.options.queue_capacity.is_none()
        {
            info.options.queue_capacity = Some(self.inner.config.default_queue_capacity);
        }

        let (port, event) = {
            let mut tree = self.tree();
            tree.check_new_child(parent, &info.name)?;
            let name = info.name.clone();
            let port = Arc::new(Port::new(ctx, tree.next_id(), info)?);
            let id = tree.insert(
                parent,
                &name,
                ElementFlags::empty(),
                ElementKind::Port(Arc::clone(&port)),
            )?;
            debug_assert_eq!(id, port.id());
            (port, added_event(&tree, id))
        };
        tracing::debug!("Created port {}", path_of(&event));
        self.announce(event);
        Ok(port)
    }

    /// Create a thread container. Its cycle time comes from the runtime
    /// configuration.
    pub fn create_thread_container(
        &self,
        parent: ElementId,
        name: &str,
    ) -> Result<Arc<ThreadContainer>> {
        let config = &self.inner.config;
        let (container, event) = {
            let mut tree = self.tree();
            tree.check_new_child(parent, name)?;
            let container = Arc::new(ThreadContainer::new(
                tree.next_id(),
                name,
                config.cycle_time_for(name),
                config.warn_on_overrun_for(name),
                Arc::downgrade(&self.inner),
                &self.inner.bus,
            ));
            let id = tree.insert(
                parent,
                name,
                ElementFlags::THREAD_CONTAINER,
                ElementKind::ThreadContainer(Arc::clone(&container)),
            )?;
            (container, added_event(&tree, id))
        };
        tracing::debug!(
            "Created thread container {} with cycle time {:?}",
            path_of(&event),
            container.cycle_time()
        );
        self.announce(event);
        Ok(container)
    }

    /// Add a periodic task. Its boundaries must already exist.
    pub fn add_periodic_task(
        &self,
        parent: ElementId,
        info: PeriodicTaskInfo,
        task: Arc<dyn Task>,
    ) -> Result<Arc<PeriodicTask>> {
        let (periodic, event) = {
            let mut tree = self.tree();
            tree.check_new_child(parent, &info.name)?;
            for boundary in info.incoming.iter().chain(&info.outgoing) {
                tree.element(*boundary)?;
            }
            let name = info.name.clone();
            let periodic = Arc::new(PeriodicTask::new(tree.next_id(), info, task));
            let id = tree.insert(
                parent,
                &name,
                ElementFlags::empty(),
                ElementKind::Task(Arc::clone(&periodic)),
            )?;
            (periodic, added_event(&tree, id))
        };
        tracing::debug!("Added periodic task {}", path_of(&event));
        self.announce(event);
        Ok(periodic)
    }

    /// Mark `id` and everything below it ready. Ports accept values from
    /// here on and tasks join their container's schedule.
    pub fn init_element(&self, id: ElementId) -> Result<()> {
        let event = {
            let mut tree = self.tree();
            let initialised = tree.set_ready(id)?;
            if initialised.is_empty() {
                return Ok(());
            }
            StructureEvent::ElementInitialized {
                id,
                path: tree.path(id),
                scope: scope_of(&tree, &initialised),
            }
        };
        tracing::debug!("Initialised {}", path_of(&event));
        self.announce(event);
        Ok(())
    }

    /// Remove `id` and its subtree. Ports are disconnected and thread
    /// containers below it are stopped.
    pub fn remove_element(&self, id: ElementId) -> Result<()> {
        let mut containers = Vec::new();
        let mut edges = Vec::new();
        let (path, scope, edge_scope) = {
            let mut tree = self.tree();
            let path = tree.path(id);
            let scope = scope_of(&tree, &tree.subtree(id));
            let removed = tree.remove(id)?;
            for element in &removed {
                match &element.kind {
                    ElementKind::Port(port) => {
                        port.mark_deleted();
                        edges.extend(disconnect_all(port));
                    }
                    ElementKind::ThreadContainer(container) => {
                        containers.push(Arc::clone(container));
                    }
                    ElementKind::Group | ElementKind::Task(_) => {}
                }
            }
            let endpoints: Vec<ElementId> = edges
                .iter()
                .flat_map(|edge| [edge.source, edge.destination])
                .filter(|endpoint| tree.contains(*endpoint))
                .collect();
            (path, scope, scope_of(&tree, &endpoints))
        };

        for container in containers {
            if let Err(e) = container.pause_execution() {
                tracing::warn!("[{}] {}, stopping without join", container.name(), e);
                container.shutdown();
            }
        }

        tracing::debug!("Removed {} ({} edges)", path, edges.len());
        if !edges.is_empty() {
            let mut edge_scope = edge_scope;
            merge_scope(&mut edge_scope, &scope);
            self.announce(StructureEvent::EdgeRemoved {
                edges,
                scope: edge_scope,
            });
        }
        self.announce(StructureEvent::ElementRemoved { id, path, scope });
        Ok(())
    }

    // =========================================================================
    // Edges
    // =========================================================================

    pub fn connect(&self, source: ElementId, destination: ElementId) -> Result<Edge> {
        let (edge, scope) = {
            let tree = self.tree();
            let edge = connect_ports(tree.port(source)?, tree.port(destination)?)?;
            (edge, scope_of(&tree, &[source, destination]))
        };
        self.announce(StructureEvent::EdgeAdded { edge, scope });
        Ok(edge)
    }

    /// Connect two ports by qualified path.
    pub fn connect_paths(&self, source: &str, destination: &str) -> Result<Edge> {
        let source = self.require(source)?;
        let destination = self.require(destination)?;
        self.connect(source, destination)
    }

    pub fn disconnect(&self, source: ElementId, destination: ElementId) -> Result<Edge> {
        let (edge, scope) = {
            let tree = self.tree();
            let edge = disconnect_ports(tree.port(source)?, tree.port(destination)?)?;
            (edge, scope_of(&tree, &[source, destination]))
        };
        self.announce(StructureEvent::EdgeRemoved {
            edges: vec![edge],
            scope,
        });
        Ok(edge)
    }

    /// Remove every edge of a port.
    pub fn disconnect_all(&self, port: ElementId) -> Result<Vec<Edge>> {
        let (edges, scope) = {
            let tree = self.tree();
            let edges = disconnect_all(tree.port(port)?);
            let endpoints: Vec<ElementId> = edges
                .iter()
                .flat_map(|edge| [edge.source, edge.destination])
                .collect();
            (edges, scope_of(&tree, &endpoints))
        };
        if !edges.is_empty() {
            self.announce(StructureEvent::EdgeRemoved {
                edges: edges.clone(),
                scope,
            });
        }
        Ok(edges)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn lookup(&self, path: &str) -> Option<ElementId> {
        self.tree().lookup(path)
    }

    pub fn path(&self, id: ElementId) -> String {
        self.tree().path(id)
    }

    pub fn port(&self, id: ElementId) -> Result<Arc<Port>> {
        self.tree().port(id).cloned()
    }

    pub fn port_by_path(&self, path: &str) -> Result<Arc<Port>> {
        let id = self.require(path)?;
        self.port(id)
    }

    pub fn thread_container(&self, id: ElementId) -> Result<Arc<ThreadContainer>> {
        let tree = self.tree();
        tree.element(id)?
            .as_thread_container()
            .cloned()
            .ok_or_else(|| {
                FlowError::InvalidElement(format!("'{}' is not a thread container", tree.path(id)))
            })
    }

    /// Thread containers in creation order.
    pub fn thread_containers(&self) -> Vec<Arc<ThreadContainer>> {
        self.tree()
            .iter()
            .filter_map(|element| element.as_thread_container().cloned())
            .collect()
    }

    /// Every port in creation order.
    pub fn ports(&self) -> Vec<Arc<Port>> {
        self.tree().ports().cloned().collect()
    }

    fn require(&self, path: &str) -> Result<ElementId> {
        self.lookup(path)
            .ok_or_else(|| FlowError::ElementNotFound(path.to_string()))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start every thread container.
    pub fn start_execution(&self) -> Result<()> {
        let containers = self.thread_containers();
        tracing::info!("[start] Starting {} thread containers", containers.len());
        for container in containers {
            container.start_execution()?;
        }
        Ok(())
    }

    /// Stop every thread container and wait for their threads.
    pub fn pause_execution(&self) -> Result<()> {
        let containers = self.thread_containers();
        tracing::info!("[pause] Stopping {} thread containers", containers.len());
        for container in containers {
            container.pause_execution()?;
        }
        Ok(())
    }

    /// Serialize the graph and its schedules to JSON.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        crate::core::observability::GraphInspector::new(self).to_json()
    }

    fn announce(&self, event: StructureEvent) {
        self.inner
            .bus
            .publish(topics::STRUCTURE, &Event::Structure(event));
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn added_event(tree: &ElementTree, id: ElementId) -> StructureEvent {
    StructureEvent::ElementAdded {
        id,
        path: tree.path(id),
        scope: scope_of(tree, &[id]),
    }
}

fn path_of(event: &StructureEvent) -> &str {
    match event {
        StructureEvent::ElementAdded { path, .. }
        | StructureEvent::ElementInitialized { path, .. }
        | StructureEvent::ElementRemoved { path, .. } => path,
        StructureEvent::EdgeAdded { .. } | StructureEvent::EdgeRemoved { .. } => "",
    }
}

/// `ids` plus all their ancestors, without duplicates.
fn scope_of(tree: &ElementTree, ids: &[ElementId]) -> Vec<ElementId> {
    let mut scope = Vec::new();
    for id in ids {
        merge_scope(&mut scope, &[*id]);
        merge_scope(&mut scope, &tree.ancestors(*id));
    }
    scope
}

fn merge_scope(scope: &mut Vec<ElementId>, ids: &[ElementId]) {
    for id in ids {
        if !scope.contains(id) {
            scope.push(*id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pubsub::EventListener;

    struct Recorder(Vec<StructureEvent>);

    impl EventListener for Recorder {
        fn on_event(&mut self, event: &Event) -> Result<()> {
            if let Event::Structure(change) = event {
                self.0.push(change.clone());
            }
            Ok(())
        }
    }

    #[test]
    fn test_lookup_by_path() {
        let runtime = FlowRuntime::new();
        let arm = runtime
            .create_group(ElementId::ROOT, "arm", ElementFlags::empty())
            .unwrap();
        let joints = runtime.create_interface(arm, "joints", false).unwrap();

        assert_eq!(runtime.lookup("/arm/joints"), Some(joints));
        assert_eq!(runtime.path(joints), "/arm/joints");
        assert!(runtime.lookup("/arm/legs").is_none());
        assert!(matches!(
            runtime.port_by_path("/arm/legs"),
            Err(FlowError::ElementNotFound(_))
        ));
        assert!(matches!(
            runtime.port(joints),
            Err(FlowError::InvalidElement(_))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let runtime = FlowRuntime::new();
        runtime
            .create_group(ElementId::ROOT, "arm", ElementFlags::empty())
            .unwrap();
        assert!(runtime
            .create_group(ElementId::ROOT, "arm", ElementFlags::empty())
            .is_err());
        assert!(runtime.create_thread_container(ElementId::ROOT, "arm").is_err());
    }

    #[test]
    fn test_root_cannot_be_removed() {
        let runtime = FlowRuntime::new();
        assert!(runtime.remove_element(ElementId::ROOT).is_err());
    }

    #[test]
    fn test_task_boundaries_must_exist() {
        let runtime = FlowRuntime::new();
        let info = PeriodicTaskInfo::new("t").incoming(ElementId::new(42));
        let task: Arc<dyn Task> = Arc::new(|_ctx: &mut ThreadContext| {});
        assert!(matches!(
            runtime.add_periodic_task(ElementId::ROOT, info, task),
            Err(FlowError::ElementNotFound(_))
        ));
    }

    #[test]
    fn test_structure_events_carry_ancestors() {
        let runtime = FlowRuntime::new();
        let recorder = Arc::new(Mutex::new(Recorder(Vec::new())));
        runtime
            .event_bus()
            .subscribe(topics::STRUCTURE, recorder.clone());

        let arm = runtime
            .create_group(ElementId::ROOT, "arm", ElementFlags::empty())
            .unwrap();
        let wrist = runtime
            .create_group(arm, "wrist", ElementFlags::empty())
            .unwrap();
        runtime.init_element(arm).unwrap();
        runtime.remove_element(wrist).unwrap();

        let events = &recorder.lock().0;
        assert_eq!(events.len(), 4);
        assert_eq!(events[1].scope(), &[wrist, arm, ElementId::ROOT]);
        assert!(matches!(
            &events[2],
            StructureEvent::ElementInitialized { id, .. } if *id == arm
        ));
        assert!(events[2].affects(wrist));
        assert!(matches!(
            &events[3],
            StructureEvent::ElementRemoved { path, .. } if path == "/arm/wrist"
        ));
    }

    #[test]
    fn test_dropping_runtime_frees_connected_ports() {
        let runtime = FlowRuntime::new();
        let mut ctx = runtime.thread_context("test");
        let f64_type = runtime.type_registry().get::<f64>().unwrap();
        let a = runtime
            .create_port(&mut ctx, ElementId::ROOT, PortCreationInfo::proxy("a", f64_type.clone()))
            .unwrap();
        let b = runtime
            .create_port(&mut ctx, ElementId::ROOT, PortCreationInfo::proxy("b", f64_type))
            .unwrap();
        runtime.connect(a.id(), b.id()).unwrap();
        runtime.connect(b.id(), a.id()).unwrap();

        let (weak_a, weak_b) = (Arc::downgrade(&a), Arc::downgrade(&b));
        drop((a, b));
        assert!(weak_a.upgrade().is_some());

        drop(runtime);
        assert!(weak_a.upgrade().is_none());
        assert!(weak_b.upgrade().is_none());
    }
}
