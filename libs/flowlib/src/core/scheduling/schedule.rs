// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Execution order of the periodic tasks of a thread container.
//!
//! Dependencies are derived from the edge graph: starting at a task's
//! outgoing interfaces, aggregated edges are followed (through interface
//! groups that are nobody's input) until the incoming interface of another
//! task is reached. The tasks are then sorted topologically. Cycles are
//! broken at a point that only depends on the task order, so the same graph
//! always yields the same schedule.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::task::PeriodicTask;
use crate::core::graph::{ElementFlags, ElementId, ElementKind, ElementTree};
use crate::core::Result;

/// Ordered task list of one thread container. Rebuilt, never edited.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    container: Option<ElementId>,
    tasks: Vec<Arc<PeriodicTask>>,
    paths: HashMap<ElementId, String>,
    dependencies: Vec<(ElementId, ElementId)>,
    broken_cycles: Vec<ElementId>,
}

impl Schedule {
    pub fn container(&self) -> Option<ElementId> {
        self.container
    }

    /// Tasks in execution order.
    pub fn tasks(&self) -> &[Arc<PeriodicTask>] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task ids in execution order.
    pub fn task_ids(&self) -> Vec<ElementId> {
        self.tasks.iter().map(|task| task.id()).collect()
    }

    /// Task names in execution order.
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|task| task.name().to_string()).collect()
    }

    /// `(before, after)` pairs between tasks of this schedule.
    pub fn dependencies(&self) -> &[(ElementId, ElementId)] {
        &self.dependencies
    }

    /// Tasks scheduled ahead of unscheduled predecessors to break a cycle.
    pub fn broken_cycles(&self) -> &[ElementId] {
        &self.broken_cycles
    }

    fn path_of(&self, id: ElementId) -> String {
        self.paths
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub fn report(&self) -> ScheduleReport {
        ScheduleReport {
            tasks: self.tasks.iter().map(|task| self.path_of(task.id())).collect(),
            dependencies: self
                .dependencies
                .iter()
                .map(|(before, after)| (self.path_of(*before), self.path_of(*after)))
                .collect(),
            broken_cycles: self
                .broken_cycles
                .iter()
                .map(|id| self.path_of(*id))
                .collect(),
        }
    }
}

/// Serializable summary of a [`Schedule`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleReport {
    /// Task paths in execution order.
    pub tasks: Vec<String>,
    pub dependencies: Vec<(String, String)>,
    /// Tasks at which a dependency cycle was broken.
    pub broken_cycles: Vec<String>,
}

/// Builds a [`Schedule`] from the element tree. Caller holds the
/// structural lock.
pub struct ScheduleBuilder<'a> {
    tree: &'a ElementTree,
    container: ElementId,
}

impl<'a> ScheduleBuilder<'a> {
    pub fn new(tree: &'a ElementTree, container: ElementId) -> Self {
        Self { tree, container }
    }

    /// Convenience for `ScheduleBuilder::new(tree, container).build()`.
    pub fn build_for(tree: &ElementTree, container: ElementId) -> Result<Schedule> {
        ScheduleBuilder::new(tree, container).build()
    }

    pub fn build(&self) -> Result<Schedule> {
        self.tree.element(self.container)?;
        let container_path = self.tree.path(self.container);

        let tasks = self.collect_tasks();
        let index: HashMap<ElementId, usize> = tasks
            .iter()
            .enumerate()
            .map(|(i, task)| (task.id(), i))
            .collect();

        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
        let mut dependencies = Vec::new();

        let inputs = self.incoming_index(&tasks);
        let aggregated = self.aggregated_edges();
        for (i, task) in tasks.iter().enumerate() {
            for next in self.trace_successors(task, &inputs, &aggregated) {
                let j = index[&next];
                if j == i || successors[i].contains(&j) {
                    continue;
                }
                successors[i].push(j);
                predecessors[j].push(i);
                dependencies.push((task.id(), next));
            }
        }

        let (order, broken) = sort(&predecessors, &successors);
        for &i in &broken {
            tracing::warn!(
                "[{}] Dependency cycle detected, scheduling '{}' before its predecessors",
                container_path,
                self.tree.path(tasks[i].id())
            );
        }

        for (i, task) in tasks.iter().enumerate() {
            task.set_links(
                predecessors[i].iter().map(|&p| tasks[p].id()).collect(),
                successors[i].iter().map(|&s| tasks[s].id()).collect(),
            );
        }

        let paths = tasks
            .iter()
            .map(|task| (task.id(), self.tree.path(task.id())))
            .collect();
        let schedule = Schedule {
            container: Some(self.container),
            tasks: order.iter().map(|&i| Arc::clone(&tasks[i])).collect(),
            paths,
            dependencies,
            broken_cycles: broken.iter().map(|&i| tasks[i].id()).collect(),
        };
        tracing::debug!(
            "[{}] Rebuilt schedule: {:?}",
            container_path,
            schedule.task_names()
        );
        Ok(schedule)
    }

    /// Ready tasks below the container, not descending into nested
    /// containers. Sensor tasks first, each group in tree order.
    fn collect_tasks(&self) -> Vec<Arc<PeriodicTask>> {
        let mut sensors = Vec::new();
        let mut regular = Vec::new();

        let mut stack = vec![self.container];
        while let Some(current) = stack.pop() {
            let Some(element) = self.tree.get(current) else {
                continue;
            };
            if current != self.container && element.flags().contains(ElementFlags::THREAD_CONTAINER) {
                continue;
            }
            if let ElementKind::Task(task) = element.kind() {
                if element.is_ready() {
                    if self.is_sensor(task) {
                        sensors.push(Arc::clone(task));
                    } else {
                        regular.push(Arc::clone(task));
                    }
                }
            }
            stack.extend(element.children().iter().rev().copied());
        }

        sensors.extend(regular);
        sensors
    }

    /// Declared sensor, no inputs, or only sensor interfaces as outputs.
    fn is_sensor(&self, task: &PeriodicTask) -> bool {
        if task.is_sensor() || task.incoming().is_empty() {
            return true;
        }
        !task.outgoing().is_empty()
            && task.outgoing().iter().all(|id| {
                self.tree
                    .get(*id)
                    .is_some_and(|e| e.flags().contains(ElementFlags::SENSOR_INTERFACE))
            })
    }

    /// Aggregation node of each boundary element (the boundary and the
    /// aggregators below it) -> tasks reading from it.
    fn incoming_index(&self, tasks: &[Arc<PeriodicTask>]) -> HashMap<ElementId, Vec<ElementId>> {
        let mut index: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        for task in tasks {
            for boundary in task.incoming() {
                for node in self.boundary_nodes(*boundary) {
                    let readers = index.entry(node).or_default();
                    if !readers.contains(&task.id()) {
                        readers.push(task.id());
                    }
                }
            }
        }
        index
    }

    fn boundary_nodes(&self, boundary: ElementId) -> Vec<ElementId> {
        self.tree
            .subtree(boundary)
            .into_iter()
            .filter(|id| {
                *id == boundary
                    || self
                        .tree
                        .get(*id)
                        .is_some_and(|e| e.flags().contains(ElementFlags::EDGE_AGGREGATOR))
            })
            .collect()
    }

    /// Node a port's edges are aggregated at: its nearest aggregator, or the
    /// port itself.
    fn node_of(&self, port: ElementId) -> ElementId {
        self.tree.nearest_aggregator(port).unwrap_or(port)
    }

    /// Port edges collapsed to edges between aggregation nodes.
    fn aggregated_edges(&self) -> HashMap<ElementId, Vec<ElementId>> {
        let mut edges: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        for port in self.tree.ports() {
            let destinations = port.outgoing_ports();
            if destinations.is_empty() {
                continue;
            }
            let from = self.node_of(port.id());
            for destination in destinations {
                if !self.tree.contains(destination.id()) {
                    continue;
                }
                let to = self.node_of(destination.id());
                let targets = edges.entry(from).or_default();
                if to != from && !targets.contains(&to) {
                    targets.push(to);
                }
            }
        }
        edges
    }

    /// Whether tracing continues through `node`.
    fn is_transparent(&self, node: ElementId) -> bool {
        match self.tree.get(node) {
            Some(element) => match element.kind() {
                ElementKind::Port(_) => true,
                _ => element.flags().contains(ElementFlags::INTERFACE),
            },
            None => false,
        }
    }

    /// Tasks reached from `task`'s outgoing interfaces, in discovery order.
    fn trace_successors(
        &self,
        task: &PeriodicTask,
        inputs: &HashMap<ElementId, Vec<ElementId>>,
        aggregated: &HashMap<ElementId, Vec<ElementId>>,
    ) -> Vec<ElementId> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<ElementId> = Vec::new();
        for boundary in task.outgoing() {
            for node in self.boundary_nodes(*boundary) {
                if visited.insert(node) {
                    stack.push(node);
                }
            }
        }
        stack.reverse();

        while let Some(node) = stack.pop() {
            let Some(targets) = aggregated.get(&node) else {
                continue;
            };
            for &target in targets.iter().rev() {
                if !visited.insert(target) {
                    continue;
                }
                if let Some(readers) = inputs.get(&target) {
                    for reader in readers {
                        if !found.contains(reader) {
                            found.push(*reader);
                        }
                    }
                } else if self.is_transparent(target) {
                    stack.push(target);
                }
            }
        }
        found
    }
}

/// Topological order of `0..n`. Picks the first task (in list order) whose
/// predecessors are all scheduled; when there is none, breaks a cycle.
/// Returns the order and the tasks at which cycles were broken.
fn sort(predecessors: &[Vec<usize>], successors: &[Vec<usize>]) -> (Vec<usize>, Vec<usize>) {
    let n = predecessors.len();
    let mut remaining: Vec<usize> = predecessors.iter().map(Vec::len).collect();
    let mut scheduled = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut broken = Vec::new();

    while order.len() < n {
        let ready = (0..n).find(|&i| !scheduled[i] && remaining[i] == 0);
        let chosen = match ready {
            Some(i) => i,
            None => match break_cycle(predecessors, &scheduled) {
                Some(i) => {
                    broken.push(i);
                    i
                }
                None => break,
            },
        };
        scheduled[chosen] = true;
        order.push(chosen);
        for &successor in &successors[chosen] {
            remaining[successor] = remaining[successor].saturating_sub(1);
        }
    }
    (order, broken)
}

/// Walk back from the first unscheduled task through unscheduled, not yet
/// visited predecessors. The task where the walk ends is scheduled next.
fn break_cycle(predecessors: &[Vec<usize>], scheduled: &[bool]) -> Option<usize> {
    let mut current = (0..scheduled.len()).find(|&i| !scheduled[i])?;
    let mut visited = vec![false; scheduled.len()];
    visited[current] = true;
    while let Some(previous) = predecessors[current]
        .iter()
        .copied()
        .find(|&p| !scheduled[p] && !visited[p])
    {
        visited[previous] = true;
        current = previous;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(n: usize, edges: &[(usize, usize)]) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
        let mut predecessors = vec![Vec::new(); n];
        let mut successors = vec![Vec::new(); n];
        for &(from, to) in edges {
            successors[from].push(to);
            predecessors[to].push(from);
        }
        (predecessors, successors)
    }

    #[test]
    fn test_sort_linear_chain_any_input_order() {
        // 2 -> 0 -> 1
        let (p, s) = graph(3, &[(2, 0), (0, 1)]);
        let (order, broken) = sort(&p, &s);
        assert_eq!(order, vec![2, 0, 1]);
        assert!(broken.is_empty());
    }

    #[test]
    fn test_sort_prefers_list_order_among_ready() {
        let (p, s) = graph(3, &[]);
        assert_eq!(sort(&p, &s).0, vec![0, 1, 2]);
    }

    #[test]
    fn test_two_cycle_breaks_deterministically() {
        let (p, s) = graph(2, &[(0, 1), (1, 0)]);
        for _ in 0..3 {
            let (order, broken) = sort(&p, &s);
            assert_eq!(order, vec![1, 0]);
            assert_eq!(broken, vec![1]);
        }
    }

    #[test]
    fn test_cycle_after_prefix() {
        // 0 -> 1 -> 2 -> 3 -> 1
        let (p, s) = graph(4, &[(0, 1), (1, 2), (2, 3), (3, 1)]);
        let (order, broken) = sort(&p, &s);
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], 0);
        assert_eq!(broken.len(), 1);
        // Walk from 1 back over 3 and 2; 1 is visited, so 2 is forced
        assert_eq!(broken[0], 2);
        assert_eq!(order, vec![0, 2, 3, 1]);
    }
}
