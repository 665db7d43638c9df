// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Point-in-time snapshot types for graph observation.

use std::time::Duration;

use serde::Serialize;

use crate::core::graph::{Edge, ElementId};
use crate::core::scheduling::{ContainerStats, ScheduleReport};

/// Point-in-time snapshot of a port.
#[derive(Debug, Clone, Serialize)]
pub struct PortSnapshot {
    pub id: ElementId,
    /// Qualified path in the element tree.
    pub path: String,
    /// Registered payload type name.
    pub data_type: String,
    /// `cheap_copy` or `standard`.
    pub kind: String,
    pub ready: bool,
    /// -1: unused, 0: pull, n > 0: push.
    pub strategy: i16,
    /// Locks held on the current value, the port's own included.
    pub lock_count: u32,
    pub destinations: Vec<String>,
    pub sources: Vec<String>,
    pub listeners: usize,
    /// Entries waiting in the port queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_dropped: Option<u64>,
}

/// Point-in-time snapshot of a thread container.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSnapshot {
    pub id: ElementId,
    pub path: String,
    pub cycle_time: Duration,
    pub running: bool,
    pub stats: ContainerStats,
    /// Schedule executed by the last cycle.
    pub schedule: ScheduleReport,
}

/// Whole-graph snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub element_count: usize,
    pub ports: Vec<PortSnapshot>,
    pub edges: Vec<Edge>,
    pub thread_containers: Vec<ContainerSnapshot>,
}
