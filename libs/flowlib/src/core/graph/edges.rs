// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Edge graph between ports.
//!
//! An edge is stored twice: as an outgoing entry on the source and an
//! incoming entry on the destination. Both lists are copy-on-write, so a
//! publish iterating a snapshot never sees a torn list. Mutations happen
//! only here, under the runtime's structural lock.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::element::ElementId;
use crate::core::ports::{Port, PortFlags};
use crate::core::{FlowError, Result};

/// Directed relation between two ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: ElementId,
    pub destination: ElementId,
}

/// Validate and add the edge `source -> destination`.
pub(crate) fn connect_ports(source: &Arc<Port>, destination: &Arc<Port>) -> Result<Edge> {
    if source.id() == destination.id() {
        return Err(FlowError::Connection(format!(
            "cannot connect '{}' to itself",
            source.name()
        )));
    }
    if source.flags().contains(PortFlags::DELETED) || destination.flags().contains(PortFlags::DELETED) {
        return Err(FlowError::Connection(format!(
            "cannot connect deleted port '{}' -> '{}'",
            source.name(),
            destination.name()
        )));
    }
    if !source.flags().contains(PortFlags::EMITS_DATA) {
        return Err(FlowError::Connection(format!(
            "'{}' does not emit data",
            source.name()
        )));
    }
    if !destination.flags().contains(PortFlags::ACCEPTS_DATA) {
        return Err(FlowError::Connection(format!(
            "'{}' does not accept data",
            destination.name()
        )));
    }
    if !destination.accepts_type(source.data_type()) {
        return Err(FlowError::TypeMismatch(format!(
            "'{}' carries {}, '{}' carries {}",
            source.name(),
            source.data_type(),
            destination.name(),
            destination.data_type()
        )));
    }
    if source.is_connected_to(destination) {
        return Err(FlowError::ConnectionAlreadyExists(format!(
            "'{}' -> '{}'",
            source.name(),
            destination.name()
        )));
    }

    source.add_destination(destination);
    destination.add_source(source);
    source.update_strategy();

    tracing::debug!(
        "Connected '{}' -> '{}' (strategy {})",
        source.name(),
        destination.name(),
        source.strategy()
    );
    Ok(Edge {
        source: source.id(),
        destination: destination.id(),
    })
}

/// Remove the edge `source -> destination`.
pub(crate) fn disconnect_ports(source: &Arc<Port>, destination: &Arc<Port>) -> Result<Edge> {
    if !source.is_connected_to(destination) {
        return Err(FlowError::ConnectionNotFound(format!(
            "'{}' -> '{}'",
            source.name(),
            destination.name()
        )));
    }

    source.remove_destination(destination.id());
    destination.remove_source(source.id());
    source.update_strategy();

    tracing::debug!(
        "Disconnected '{}' -> '{}'",
        source.name(),
        destination.name()
    );
    Ok(Edge {
        source: source.id(),
        destination: destination.id(),
    })
}

/// Remove every edge touching `port`. Returns the removed edges.
pub(crate) fn disconnect_all(port: &Arc<Port>) -> Vec<Edge> {
    let mut removed = Vec::new();
    for destination in port.outgoing_ports() {
        if let Ok(edge) = disconnect_ports(port, &destination) {
            removed.push(edge);
        }
    }
    for source in port.incoming_ports() {
        if let Ok(edge) = disconnect_ports(&source, port) {
            removed.push(edge);
        }
    }
    removed
}

/// Edges leaving `port`, in connection order.
pub fn outgoing_edges(port: &Port) -> Vec<Edge> {
    port.outgoing_ports()
        .iter()
        .map(|destination| Edge {
            source: port.id(),
            destination: destination.id(),
        })
        .collect()
}
