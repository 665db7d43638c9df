// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod edges;
mod element;
mod tree;

pub(crate) use edges::{connect_ports, disconnect_all, disconnect_ports};
pub use edges::{outgoing_edges, Edge};
pub use element::{Element, ElementFlags, ElementId, ElementKind};
pub use tree::ElementTree;
