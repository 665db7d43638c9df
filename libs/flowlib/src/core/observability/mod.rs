// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Observability layer for runtime inspection.

mod inspector;
mod snapshots;

pub use inspector::GraphInspector;
pub use snapshots::{ContainerSnapshot, GraphSnapshot, PortSnapshot};
