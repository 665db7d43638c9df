// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod buffers;
pub mod config;
pub mod error;
pub mod graph;
pub mod observability;
pub mod ports;
pub mod pubsub;
pub mod runtime;
pub mod scheduling;
pub mod types;

pub use buffers::*;
pub use config::{RuntimeConfig, ThreadContainerConfig};
pub use error::*;
pub use graph::*;
pub use observability::*;
pub use ports::*;
pub use pubsub::*;
pub use runtime::*;
pub use scheduling::*;
pub use types::*;
