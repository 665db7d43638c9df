// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Runtime and port configuration.

mod runtime_config;

pub use crate::core::ports::{BoundsConfig, OutOfBoundsPolicy, PortOptions, PushStrategy};
pub use runtime_config::{RuntimeConfig, ThreadContainerConfig};
