// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Ports and the publish/receive/pull protocols.

mod bounds;
mod flags;
mod listener;
mod options;
mod port;
mod queue;

pub use bounds::{Assign, AssignOutcome, Bounds};
pub use flags::PortFlags;
pub use listener::{PortListener, PullRequestHandler};
pub use options::{
    BoundsConfig, OutOfBoundsPolicy, PortCreationInfo, PortOptions, PushStrategy,
    DEFAULT_QUEUE_CAPACITY,
};
pub use port::{Port, PortKind};
pub use queue::{PortQueue, QueueFragment};
