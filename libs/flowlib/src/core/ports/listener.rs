// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::port::Port;
use crate::core::buffers::{LockedBuffer, ThreadContext};

/// Value-changed callback, invoked synchronously during publish and receive.
pub trait PortListener: Send + Sync {
    fn on_port_change(&self, port: &Port, value: &LockedBuffer);
}

impl<F> PortListener for F
where
    F: Fn(&Port, &LockedBuffer) + Send + Sync,
{
    fn on_port_change(&self, port: &Port, value: &LockedBuffer) {
        self(port, value)
    }
}

/// Answers pulls on a port with a computed value.
///
/// Returning `None` declines, and the pull continues towards the port's
/// sources. A returned buffer carries one lock owned by the puller.
pub trait PullRequestHandler: Send + Sync {
    fn try_pull(
        &self,
        port: &Port,
        ctx: &mut ThreadContext,
        intermediate_assign: bool,
    ) -> Option<LockedBuffer>;
}
