// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use bitflags::bitflags;

bitflags! {
    /// Role and strategy flags of a port.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PortFlags: u32 {
        /// Port is a data source (may have outgoing edges).
        const EMITS_DATA = 1 << 0;
        /// Port is a data sink (may have incoming edges).
        const ACCEPTS_DATA = 1 << 1;
        /// Input wants values pushed as soon as they are published.
        const PUSH_STRATEGY = 1 << 2;
        /// Accepts values pushed backwards from its destinations.
        const PUSH_STRATEGY_REVERSE = 1 << 3;
        /// Keeps a bounded FIFO of received values.
        const HAS_QUEUE = 1 << 4;
        /// Accepts buffers of types other than the declared one.
        const MULTI_TYPE_BUFFER_POOL = 1 << 5;
        /// Initialised; publishes are rejected before this is set.
        const READY = 1 << 6;
        /// Removed from the element tree.
        const DELETED = 1 << 7;

        const OUTPUT_PORT = Self::EMITS_DATA.bits();
        const INPUT_PORT = Self::ACCEPTS_DATA.bits() | Self::PUSH_STRATEGY.bits();
        const PROXY = Self::EMITS_DATA.bits() | Self::ACCEPTS_DATA.bits() | Self::PUSH_STRATEGY.bits();
    }
}

impl PortFlags {
    pub fn is_output(self) -> bool {
        self.contains(Self::EMITS_DATA) && !self.contains(Self::ACCEPTS_DATA)
    }

    pub fn is_input(self) -> bool {
        self.contains(Self::ACCEPTS_DATA) && !self.contains(Self::EMITS_DATA)
    }

    pub fn is_proxy(self) -> bool {
        self.contains(Self::EMITS_DATA | Self::ACCEPTS_DATA)
    }
}
