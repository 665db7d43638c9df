// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Payload type registry, numeric views and units.

mod data_type;
mod number;
mod registry;
mod unit;

pub use data_type::{DataType, PortValue, CHEAP_COPY_MAX_SIZE};
pub use number::{Number, NumericValue};
pub use registry::TypeRegistry;
pub use unit::{Unit, UnitFamily};
