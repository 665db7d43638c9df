// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

use super::unit::Unit;

/// Numeric value tagged with a unit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Number {
    pub value: f64,
    pub unit: Unit,
}

impl Number {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn unitless(value: f64) -> Self {
        Self {
            value,
            unit: Unit::None,
        }
    }

    /// Value expressed in `unit`, if the units are compatible.
    pub fn value_in(&self, unit: Unit) -> Option<f64> {
        self.unit.convert(self.value, unit)
    }
}

/// Types whose payload can be viewed as a plain `f64` magnitude.
///
/// Bounded ports use this view to check and clamp values.
pub trait NumericValue {
    fn to_number(&self) -> Number;
    fn set_number(&mut self, value: f64, unit: Unit);
}

impl NumericValue for Number {
    fn to_number(&self) -> Number {
        *self
    }

    fn set_number(&mut self, value: f64, unit: Unit) {
        self.value = value;
        self.unit = unit;
    }
}

macro_rules! impl_numeric_primitive {
    ($($ty:ty),*) => {
        $(
            impl NumericValue for $ty {
                fn to_number(&self) -> Number {
                    Number::unitless(*self as f64)
                }

                fn set_number(&mut self, value: f64, _unit: Unit) {
                    *self = value as $ty;
                }
            }
        )*
    };
}

impl_numeric_primitive!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);
