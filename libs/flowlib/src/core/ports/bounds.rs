// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Assignment strategies: plain swap or bounds interception.

use super::options::{BoundsConfig, OutOfBoundsPolicy};
use crate::core::buffers::{LockedBuffer, ThreadContext};
use crate::core::types::Unit;
use crate::core::{FlowError, Result};

/// Numeric bounds of a port, expressed in the port's unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    min: f64,
    max: f64,
    unit: Unit,
    policy: OutOfBoundsPolicy,
}

impl Bounds {
    pub fn new(min: f64, max: f64, unit: Unit, policy: OutOfBoundsPolicy) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(FlowError::Configuration(format!(
                "invalid bounds [{}, {}]",
                min, max
            )));
        }
        Ok(Self {
            min,
            max,
            unit,
            policy,
        })
    }

    pub fn from_config(config: &BoundsConfig, unit: Unit) -> Result<Self> {
        Self::new(config.min, config.max, unit, config.policy)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn policy(&self) -> OutOfBoundsPolicy {
        self.policy
    }

    pub fn contains(&self, magnitude: f64) -> bool {
        magnitude >= self.min && magnitude <= self.max
    }

    pub fn clamp(&self, magnitude: f64) -> f64 {
        magnitude.clamp(self.min, self.max)
    }

    /// Apply the bounds to a value about to be assigned.
    ///
    /// Values of types without a numeric view pass unchanged. Values whose
    /// unit cannot be converted to the bounds' unit, and NaN, are discarded.
    pub(crate) fn check(
        &self,
        ctx: &mut ThreadContext,
        buffer: &LockedBuffer,
        default_value: &LockedBuffer,
    ) -> AssignOutcome {
        let data_type = buffer.data_type().clone();
        let Some(number) = data_type.numeric_value(&**buffer.payload()) else {
            return AssignOutcome::Assigned;
        };

        let Some(magnitude) = number.value_in(self.unit) else {
            tracing::warn!(
                "Discarding value in {} on a port bounded in {}",
                number.unit,
                self.unit
            );
            return AssignOutcome::Discarded;
        };
        if magnitude.is_nan() {
            return AssignOutcome::Discarded;
        }
        if self.contains(magnitude) {
            return AssignOutcome::Assigned;
        }

        match self.policy {
            OutOfBoundsPolicy::Discard => {
                tracing::trace!(
                    "Value {} outside [{}, {}], discarded",
                    magnitude,
                    self.min,
                    self.max
                );
                AssignOutcome::Discarded
            }
            OutOfBoundsPolicy::Clamp => {
                let bound = self.clamp(magnitude);
                let mut fresh = ctx.get_unused_buffer(&data_type);
                {
                    let mut payload = fresh.payload_mut();
                    payload.copy_from(&**buffer.payload());
                    data_type.set_numeric_value(&mut **payload, bound, self.unit);
                }
                fresh.set_timestamp_ns(buffer.timestamp_ns());
                AssignOutcome::Substituted(fresh.into_locked())
            }
            OutOfBoundsPolicy::ApplyDefault => AssignOutcome::Substituted(default_value.clone()),
        }
    }
}

/// How a port stores incoming values.
#[derive(Debug, Clone, PartialEq)]
pub enum Assign {
    /// Swap the current reference.
    Standard,
    /// Intercept values before the swap.
    Bounded(Bounds),
}

/// Result of a bounds check.
#[derive(Debug)]
pub enum AssignOutcome {
    /// Value accepted as is.
    Assigned,
    /// Value replaced by this buffer, which is assigned and propagated instead.
    Substituted(LockedBuffer),
    /// Value rejected; the port keeps its previous value.
    Discarded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffers::BufferManager;
    use crate::core::types::{Number, TypeRegistry};

    fn locked_f64(ctx: &mut ThreadContext, registry: &TypeRegistry, value: f64) -> LockedBuffer {
        let mut buffer = ctx.get_unused_buffer(&registry.get::<f64>().unwrap());
        buffer.set(value).unwrap();
        buffer.into_locked()
    }

    fn default_f64(registry: &TypeRegistry, value: f64) -> LockedBuffer {
        LockedBuffer::adopt(BufferManager::standalone(
            registry.get::<f64>().unwrap(),
            &value,
        ))
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(Bounds::new(10.0, 0.0, Unit::None, OutOfBoundsPolicy::Clamp).is_err());
        assert!(Bounds::new(f64::NAN, 1.0, Unit::None, OutOfBoundsPolicy::Clamp).is_err());
    }

    #[test]
    fn test_in_bounds_assigned() {
        let registry = TypeRegistry::new();
        let mut ctx = ThreadContext::new("test");
        let bounds = Bounds::new(0.0, 10.0, Unit::None, OutOfBoundsPolicy::Discard).unwrap();
        let default = default_f64(&registry, 0.0);
        let value = locked_f64(&mut ctx, &registry, 10.0);
        assert!(matches!(
            bounds.check(&mut ctx, &value, &default),
            AssignOutcome::Assigned
        ));
    }

    #[test]
    fn test_clamp_substitutes_fresh_buffer() {
        let registry = TypeRegistry::new();
        let mut ctx = ThreadContext::new("test");
        let bounds = Bounds::new(0.0, 10.0, Unit::None, OutOfBoundsPolicy::Clamp).unwrap();
        let default = default_f64(&registry, 0.0);

        let high = locked_f64(&mut ctx, &registry, 15.0);
        match bounds.check(&mut ctx, &high, &default) {
            AssignOutcome::Substituted(clamped) => {
                assert_eq!(clamped.value::<f64>(), Some(10.0));
                assert!(!clamped.same_buffer(&high));
            }
            other => panic!("expected substitution, got {:?}", other),
        }

        let low = locked_f64(&mut ctx, &registry, -5.0);
        match bounds.check(&mut ctx, &low, &default) {
            AssignOutcome::Substituted(clamped) => assert_eq!(clamped.value::<f64>(), Some(0.0)),
            other => panic!("expected substitution, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_default_shares_default_buffer() {
        let registry = TypeRegistry::new();
        let mut ctx = ThreadContext::new("test");
        let bounds = Bounds::new(0.0, 10.0, Unit::None, OutOfBoundsPolicy::ApplyDefault).unwrap();
        let default = default_f64(&registry, 3.0);

        let value = locked_f64(&mut ctx, &registry, 42.0);
        match bounds.check(&mut ctx, &value, &default) {
            AssignOutcome::Substituted(substitute) => {
                assert!(substitute.same_buffer(&default));
                assert_eq!(default.lock_count(), 2);
            }
            other => panic!("expected substitution, got {:?}", other),
        }
        assert_eq!(default.lock_count(), 1);
    }

    #[test]
    fn test_unit_converted_magnitude() {
        let registry = TypeRegistry::new();
        let number_type = registry.get::<Number>().unwrap();
        let mut ctx = ThreadContext::new("test");
        let bounds = Bounds::new(0.0, 100.0, Unit::Centimeter, OutOfBoundsPolicy::Clamp).unwrap();
        let default = LockedBuffer::adopt(BufferManager::standalone(
            number_type.clone(),
            &Number::new(0.0, Unit::Centimeter),
        ));

        let mut in_range = ctx.get_unused_buffer(&number_type);
        in_range.set(Number::new(0.5, Unit::Meter)).unwrap();
        let in_range = in_range.into_locked();
        assert!(matches!(
            bounds.check(&mut ctx, &in_range, &default),
            AssignOutcome::Assigned
        ));

        let mut too_far = ctx.get_unused_buffer(&number_type);
        too_far.set(Number::new(2.0, Unit::Meter)).unwrap();
        let too_far = too_far.into_locked();
        match bounds.check(&mut ctx, &too_far, &default) {
            AssignOutcome::Substituted(clamped) => {
                assert_eq!(
                    clamped.value::<Number>(),
                    Some(Number::new(100.0, Unit::Centimeter))
                );
            }
            other => panic!("expected substitution, got {:?}", other),
        }

        let mut wrong_family = ctx.get_unused_buffer(&number_type);
        wrong_family.set(Number::new(1.0, Unit::Second)).unwrap();
        let wrong_family = wrong_family.into_locked();
        assert!(matches!(
            bounds.check(&mut ctx, &wrong_family, &default),
            AssignOutcome::Discarded
        ));
    }
}
