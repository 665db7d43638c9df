// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Port creation info and the recognised port options.

use serde::{Deserialize, Serialize};

use super::flags::PortFlags;
use crate::core::types::{DataType, PortValue, Unit};

/// Default capacity of a port queue when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// How an input port wants to obtain its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStrategy {
    /// Values are forwarded as soon as they are published.
    Continuous,
    /// Values are pulled from the source when read.
    OnDemand,
}

/// What a bounded port does with a value outside its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfBoundsPolicy {
    /// Keep the previous value.
    #[default]
    Discard,
    /// Replace the value with the violated bound.
    Clamp,
    /// Replace the value with the port's default value.
    ApplyDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsConfig {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub policy: OutOfBoundsPolicy,
}

/// Recognised port options, usually read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortOptions {
    /// Overrides the strategy implied by the port flags.
    pub push_strategy: Option<PushStrategy>,
    /// Accept values pushed backwards from destinations.
    pub reverse_push: bool,
    pub queue_enabled: bool,
    /// Falls back to the runtime's default queue capacity.
    pub queue_capacity: Option<usize>,
    pub bounds: Option<BoundsConfig>,
    /// Unit of the port's values; bounds are expressed in it.
    pub unit: Unit,
    pub multi_type_pool: bool,
}

impl PortOptions {
    /// Flags implied by these options on top of `base`. Boolean options only
    /// ever add flags.
    pub fn apply_to(&self, base: PortFlags) -> PortFlags {
        let mut flags = base;
        match self.push_strategy {
            Some(PushStrategy::Continuous) => flags.insert(PortFlags::PUSH_STRATEGY),
            Some(PushStrategy::OnDemand) => flags.remove(PortFlags::PUSH_STRATEGY),
            None => {}
        }
        if self.reverse_push {
            flags.insert(PortFlags::PUSH_STRATEGY_REVERSE);
        }
        if self.queue_enabled {
            flags.insert(PortFlags::HAS_QUEUE);
        }
        if self.multi_type_pool {
            flags.insert(PortFlags::MULTI_TYPE_BUFFER_POOL);
        }
        flags
    }
}

/// Everything needed to create a port.
#[derive(Debug)]
pub struct PortCreationInfo {
    pub name: String,
    pub data_type: DataType,
    pub flags: PortFlags,
    pub options: PortOptions,
    /// Copied into the port's default buffer; the type's default instance
    /// when absent.
    pub default_value: Option<Box<dyn PortValue>>,
}

impl PortCreationInfo {
    pub fn new(name: impl Into<String>, data_type: DataType, flags: PortFlags) -> Self {
        Self {
            name: name.into(),
            data_type,
            flags,
            options: PortOptions::default(),
            default_value: None,
        }
    }

    pub fn output(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, PortFlags::OUTPUT_PORT)
    }

    pub fn input(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, PortFlags::INPUT_PORT)
    }

    pub fn proxy(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, data_type, PortFlags::PROXY)
    }

    pub fn with_options(mut self, options: PortOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_default<T: PortValue>(mut self, value: T) -> Self {
        self.default_value = Some(Box::new(value));
        self
    }

    pub fn with_bounds(mut self, min: f64, max: f64, policy: OutOfBoundsPolicy) -> Self {
        self.options.bounds = Some(BoundsConfig { min, max, policy });
        self
    }

    pub fn with_queue(mut self, capacity: usize) -> Self {
        self.options.queue_enabled = true;
        self.options.queue_capacity = Some(capacity);
        self
    }

    /// Flags after applying the options.
    pub fn effective_flags(&self) -> PortFlags {
        self.options.apply_to(self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_yaml() {
        let yaml = r#"
push_strategy: on_demand
queue_enabled: true
queue_capacity: 4
bounds:
  min: 0.0
  max: 10.0
  policy: clamp
unit: meter
"#;
        let options: PortOptions = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(options.push_strategy, Some(PushStrategy::OnDemand));
        assert_eq!(options.queue_capacity, Some(4));
        assert_eq!(options.bounds.unwrap().policy, OutOfBoundsPolicy::Clamp);
        assert_eq!(options.unit, Unit::Meter);
        assert!(!options.multi_type_pool);
    }

    #[test]
    fn test_options_apply_to_flags() {
        let options = PortOptions {
            push_strategy: Some(PushStrategy::OnDemand),
            queue_enabled: true,
            ..Default::default()
        };
        let flags = options.apply_to(PortFlags::INPUT_PORT);
        assert!(!flags.contains(PortFlags::PUSH_STRATEGY));
        assert!(flags.contains(PortFlags::HAS_QUEUE));
        assert!(flags.contains(PortFlags::ACCEPTS_DATA));
    }

    #[test]
    fn test_default_options_keep_creation_flags() {
        let registry = crate::core::types::TypeRegistry::new();
        let base = PortFlags::INPUT_PORT | PortFlags::HAS_QUEUE | PortFlags::PUSH_STRATEGY_REVERSE;
        let info = PortCreationInfo::new("q", registry.get::<f64>().unwrap(), base);

        let flags = info.effective_flags();
        assert!(flags.contains(PortFlags::HAS_QUEUE));
        assert!(flags.contains(PortFlags::PUSH_STRATEGY_REVERSE));
        assert!(flags.contains(PortFlags::PUSH_STRATEGY));
    }
}
