// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Runtime configuration via `flowlib.yaml`.

use crate::core::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Per-container overrides, keyed by container name in [`RuntimeConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadContainerConfig {
    #[serde(default)]
    pub cycle_time_ms: Option<u64>,
    #[serde(default)]
    pub warn_on_cycle_overrun: Option<bool>,
}

/// Runtime configuration from `flowlib.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Cycle time of thread containers without an override.
    pub default_cycle_time_ms: u64,

    /// Capacity of port queues created without an explicit capacity.
    pub default_queue_capacity: usize,

    pub warn_on_cycle_overrun: bool,

    pub thread_containers: HashMap<String, ThreadContainerConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_cycle_time_ms: 40,
            default_queue_capacity: crate::core::ports::DEFAULT_QUEUE_CAPACITY,
            warn_on_cycle_overrun: true,
            thread_containers: HashMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "flowlib.yaml";

    /// Load configuration from a directory. Returns error if the file is
    /// missing, cannot be parsed or holds invalid values.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            FlowError::Configuration(format!("Failed to read {}: {}", config_path.display(), e))
        })?;

        let config = Self::from_yaml(&content).map_err(|e| {
            FlowError::Configuration(format!("{}: {}", config_path.display(), e))
        })?;

        tracing::info!("Loaded runtime config from {}", config_path.display());
        Ok(config)
    }

    /// Load configuration from a directory, returning defaults if the file
    /// is missing or unusable.
    pub fn load_or_default(dir: &Path) -> Self {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            tracing::debug!(
                "No {} found in {}, using defaults",
                Self::FILE_NAME,
                dir.display()
            );
            return Self::default();
        }

        match Self::load(dir) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| FlowError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_cycle_time_ms == 0 {
            return Err(FlowError::Configuration(
                "default_cycle_time_ms must be greater than zero".into(),
            ));
        }
        if self.default_queue_capacity == 0 {
            return Err(FlowError::Configuration(
                "default_queue_capacity must be greater than zero".into(),
            ));
        }
        for (name, container) in &self.thread_containers {
            if container.cycle_time_ms == Some(0) {
                return Err(FlowError::Configuration(format!(
                    "thread container '{}': cycle_time_ms must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn cycle_time_for(&self, container: &str) -> Duration {
        let ms = self
            .thread_containers
            .get(container)
            .and_then(|c| c.cycle_time_ms)
            .unwrap_or(self.default_cycle_time_ms);
        Duration::from_millis(ms)
    }

    pub fn warn_on_overrun_for(&self, container: &str) -> bool {
        self.thread_containers
            .get(container)
            .and_then(|c| c.warn_on_cycle_overrun)
            .unwrap_or(self.warn_on_cycle_overrun)
    }
}
