// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Registry of payload types known to a runtime.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::data_type::{DataType, DataTypeInfo, NumericOps, PortValue, CHEAP_COPY_MAX_SIZE};
use super::number::{Number, NumericValue};
use crate::core::{FlowError, Result};

#[derive(Default)]
struct RegistryInner {
    types: Vec<DataType>,
    by_name: HashMap<String, usize>,
    by_type_id: HashMap<TypeId, usize>,
}

/// Payload types available to ports.
///
/// Owned by a [`FlowRuntime`](crate::core::FlowRuntime); tests construct
/// isolated instances.
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl TypeRegistry {
    /// Registry with the built-in types (`bool`, integers, floats, `String`,
    /// `Number`).
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.install_builtins();
        registry
    }

    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    fn install_builtins(&self) {
        let builtins: [fn(&TypeRegistry) -> Result<DataType>; 8] = [
            |r| r.register::<bool>("bool"),
            |r| r.register_numeric::<i32>("i32"),
            |r| r.register_numeric::<i64>("i64"),
            |r| r.register_numeric::<u32>("u32"),
            |r| r.register_numeric::<f32>("f32"),
            |r| r.register_numeric::<f64>("f64"),
            |r| r.register::<String>("String"),
            |r| r.register_numeric::<Number>("Number"),
        ];
        for register in builtins {
            if let Err(e) = register(self) {
                tracing::warn!("Failed to register built-in type: {}", e);
            }
        }
    }

    /// Register `T` under `name`. Registering the same type twice returns the
    /// existing handle.
    pub fn register<T>(&self, name: &str) -> Result<DataType>
    where
        T: Clone + PartialEq + Default + fmt::Debug + Serialize + DeserializeOwned + Send + Sync,
        T: 'static,
    {
        self.insert::<T>(name, None)
    }

    /// Register `T` with a numeric view so bounded ports can check it.
    pub fn register_numeric<T>(&self, name: &str) -> Result<DataType>
    where
        T: Clone + PartialEq + Default + fmt::Debug + Serialize + DeserializeOwned + Send + Sync,
        T: NumericValue + 'static,
    {
        self.insert::<T>(name, Some(NumericOps::of::<T>()))
    }

    fn insert<T>(&self, name: &str, numeric: Option<NumericOps>) -> Result<DataType>
    where
        T: Clone + PartialEq + Default + fmt::Debug + Serialize + DeserializeOwned + Send + Sync,
        T: 'static,
    {
        fn create<T: PortValue + Default>() -> Box<dyn PortValue> {
            Box::new(T::default())
        }

        let mut inner = self.inner.write();
        let type_id = TypeId::of::<T>();

        if let Some(&idx) = inner.by_type_id.get(&type_id) {
            return Ok(inner.types[idx].clone());
        }
        if inner.by_name.contains_key(name) {
            return Err(FlowError::Configuration(format!(
                "Type name '{}' is already registered for a different type",
                name
            )));
        }
        let uid = u16::try_from(inner.types.len()).map_err(|_| {
            FlowError::Configuration("Type registry is full (65536 types)".to_string())
        })?;

        let size = std::mem::size_of::<T>();
        let data_type = DataType(Arc::new(DataTypeInfo {
            uid,
            name: name.to_string(),
            type_id,
            rust_name: std::any::type_name::<T>(),
            size,
            cheap_copy: size <= CHEAP_COPY_MAX_SIZE && !std::mem::needs_drop::<T>(),
            factory: create::<T>,
            numeric,
        }));

        let idx = inner.types.len();
        inner.types.push(data_type.clone());
        inner.by_name.insert(name.to_string(), idx);
        inner.by_type_id.insert(type_id, idx);

        tracing::debug!(
            "Registered type '{}' (uid {}, {} bytes, cheap_copy={})",
            name,
            uid,
            size,
            data_type.is_cheap_copy()
        );
        Ok(data_type)
    }

    pub fn get<T: 'static>(&self) -> Option<DataType> {
        let inner = self.inner.read();
        inner
            .by_type_id
            .get(&TypeId::of::<T>())
            .map(|&idx| inner.types[idx].clone())
    }

    pub fn by_name(&self, name: &str) -> Option<DataType> {
        let inner = self.inner.read();
        inner.by_name.get(name).map(|&idx| inner.types[idx].clone())
    }

    pub fn by_uid(&self, uid: u16) -> Option<DataType> {
        self.inner.read().types.get(uid as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    struct Pose {
        x: f64,
        y: f64,
        yaw: f64,
    }

    #[test]
    fn test_builtins_present() {
        let registry = TypeRegistry::new();
        assert!(registry.get::<f64>().unwrap().is_numeric());
        assert!(registry.get::<Number>().is_some());
        assert!(!registry.get::<String>().unwrap().is_cheap_copy());
        assert!(registry.get::<i32>().unwrap().is_cheap_copy());
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = TypeRegistry::new();
        let a = registry.register::<Pose>("Pose").unwrap();
        let b = registry.register::<Pose>("Pose").unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.by_name("Pose").unwrap(), a);
        assert_eq!(registry.by_uid(a.uid()).unwrap(), a);
    }

    #[test]
    fn test_name_collision_rejected() {
        let registry = TypeRegistry::new();
        let result = registry.register::<Pose>("f64");
        assert!(matches!(result, Err(FlowError::Configuration(_))));
    }

    #[test]
    fn test_create_instance_and_equals() {
        let registry = TypeRegistry::new();
        let pose = registry.register::<Pose>("Pose").unwrap();
        let a = pose.create_instance();
        let mut b = pose.create_instance();
        assert!(pose.equals(a.as_ref(), b.as_ref()));

        let moved = Pose {
            x: 1.0,
            y: 2.0,
            yaw: 0.5,
        };
        assert!(pose.deep_copy(&moved, b.as_mut()));
        assert!(!pose.equals(a.as_ref(), b.as_ref()));
        assert_eq!(b.as_any().downcast_ref::<Pose>(), Some(&moved));
    }
}
