// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Type-erased payload values and their runtime type descriptors.

use std::any::{Any, TypeId};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::number::{Number, NumericValue};
use super::unit::Unit;
use crate::core::{FlowError, Result};

/// Largest payload (in bytes) that is still copied by value between threads.
pub const CHEAP_COPY_MAX_SIZE: usize = 256;

/// Object-safe view of a port payload.
///
/// Implemented for every type that is `Clone + PartialEq + Debug + Serialize
/// + DeserializeOwned + Send + Sync`.
pub trait PortValue: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Deep copy `source` into `self`. Returns false if the types differ.
    fn copy_from(&mut self, source: &dyn PortValue) -> bool;

    fn equals(&self, other: &dyn PortValue) -> bool;

    fn serialize_into(&self, writer: &mut dyn Write) -> Result<()>;

    fn deserialize_from(&mut self, reader: &mut dyn Read) -> Result<()>;
}

impl<T> PortValue for T
where
    T: Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn copy_from(&mut self, source: &dyn PortValue) -> bool {
        match source.as_any().downcast_ref::<T>() {
            Some(source) => {
                self.clone_from(source);
                true
            }
            None => false,
        }
    }

    fn equals(&self, other: &dyn PortValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn serialize_into(&self, mut writer: &mut dyn Write) -> Result<()> {
        rmp_serde::encode::write(&mut writer, self)
            .map_err(|e| FlowError::Serialization(e.to_string()))
    }

    fn deserialize_from(&mut self, reader: &mut dyn Read) -> Result<()> {
        *self = rmp_serde::decode::from_read(reader)
            .map_err(|e| FlowError::Serialization(e.to_string()))?;
        Ok(())
    }
}

/// Numeric view installed for types registered as numeric.
#[derive(Clone, Copy)]
pub(crate) struct NumericOps {
    pub(crate) get: fn(&dyn PortValue) -> Option<Number>,
    pub(crate) set: fn(&mut dyn PortValue, f64, Unit) -> bool,
}

impl NumericOps {
    pub(crate) fn of<T: NumericValue + 'static>() -> Self {
        fn get<T: NumericValue + 'static>(value: &dyn PortValue) -> Option<Number> {
            value.as_any().downcast_ref::<T>().map(|v| v.to_number())
        }
        fn set<T: NumericValue + 'static>(value: &mut dyn PortValue, v: f64, unit: Unit) -> bool {
            match value.as_any_mut().downcast_mut::<T>() {
                Some(target) => {
                    target.set_number(v, unit);
                    true
                }
                None => false,
            }
        }
        Self {
            get: get::<T>,
            set: set::<T>,
        }
    }
}

pub(crate) struct DataTypeInfo {
    pub(crate) uid: u16,
    pub(crate) name: String,
    pub(crate) type_id: TypeId,
    pub(crate) rust_name: &'static str,
    pub(crate) size: usize,
    pub(crate) cheap_copy: bool,
    pub(crate) factory: fn() -> Box<dyn PortValue>,
    pub(crate) numeric: Option<NumericOps>,
}

/// Handle to a registered payload type. Cheap to clone.
#[derive(Clone)]
pub struct DataType(pub(crate) Arc<DataTypeInfo>);

impl DataType {
    pub fn uid(&self) -> u16 {
        self.0.uid
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn rust_name(&self) -> &'static str {
        self.0.rust_name
    }

    pub fn size(&self) -> usize {
        self.0.size
    }

    /// Small, drop-free payloads are copied instead of shared between readers.
    pub fn is_cheap_copy(&self) -> bool {
        self.0.cheap_copy
    }

    pub fn is_numeric(&self) -> bool {
        self.0.numeric.is_some()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.0.type_id == TypeId::of::<T>()
    }

    pub fn create_instance(&self) -> Box<dyn PortValue> {
        (self.0.factory)()
    }

    pub fn deep_copy(&self, source: &dyn PortValue, destination: &mut dyn PortValue) -> bool {
        destination.copy_from(source)
    }

    pub fn equals(&self, a: &dyn PortValue, b: &dyn PortValue) -> bool {
        a.equals(b)
    }

    pub fn serialize(&self, value: &dyn PortValue, writer: &mut dyn Write) -> Result<()> {
        value.serialize_into(writer)
    }

    pub fn deserialize(&self, value: &mut dyn PortValue, reader: &mut dyn Read) -> Result<()> {
        value.deserialize_from(reader)
    }

    pub(crate) fn numeric_value(&self, value: &dyn PortValue) -> Option<Number> {
        self.0.numeric.and_then(|ops| (ops.get)(value))
    }

    pub(crate) fn set_numeric_value(&self, value: &mut dyn PortValue, v: f64, unit: Unit) -> bool {
        self.0.numeric.is_some_and(|ops| (ops.set)(value, v, unit))
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        self.0.uid == other.0.uid
    }
}

impl Eq for DataType {}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataType")
            .field("uid", &self.0.uid)
            .field("name", &self.0.name)
            .finish()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_from_same_type() {
        let mut dst = 0.0f64;
        assert!(dst.copy_from(&4.5f64));
        assert_eq!(dst, 4.5);
    }

    #[test]
    fn test_copy_from_other_type_refused() {
        let mut dst = 1i32;
        assert!(!dst.copy_from(&String::from("nope")));
        assert_eq!(dst, 1);
    }

    #[test]
    fn test_serialize_roundtrip_through_trait_object() {
        let source: Box<dyn PortValue> = Box::new(String::from("payload"));
        let mut bytes = Vec::new();
        source.serialize_into(&mut bytes).unwrap();

        let mut target: Box<dyn PortValue> = Box::new(String::new());
        target.deserialize_from(&mut bytes.as_slice()).unwrap();
        assert!(target.equals(source.as_ref()));
    }
}
