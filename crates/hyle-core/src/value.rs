// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! In-memory values produced by importers.
//!
//! A compile-time-known type imports to an opaque shared value the consumer
//! downcasts. A dynamically registered type has no compile-time shape, so
//! its importer decodes into [`DynValue`], a self-describing intermediate
//! whose structural interpretation is left to that type's consumer.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// A generic, self-describing decoded value.
///
/// Mappings and sequences preserve source order.
#[derive(Debug, Clone, PartialEq)]
pub enum DynValue {
    /// Explicit absence.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer number.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Text.
    String(String),
    /// Ordered sequence of values.
    Sequence(Vec<DynValue>),
    /// Ordered key-value mapping.
    Mapping(Vec<(String, DynValue)>),
}

impl DynValue {
    /// Looks up a key in a mapping; `None` for other shapes.
    pub fn get(&self, key: &str) -> Option<&DynValue> {
        match self {
            Self::Mapping(entries) => entries
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Returns the text if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the integer if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the number as a float, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Returns the boolean if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

// Deserialization goes through `deserialize_any`, so one impl serves every
// self-describing format an importer decodes from. Map and sequence entries
// are collected in the order the input presents them.
impl<'de> Deserialize<'de> for DynValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DynValueVisitor;

        impl<'de> Visitor<'de> for DynValueVisitor {
            type Value = DynValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("any self-describing value")
            }

            fn visit_bool<E>(self, value: bool) -> Result<DynValue, E> {
                Ok(DynValue::Bool(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<DynValue, E> {
                Ok(DynValue::Integer(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<DynValue, E> {
                // Magnitudes past i64 degrade to the float representation.
                match i64::try_from(value) {
                    Ok(fits) => Ok(DynValue::Integer(fits)),
                    Err(_) => Ok(DynValue::Float(value as f64)),
                }
            }

            fn visit_f64<E>(self, value: f64) -> Result<DynValue, E> {
                Ok(DynValue::Float(value))
            }

            fn visit_char<E>(self, value: char) -> Result<DynValue, E> {
                Ok(DynValue::String(value.to_string()))
            }

            fn visit_str<E>(self, value: &str) -> Result<DynValue, E> {
                Ok(DynValue::String(value.to_owned()))
            }

            fn visit_string<E>(self, value: String) -> Result<DynValue, E> {
                Ok(DynValue::String(value))
            }

            fn visit_unit<E>(self) -> Result<DynValue, E> {
                Ok(DynValue::Null)
            }

            fn visit_none<E>(self) -> Result<DynValue, E> {
                Ok(DynValue::Null)
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<DynValue, D::Error> {
                DynValue::deserialize(d)
            }

            fn visit_newtype_struct<D: Deserializer<'de>>(
                self,
                d: D,
            ) -> Result<DynValue, D::Error> {
                DynValue::deserialize(d)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<DynValue, A::Error> {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element()? {
                    items.push(item);
                }
                Ok(DynValue::Sequence(items))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<DynValue, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<String, DynValue>()? {
                    entries.push(entry);
                }
                Ok(DynValue::Mapping(entries))
            }
        }

        deserializer.deserialize_any(DynValueVisitor)
    }
}

/// The imported, ready-to-consume form of one asset.
///
/// Cloning is cheap; both variants share their payload.
#[derive(Clone)]
pub enum AssetValue {
    /// A compile-time-known value, downcast by its consumer.
    Typed(Arc<dyn Any + Send + Sync>),
    /// A decoded intermediate for a dynamically registered type.
    Dynamic(Arc<DynValue>),
}

impl AssetValue {
    /// Wraps a concrete value.
    pub fn typed<T: Any + Send + Sync>(value: T) -> Self {
        Self::Typed(Arc::new(value))
    }

    /// Wraps a decoded intermediate.
    pub fn dynamic(value: DynValue) -> Self {
        Self::Dynamic(Arc::new(value))
    }

    /// Borrows the payload as `T` if this is a typed value of that type.
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Self::Typed(any) => any.downcast_ref::<T>(),
            Self::Dynamic(_) => None,
        }
    }

    /// Borrows the intermediate if this is a dynamic value.
    pub fn as_dynamic(&self) -> Option<&DynValue> {
        match self {
            Self::Typed(_) => None,
            Self::Dynamic(value) => Some(value),
        }
    }
}

impl fmt::Debug for AssetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Typed(_) => f.write_str("AssetValue::Typed(..)"),
            Self::Dynamic(value) => write!(f, "AssetValue::Dynamic({value:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_hits_and_misses() {
        let value = AssetValue::typed(42u32);
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
        assert_eq!(value.downcast_ref::<i64>(), None);
        assert!(value.as_dynamic().is_none());
    }

    #[test]
    fn test_mapping_lookup_preserves_order() {
        let mapping = DynValue::Mapping(vec![
            ("b".into(), DynValue::Integer(2)),
            ("a".into(), DynValue::Integer(1)),
        ]);
        assert_eq!(mapping.get("a").and_then(DynValue::as_i64), Some(1));
        if let DynValue::Mapping(entries) = &mapping {
            assert_eq!(entries[0].0, "b");
        }
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(DynValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(DynValue::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(DynValue::String("x".into()).as_f64(), None);
    }

    #[test]
    fn test_deserialize_keeps_source_order() {
        let value: DynValue =
            serde_json::from_str(r#"{"z": 1, "a": [true, null, 2.5]}"#).expect("decode");
        let DynValue::Mapping(entries) = &value else {
            panic!("expected a mapping");
        };
        assert_eq!(entries[0].0, "z");
        assert_eq!(entries[1].0, "a");
        assert_eq!(
            value.get("a"),
            Some(&DynValue::Sequence(vec![
                DynValue::Bool(true),
                DynValue::Null,
                DynValue::Float(2.5),
            ]))
        );
    }
}
