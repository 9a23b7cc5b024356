//! Dynamic entity records.
//!
//! An [`Entity`] is an ordered set of named properties. Column data is held
//! as [`Property::Value`]; relation containers hold either a single related
//! entity ([`Property::Entity`]) or a collection ([`Property::Collection`]).
//!
//! Typed structs cross into and out of this representation through serde:
//!
//! ```no_run
//! use mooring::Entity;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Post { id: i64, title: String }
//!
//! let entity = Entity::from_serializable(&Post { id: 1, title: "Hello".into() })?;
//! let post: Post = entity.deserialize()?;
//! # Ok::<(), mooring::StorageError>(())
//! ```

use crate::error::{Result, StorageError};
use crate::value::Value;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// One named slot of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Value(Value),
    Entity(Box<Entity>),
    Collection(Vec<Entity>),
}

impl Property {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Property::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Property::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[Entity]> {
        match self {
            Property::Collection(c) => Some(c),
            _ => None,
        }
    }

    fn from_json(json: serde_json::Value) -> Property {
        match json {
            serde_json::Value::Object(map) => Property::Entity(Box::new(Entity::from_map(map))),
            serde_json::Value::Array(items) if items.iter().all(|i| i.is_object()) => {
                Property::Collection(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            serde_json::Value::Object(map) => Some(Entity::from_map(map)),
                            _ => None,
                        })
                        .collect(),
                )
            }
            other => Property::Value(Value::from_json(other)),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Property::Value(v) => v.to_json(),
            Property::Entity(e) => e.to_json(),
            Property::Collection(c) => serde_json::Value::Array(c.iter().map(Entity::to_json).collect()),
        }
    }
}

macro_rules! impl_property_from_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Property {
                fn from(value: $ty) -> Self {
                    Property::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_property_from_value!(bool, i32, i64, u32, &str, String, Decimal, NaiveDateTime);

impl From<Value> for Property {
    fn from(value: Value) -> Self {
        Property::Value(value)
    }
}

impl From<Entity> for Property {
    fn from(entity: Entity) -> Self {
        Property::Entity(Box::new(entity))
    }
}

impl From<Vec<Entity>> for Property {
    fn from(entities: Vec<Entity>) -> Self {
        Property::Collection(entities)
    }
}

/// A row fetched from or written to storage, plus any relation containers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entity {
    properties: IndexMap<String, Property>,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, name: impl Into<String>, property: impl Into<Property>) -> Self {
        self.set(name, property);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, property: impl Into<Property>) {
        self.properties.insert(name.into(), property.into());
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Scalar value of a column property. Containers and absent names yield `None`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).and_then(Property::as_value)
    }

    /// Scalar value of a column, treating absence as null.
    pub fn value_or_null(&self, name: &str) -> Value {
        self.value(name).cloned().unwrap_or(Value::Null)
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Property> {
        self.properties.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build an entity from a row of column values.
    pub fn from_row(row: IndexMap<String, Value>) -> Self {
        Entity {
            properties: row.into_iter().map(|(k, v)| (k, Property::Value(v))).collect(),
        }
    }

    /// Convert a JSON object into an entity.
    ///
    /// Nested objects become related entities and arrays of objects become
    /// collections; every other JSON value becomes a scalar.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Object(map) => Ok(Entity::from_map(map)),
            other => Err(StorageError::Query(format!(
                "entity must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| StorageError::Query(format!("failed to serialize entity: {e}")))?;
        Entity::from_json(json)
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_json())
            .map_err(|e| StorageError::Query(format!("failed to deserialize entity: {e}")))
    }

    fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Entity {
            properties: map
                .into_iter()
                .map(|(k, v)| (k, Property::from_json(v)))
                .collect(),
        }
    }
}
