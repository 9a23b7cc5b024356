//! Field definitions and value coercion.

use crate::error::{Result, StorageError};
use crate::value::{Value, DATETIME_FORMAT};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    Integer,
    Decimal,
    String,
    DateTime,
    /// Arbitrary data stored as serialized JSON text.
    Serial,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::String => "string",
            FieldType::DateTime => "datetime",
            FieldType::Serial => "serial",
        }
    }

    /// Convert a value into the representation this type is stored as.
    ///
    /// `Null` passes through for every type.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Query` if the value cannot be represented,
    /// e.g. `"abc"` for an integer field.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        let coerced = match (self, value) {
            (FieldType::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
            (FieldType::Boolean, Value::Integer(i)) => Some(Value::Bool(i != 0)),
            (FieldType::Boolean, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "1" | "t" | "true" | "yes" => Some(Value::Bool(true)),
                "0" | "f" | "false" | "no" | "" => Some(Value::Bool(false)),
                _ => None,
            },

            (FieldType::Integer, Value::Integer(i)) => Some(Value::Integer(i)),
            (FieldType::Integer, Value::Bool(b)) => Some(Value::Integer(i64::from(b))),
            (FieldType::Integer, Value::Decimal(d)) if d.fract().is_zero() => d.to_i64().map(Value::Integer),
            (FieldType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::Integer),

            (FieldType::Decimal, Value::Decimal(d)) => Some(Value::Decimal(d)),
            (FieldType::Decimal, Value::Integer(i)) => Some(Value::Decimal(Decimal::from(i))),
            (FieldType::Decimal, Value::String(s)) => Decimal::from_str(s.trim()).ok().map(Value::Decimal),

            (FieldType::String, Value::String(s)) => Some(Value::String(s)),
            (FieldType::String, other) => Some(Value::String(other.to_string())),

            (FieldType::DateTime, Value::DateTime(dt)) => Some(Value::DateTime(dt)),
            (FieldType::DateTime, Value::Integer(ts)) => {
                DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| Value::DateTime(dt.naive_utc()))
            }
            (FieldType::DateTime, Value::String(s)) => parse_datetime(&s).map(Value::DateTime),

            (FieldType::Serial, Value::String(s)) => Some(Value::String(s)),
            (FieldType::Serial, other) => serde_json::to_string(&other).ok().map(Value::String),

            (_, other) => {
                return Err(StorageError::Query(format!(
                    "cannot convert {other:?} to {}",
                    self.as_str()
                )))
            }
        };

        coerced.ok_or_else(|| StorageError::Query(format!("value is not a valid {}", self.as_str())))
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, DATETIME_FORMAT) {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Optional column attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Unsigned,
    Default(Value),
    AutoIncrement,
    Nullable,
    Length(u32),
    Precision(u32),
}

impl Attribute {
    /// Parse a textual attribute key. Unknown keys yield `None`.
    pub fn parse(key: &str, value: Value) -> Option<Attribute> {
        let number = |v: &Value| v.as_i64().and_then(|n| u32::try_from(n).ok());
        match key {
            "unsigned" => Some(Attribute::Unsigned),
            "default" => Some(Attribute::Default(value)),
            "auto_increment" => Some(Attribute::AutoIncrement),
            "null" => Some(Attribute::Nullable),
            "length" => number(&value).map(Attribute::Length),
            "precision" => number(&value).map(Attribute::Precision),
            _ => None,
        }
    }

    fn same_kind(&self, other: &Attribute) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Definition of one field of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    table: Option<String>,
    name: String,
    field_type: FieldType,
    mapping: Option<String>,
    attributes: Vec<Attribute>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldDef {
            table: None,
            name: name.into(),
            field_type,
            mapping: None,
            attributes: Vec::new(),
        }
    }

    /// Store the field under a different column name.
    pub fn mapping(mut self, column: impl Into<String>) -> Self {
        self.mapping = Some(column.into());
        self
    }

    /// Add an attribute, replacing one of the same kind.
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.retain(|a| !a.same_kind(&attribute));
        self.attributes.push(attribute);
        self
    }

    /// Add attributes from textual key/value pairs; unknown keys are ignored.
    pub fn attributes<K, I>(self, attributes: I) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Value)>,
    {
        attributes.into_iter().fold(self, |field, (key, value)| {
            match Attribute::parse(key.as_ref(), value) {
                Some(attribute) => field.attribute(attribute),
                None => field,
            }
        })
    }

    pub(crate) fn set_table(&mut self, table: &str) {
        self.table = Some(table.to_string());
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Column this field is stored in.
    pub fn column(&self) -> &str {
        self.mapping.as_deref().unwrap_or(&self.name)
    }

    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    pub fn attribute_list(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn has_attribute(&self, attribute: &Attribute) -> bool {
        self.attributes.iter().any(|a| a.same_kind(attribute))
    }

    pub fn is_auto_increment(&self) -> bool {
        self.has_attribute(&Attribute::AutoIncrement)
    }

    pub fn is_nullable(&self) -> bool {
        self.has_attribute(&Attribute::Nullable)
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Default(v) => Some(v),
            _ => None,
        })
    }

    pub fn coerce(&self, value: Value) -> Result<Value> {
        self.field_type.coerce(value)
    }
}
