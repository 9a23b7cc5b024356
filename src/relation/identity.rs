//! Composite key values.
//!
//! An [`Identity`] is the ordered tuple of values a row holds for a list of
//! key fields. Rows fetched from different tables are correlated by building
//! identities in the same key order and comparing them as map keys, so no
//! value can ever collide with a separator.

use crate::entity::Entity;
use crate::value::Value;
use std::fmt;

/// Ordered tuple of key values.
///
/// # Example
///
/// ```no_run
/// use mooring::relation::identity::Identity;
/// use mooring::Entity;
///
/// let owner = Entity::new().with("tenant", 3).with("id", 1);
/// let key = Identity::of(&owner, ["tenant", "id"]).unwrap();
/// assert_eq!(key.arity(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(Vec<Value>);

impl Identity {
    pub fn new(values: Vec<Value>) -> Self {
        Identity(values)
    }

    /// Values of `fields` on `entity`, in the order given.
    ///
    /// Returns `None` if any field is absent or null: such a row cannot take
    /// part in a key match.
    pub fn of<'a, I>(entity: &Entity, fields: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        fields
            .into_iter()
            .map(|field| entity.value(field).filter(|v| !v.is_null()).cloned())
            .collect::<Option<Vec<Value>>>()
            .map(Identity)
    }

    /// Number of values in this identity
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.contains(value)
    }

    /// This identity followed by `other`.
    pub fn join(&self, other: &Identity) -> Identity {
        Identity(self.0.iter().chain(other.0.iter()).cloned().collect())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

impl<'a> IntoIterator for &'a Identity {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
