//! Relation definitions.
//!
//! A relation connects an owner model to a target entity either directly
//! (`One`, `Many`) or through a mediator join entity (`OneThrough`,
//! `ManyThrough`).
//!
//! Key maps are ordered; composite keys are built in declaration order.
//!
//! | type | `local_keys()` | `foreign_keys()` |
//! |---|---|---|
//! | direct | owner field → target field | target field → owner field |
//! | through | owner field → mediator field | mediator field → target field |

use crate::error::{Result, StorageError};
use crate::value::Value;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationType {
    One,
    Many,
    OneThrough,
    ManyThrough,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::One => "one",
            RelationType::Many => "many",
            RelationType::OneThrough => "oneThrough",
            RelationType::ManyThrough => "manyThrough",
        }
    }

    pub fn is_through(&self) -> bool {
        matches!(self, RelationType::OneThrough | RelationType::ManyThrough)
    }

    /// Whether the container holds a single entity rather than a collection.
    pub fn is_single(&self) -> bool {
        matches!(self, RelationType::One | RelationType::OneThrough)
    }
}

fn key_map<I, L, F>(keys: I) -> IndexMap<String, String>
where
    I: IntoIterator<Item = (L, F)>,
    L: Into<String>,
    F: Into<String>,
{
    keys.into_iter().map(|(l, f)| (l.into(), f.into())).collect()
}

fn value_map<I, K, V>(values: I) -> IndexMap<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    values.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Definition of one relation of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDef {
    name: String,
    relation_type: RelationType,
    entity: String,
    mediator: Option<String>,
    container: String,
    keys: IndexMap<String, String>,
    through_keys: IndexMap<String, String>,
    local_values: IndexMap<String, Value>,
    foreign_values: IndexMap<String, Value>,
}

impl RelationDef {
    fn build(
        name: String,
        relation_type: RelationType,
        entity: String,
        mediator: Option<String>,
        keys: IndexMap<String, String>,
        through_keys: IndexMap<String, String>,
    ) -> Result<Self> {
        if keys.is_empty() {
            return Err(StorageError::Definition(format!(
                "no keys in relation '{name}'"
            )));
        }
        if relation_type.is_through() && through_keys.is_empty() {
            return Err(StorageError::Definition(format!(
                "no target keys in through relation '{name}'"
            )));
        }
        if mediator.as_deref().is_some_and(str::is_empty) {
            return Err(StorageError::Definition(format!(
                "empty mediator entity in relation '{name}'"
            )));
        }

        Ok(RelationDef {
            container: name.clone(),
            name,
            relation_type,
            entity,
            mediator,
            keys,
            through_keys,
            local_values: IndexMap::new(),
            foreign_values: IndexMap::new(),
        })
    }

    /// Owner has at most one target; `keys` map owner fields to target fields.
    pub fn one<I, L, F>(name: impl Into<String>, entity: impl Into<String>, keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = (L, F)>,
        L: Into<String>,
        F: Into<String>,
    {
        Self::build(name.into(), RelationType::One, entity.into(), None, key_map(keys), IndexMap::new())
    }

    /// Owner has any number of targets; `keys` map owner fields to target fields.
    pub fn many<I, L, F>(name: impl Into<String>, entity: impl Into<String>, keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = (L, F)>,
        L: Into<String>,
        F: Into<String>,
    {
        Self::build(name.into(), RelationType::Many, entity.into(), None, key_map(keys), IndexMap::new())
    }

    /// Single target reached through `mediator`.
    ///
    /// `local_keys` map owner fields to mediator fields, `foreign_keys` map
    /// mediator fields to target fields.
    pub fn one_through<I, J, L, M, N, F>(
        name: impl Into<String>,
        entity: impl Into<String>,
        mediator: impl Into<String>,
        local_keys: I,
        foreign_keys: J,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (L, M)>,
        J: IntoIterator<Item = (N, F)>,
        L: Into<String>,
        M: Into<String>,
        N: Into<String>,
        F: Into<String>,
    {
        Self::build(
            name.into(),
            RelationType::OneThrough,
            entity.into(),
            Some(mediator.into()),
            key_map(local_keys),
            key_map(foreign_keys),
        )
    }

    /// Collection of targets reached through `mediator`.
    pub fn many_through<I, J, L, M, N, F>(
        name: impl Into<String>,
        entity: impl Into<String>,
        mediator: impl Into<String>,
        local_keys: I,
        foreign_keys: J,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (L, M)>,
        J: IntoIterator<Item = (N, F)>,
        L: Into<String>,
        M: Into<String>,
        N: Into<String>,
        F: Into<String>,
    {
        Self::build(
            name.into(),
            RelationType::ManyThrough,
            entity.into(),
            Some(mediator.into()),
            key_map(local_keys),
            key_map(foreign_keys),
        )
    }

    /// Owner property holding the related data. Defaults to the relation name.
    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    /// Only owners whose fields equal these values take part in the relation.
    pub fn local_values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.local_values = value_map(values);
        self
    }

    /// Fixed values on the first-hop entity: added to its fetch conditions
    /// and to every row written to it.
    pub fn foreign_values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.foreign_values = value_map(values);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn relation_type(&self) -> RelationType {
        self.relation_type
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn mediator(&self) -> Option<&str> {
        self.mediator.as_deref()
    }

    pub fn container_name(&self) -> &str {
        &self.container
    }

    /// Owner field → first-hop field (target for direct, mediator for through).
    pub fn local_keys(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.keys.iter().map(|(l, f)| (l.as_str(), f.as_str()))
    }

    /// Direct: target field → owner field. Through: mediator field → target field.
    pub fn foreign_keys(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_> {
        if self.relation_type.is_through() {
            Box::new(self.through_keys.iter().map(|(m, t)| (m.as_str(), t.as_str())))
        } else {
            Box::new(self.keys.iter().map(|(l, f)| (f.as_str(), l.as_str())))
        }
    }

    pub fn local_values_map(&self) -> &IndexMap<String, Value> {
        &self.local_values
    }

    pub fn foreign_values_map(&self) -> &IndexMap<String, Value> {
        &self.foreign_values
    }
}
