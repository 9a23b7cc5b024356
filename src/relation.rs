//! Relation resolution.
//!
//! A [`Relation`] pairs a [`RelationDef`] with the models it connects and
//! the scope requested for the related entity. Reads are batched: direct
//! relations issue one statement for any number of owners, through
//! relations issue two (mediator, then target). Rows fetched by different
//! statements are correlated in memory with [`Identity`] keys.
//!
//! Every operation takes the owner collection by value and returns the
//! collection with containers filled in (reads) or replaced by the written
//! data (writes).

pub mod direct;
pub mod identity;
pub mod through;

pub use identity::Identity;

use crate::entity::{Entity, Property};
use crate::error::{Result, StorageError};
use crate::model::{FieldDef, Model, RelationDef, RelationType};
use crate::query::{Condition, Scope};
use crate::storage::Storage;
use crate::value::Value;
use indexmap::IndexSet;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use crate::telemetry::tracing_helpers;

/// A relation of one model, resolved against the registered models.
#[derive(Debug, Clone)]
pub struct Relation {
    definition: RelationDef,
    target: Arc<Model>,
    mediator: Option<Arc<Model>>,
    scope: Scope,
    /// Owner fields of the local keys.
    owner_fields: Vec<String>,
    /// First-hop fields of the local keys: target fields for direct
    /// relations, mediator fields for through relations.
    hop_fields: Vec<String>,
    /// Mediator side of the target keys (through relations only).
    link_fields: Vec<String>,
    /// Target side of the target keys (through relations only).
    target_fields: Vec<String>,
    local_values: Vec<(FieldDef, Value)>,
    foreign_values: Vec<(String, Value)>,
}

fn missing(model: &Model, field: &str, definition: &RelationDef, side: &str) -> StorageError {
    StorageError::Definition(format!(
        "relation '{}' uses {side} field '{field}' unknown to entity '{}'",
        definition.name(),
        model.entity()
    ))
}

fn check_fields<'a>(
    model: &Model,
    fields: impl IntoIterator<Item = &'a String>,
    definition: &RelationDef,
    side: &str,
) -> Result<()> {
    for field in fields {
        if !model.has_field(field) {
            return Err(missing(model, field, definition, side));
        }
    }
    Ok(())
}

impl Relation {
    /// Resolve `definition` of `owner` against the models of `storage`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the target or mediator model is not registered and
    /// `Definition` if a key or fixed value names a field the related model
    /// does not have.
    pub fn new(storage: &Storage, owner: &Model, definition: &RelationDef, scope: Scope) -> Result<Self> {
        let target = storage.model(definition.entity())?;
        let mediator = match definition.mediator() {
            Some(mediator) => Some(storage.model(mediator)?),
            None => None,
        };

        let (owner_fields, hop_fields): (Vec<String>, Vec<String>) = definition
            .local_keys()
            .map(|(local, foreign)| (local.to_string(), foreign.to_string()))
            .unzip();
        let (link_fields, target_fields): (Vec<String>, Vec<String>) = if definition.relation_type().is_through() {
            definition
                .foreign_keys()
                .map(|(link, target)| (link.to_string(), target.to_string()))
                .unzip()
        } else {
            (Vec::new(), Vec::new())
        };

        let hop = mediator.as_deref().unwrap_or(&target);
        check_fields(hop, &hop_fields, definition, "key")?;
        check_fields(hop, &link_fields, definition, "target key")?;
        check_fields(&target, &target_fields, definition, "target key")?;
        check_fields(hop, definition.foreign_values_map().keys(), definition, "fixed value")?;

        let local_values = definition
            .local_values_map()
            .iter()
            .map(|(name, value)| {
                let field = owner.field(name)?;
                Ok((field.clone(), field.coerce(value.clone())?))
            })
            .collect::<Result<Vec<_>>>()?;
        let foreign_values = definition
            .foreign_values_map()
            .iter()
            .map(|(name, value)| Ok((name.clone(), hop.field(name)?.coerce(value.clone())?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Relation {
            definition: definition.clone(),
            target,
            mediator,
            scope,
            owner_fields,
            hop_fields,
            link_fields,
            target_fields,
            local_values,
            foreign_values,
        })
    }

    pub fn definition(&self) -> &RelationDef {
        &self.definition
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn relation_type(&self) -> RelationType {
        self.definition.relation_type()
    }

    pub fn target(&self) -> &Model {
        &self.target
    }

    pub fn mediator(&self) -> Option<&Model> {
        self.mediator.as_deref()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Fill each owner's container with its related data.
    pub fn read(&self, storage: &Storage, owners: Vec<Entity>) -> Result<Vec<Entity>> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::relation_span(self.name(), "read", owners.len()).entered();

        log::trace!("read {} for {} owner(s)", self.name(), owners.len());
        match self.relation_type() {
            RelationType::One | RelationType::Many => direct::read(self, storage, owners),
            RelationType::OneThrough | RelationType::ManyThrough => through::read(self, storage, owners),
        }
    }

    /// Persist the related data held in each owner's container and prune
    /// the rows or links it no longer holds.
    pub fn write(&self, storage: &Storage, owners: Vec<Entity>) -> Result<Vec<Entity>> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::relation_span(self.name(), "write", owners.len()).entered();

        log::trace!("write {} for {} owner(s)", self.name(), owners.len());
        match self.relation_type() {
            RelationType::One | RelationType::Many => direct::write(self, storage, owners),
            RelationType::OneThrough | RelationType::ManyThrough => through::write(self, storage, owners),
        }
    }

    /// Remove the related rows (direct) or links (through) of each owner.
    pub fn delete(&self, storage: &Storage, owners: Vec<Entity>) -> Result<Vec<Entity>> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::relation_span(self.name(), "delete", owners.len()).entered();

        log::trace!("delete {} for {} owner(s)", self.name(), owners.len());
        match self.relation_type() {
            RelationType::One | RelationType::Many => direct::delete(self, storage, owners),
            RelationType::OneThrough | RelationType::ManyThrough => through::delete(self, storage, owners),
        }
    }

    /// Empty the target table (direct) or the mediator table (through).
    pub fn clear(&self, storage: &Storage) -> Result<u64> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::relation_span(self.name(), "clear", 0).entered();

        let entity = self.first_hop().entity();
        log::trace!("clear {} on {}", self.name(), entity);
        storage.clear(entity).execute().map(|outcome| outcome.count())
    }

    /// Model of the first hop: the mediator of a through relation, the
    /// target otherwise.
    fn first_hop(&self) -> &Model {
        self.mediator.as_deref().unwrap_or(&self.target)
    }

    fn is_single(&self) -> bool {
        self.relation_type().is_single()
    }

    /// Whether a first-hop row carries the relation's foreign values. A
    /// field the row does not hold is not checked.
    fn holds_foreign_values(&self, row: &Entity) -> bool {
        self.foreign_values
            .iter()
            .all(|(field, expected)| row.value(field).map_or(true, |value| value == expected))
    }

    /// Whether the owner's fields match the relation's local values.
    fn participates(&self, owner: &Entity) -> bool {
        self.local_values.iter().all(|(field, expected)| {
            owner
                .value(field.name())
                .and_then(|value| field.coerce(value.clone()).ok())
                .is_some_and(|value| &value == expected)
        })
    }

    /// Owner key, in first-hop field order and types. `None` if the owner
    /// does not take part or lacks a key value.
    fn owner_key(&self, owner: &Entity) -> Result<Option<Identity>> {
        if !self.participates(owner) {
            return Ok(None);
        }
        match Identity::of(owner, self.owner_fields.iter().map(String::as_str)) {
            Some(key) => coerce_identity(self.first_hop(), &self.hop_fields, key).map(Some),
            None => Ok(None),
        }
    }

    /// Related data held in the owner's container.
    ///
    /// `None` when the container is absent. An explicit null or an empty
    /// collection yields no items.
    fn container_items(&self, owner: &Entity) -> Result<Option<Vec<Entity>>> {
        let container = self.definition.container_name();
        let shape = |found: &str| {
            StorageError::relation(
                self.name(),
                format!(
                    "container '{container}' holds {found}, expected {}",
                    if self.is_single() { "an entity or null" } else { "a collection or null" }
                ),
            )
        };

        match owner.get(container) {
            None => Ok(None),
            Some(Property::Value(value)) if value.is_null() => Ok(Some(Vec::new())),
            Some(Property::Value(_)) => Err(shape("a scalar value")),
            Some(Property::Entity(entity)) if self.is_single() => Ok(Some(vec![(**entity).clone()])),
            Some(Property::Entity(_)) => Err(shape("a single entity")),
            Some(Property::Collection(items)) if !self.is_single() => Ok(Some(items.clone())),
            Some(Property::Collection(_)) => Err(shape("a collection")),
        }
    }

    /// Store `items` into the owner's container according to cardinality.
    fn fill(&self, owner: &mut Entity, items: Vec<Entity>) {
        let container = self.definition.container_name();
        if self.is_single() {
            match items.into_iter().next() {
                Some(item) => owner.set(container, item),
                None => owner.set(container, Value::Null),
            }
        } else {
            owner.set(container, items);
        }
    }

    /// Fetch rows of `model` whose `fields` match one of `keys`.
    ///
    /// Key columns are constrained position by position with `IN`, so a
    /// composite key may over-fetch; callers correlate rows by identity.
    fn fetch(
        &self,
        storage: &Storage,
        model: &Model,
        fields: &[String],
        keys: &IndexSet<Identity>,
        fixed: bool,
        scope: Option<&Scope>,
    ) -> Result<Vec<Entity>> {
        let mut query = storage.read(model.entity());
        for condition in key_conditions(fields, keys) {
            query = query.constrain(condition);
        }
        if fixed {
            for (field, value) in &self.foreign_values {
                query = query.constrain(Condition::eq(field.clone(), value.clone()));
            }
        }
        if let Some(scope) = scope {
            query = query.apply(scope);
        }
        let mut rows = query.all()?;
        if fixed {
            // rows of another relation sharing the table are never ours
            rows.retain(|row| self.holds_foreign_values(row));
        }
        log::trace!(
            "{}: {} key(s) on {} matched {} row(s)",
            self.name(),
            keys.len(),
            model.entity(),
            rows.len()
        );
        Ok(rows)
    }
}

/// One `IN` condition per key position.
fn key_conditions(fields: &[String], keys: &IndexSet<Identity>) -> Vec<Condition> {
    fields
        .iter()
        .enumerate()
        .map(|(position, field)| {
            let mut values: IndexSet<Value> = IndexSet::new();
            for key in keys {
                if let Some(value) = key.values().get(position) {
                    values.insert(value.clone());
                }
            }
            Condition::any_of(field.clone(), values.into_iter().collect())
        })
        .collect()
}

/// Coerce each value of `identity` to the type of the matching field.
fn coerce_identity(model: &Model, fields: &[String], identity: Identity) -> Result<Identity> {
    fields
        .iter()
        .zip(identity.into_values())
        .map(|(field, value)| model.field(field)?.coerce(value))
        .collect::<Result<Vec<_>>>()
        .map(Identity::new)
}

/// Whether `row` is the row `written` was stored as: same primary values,
/// or the same value for every field `written` holds when the model has no
/// primary index.
fn same_row(model: &Model, written: &Entity, row: &Entity) -> bool {
    let primary = model.primary_fields();
    if primary.is_empty() {
        return model
            .fields()
            .filter_map(|f| written.value(f.name()).map(|v| (f.name(), v)))
            .all(|(name, value)| row.value(name) == Some(value));
    }
    primary
        .iter()
        .all(|f| written.value(f.name()).is_some_and(|v| row.value(f.name()) == Some(v)))
}
