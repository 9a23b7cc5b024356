//! Query orchestration.
//!
//! A [`Query`] runs one entity operation (count, read, read one, insert,
//! update, write, delete, clear) through the statement builder and driver
//! held by [`Storage`]. It maps field names to columns, coerces values to the
//! declared field types and hands requested relations to the relation
//! resolver before or after the primary statement.
//!
//! # Example
//!
//! ```no_run
//! use mooring::{Entity, Order, Storage};
//!
//! # fn example(storage: &Storage) -> Result<(), mooring::StorageError> {
//! let posts = storage
//!     .read("post")
//!     .filter("published", true)
//!     .order_by("created_at", Order::Desc)
//!     .limit(10)
//!     .with("tags")
//!     .with("comments.author")
//!     .all()?;
//!
//! let post = Entity::new().with("title", "Hello").with("tags", vec![Entity::new().with("name", "rust")]);
//! let saved = storage.write("post", post).with("tags").one()?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod plan;

pub use builder::{Dialect, SeaQueryBuilder, Statement, StatementBuilder};
pub use plan::{Comparison, Condition, Logical, Order, QueryPlan, StatementKind};

use crate::entity::Entity;
use crate::error::{Result, StorageError};
use crate::model::{FieldDef, FieldType, Model};
use crate::relation::Relation;
use crate::storage::Storage;
use crate::value::Value;
use rust_decimal::prelude::ToPrimitive;

#[cfg(feature = "tracing")]
use crate::telemetry::tracing_helpers;

/// Entity operation a query performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Count,
    ReadOne,
    Read,
    Insert,
    Update,
    Write,
    Delete,
    Clear,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Count => "count",
            Operation::ReadOne => "readOne",
            Operation::Read => "read",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Write => "write",
            Operation::Delete => "delete",
            Operation::Clear => "clear",
        }
    }
}

/// Conditions, ordering, paging and nested relations.
///
/// A query keeps its own scope; relations requested with [`Scope::with`]
/// carry a scope of their own, applied to the related entity's fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    conditions: Vec<Condition>,
    orders: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    relations: Vec<(String, Scope)>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// `field = value`, joined with `AND`.
    pub fn filter(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(field, value, Comparison::Equal, Logical::And)
    }

    /// `field IN (values)`, joined with `AND`.
    pub fn filter_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions
            .push(Condition::any_of(field, values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn condition(
        mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
        comparison: Comparison,
        logical: Logical,
    ) -> Self {
        self.conditions.push(Condition::new(field, value, comparison, logical));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.orders.push((field.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Request a relation. Dotted paths (`"comments.author"`) request nested
    /// relations of the related entity.
    pub fn with(mut self, path: &str) -> Self {
        self.entry(path);
        self
    }

    /// Request a relation and configure the fetch of its related entity.
    pub fn with_scope(mut self, path: &str, configure: impl FnOnce(Scope) -> Scope) -> Self {
        let scope = self.entry(path);
        *scope = configure(std::mem::take(scope));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn orders(&self) -> &[(String, Order)] {
        &self.orders
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &Scope)> {
        self.relations.iter().map(|(name, scope)| (name.as_str(), scope))
    }

    fn entry(&mut self, path: &str) -> &mut Scope {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let idx = match self.relations.iter().position(|(name, _)| name == head) {
            Some(idx) => idx,
            None => {
                self.relations.push((head.to_string(), Scope::default()));
                self.relations.len() - 1
            }
        };
        let scope = &mut self.relations[idx].1;
        match rest {
            Some(rest) if !rest.is_empty() => scope.entry(rest),
            _ => scope,
        }
    }

    /// Merge `other` into this scope.
    fn merge(&mut self, other: &Scope) {
        self.conditions.extend(other.conditions.iter().cloned());
        self.orders.extend(other.orders.iter().cloned());
        self.limit = other.limit.or(self.limit);
        self.offset = other.offset.or(self.offset);
        self.merge_relations(other);
    }

    fn merge_relations(&mut self, other: &Scope) {
        for (name, scope) in &other.relations {
            self.entry(name).merge(scope);
        }
    }
}

/// Result of an executed query.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Count(u64),
    Entities(Vec<Entity>),
    Entity(Option<Entity>),
    Affected(u64),
}

impl Outcome {
    pub fn into_entities(self) -> Vec<Entity> {
        match self {
            Outcome::Entities(entities) => entities,
            Outcome::Entity(entity) => entity.into_iter().collect(),
            Outcome::Count(_) | Outcome::Affected(_) => Vec::new(),
        }
    }

    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Outcome::Entity(entity) => entity,
            Outcome::Entities(entities) => entities.into_iter().next(),
            Outcome::Count(_) | Outcome::Affected(_) => None,
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            Outcome::Count(n) | Outcome::Affected(n) => *n,
            Outcome::Entities(entities) => entities.len() as u64,
            Outcome::Entity(entity) => u64::from(entity.is_some()),
        }
    }
}

/// One entity operation, configured by chaining and run by [`Query::execute`].
///
/// Configuration never fails; unknown fields and relations are reported
/// when the query executes.
#[derive(Debug, Clone)]
pub struct Query<'s> {
    storage: &'s Storage,
    entity: String,
    operation: Operation,
    instance: Option<Entity>,
    fields: Vec<String>,
    constraints: Vec<Condition>,
    scope: Scope,
}

impl<'s> Query<'s> {
    pub(crate) fn new(storage: &'s Storage, entity: &str, operation: Operation, instance: Option<Entity>) -> Self {
        Query {
            storage,
            entity: entity.to_string(),
            operation,
            instance,
            fields: Vec::new(),
            constraints: Vec::new(),
            scope: Scope::default(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Restrict a read to the given fields.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.scope = self.scope.filter(field, value);
        self
    }

    pub fn filter_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.scope = self.scope.filter_in(field, values);
        self
    }

    pub fn condition(
        mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
        comparison: Comparison,
        logical: Logical,
    ) -> Self {
        self.scope = self.scope.condition(field, value, comparison, logical);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.scope = self.scope.order_by(field, order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.scope = self.scope.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.scope = self.scope.offset(offset);
        self
    }

    /// Request a relation (dotted paths request nested relations).
    pub fn with(mut self, path: &str) -> Self {
        self.scope = self.scope.with(path);
        self
    }

    pub fn with_scope(mut self, path: &str, configure: impl FnOnce(Scope) -> Scope) -> Self {
        self.scope = self.scope.with_scope(path, configure);
        self
    }

    /// Apply a relation scope: its conditions, ordering, paging and nested relations.
    pub(crate) fn apply(mut self, scope: &Scope) -> Self {
        self.scope.merge(scope);
        self
    }

    /// Carry over only the nested relations of a scope.
    pub(crate) fn nested(mut self, scope: &Scope) -> Self {
        self.scope.merge_relations(scope);
        self
    }

    /// Condition that holds regardless of `Or` conditions in the scope.
    pub(crate) fn constrain(mut self, condition: Condition) -> Self {
        self.constraints.push(condition);
        self
    }

    /// Execute and return every resulting entity.
    pub fn all(self) -> Result<Vec<Entity>> {
        Ok(self.execute()?.into_entities())
    }

    /// Execute and return the first resulting entity.
    pub fn one(self) -> Result<Option<Entity>> {
        Ok(self.execute()?.into_entity())
    }

    /// Run the operation.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotFound` for an unknown model, field or relation
    /// - `StorageError::Relation` for a container of the wrong shape
    /// - `StorageError::Query` for an instance the operation cannot handle
    /// - `StorageError::Backend` for builder and driver failures, unchanged
    pub fn execute(self) -> Result<Outcome> {
        let model = self.storage.model(&self.entity)?;

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::operation_span(self.operation.as_str(), model.entity()).entered();

        let relations = self
            .scope
            .relations
            .iter()
            .map(|(name, scope)| Relation::new(self.storage, &model, model.relation(name)?, scope.clone()))
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "{} {} with {} relation(s)",
            self.operation.as_str(),
            model.entity(),
            relations.len()
        );

        match self.operation {
            Operation::Count => self.count(&model).map(Outcome::Count),
            Operation::Read => {
                let entities = self.fetch(&model, None)?;
                self.read_relations(&relations, entities).map(Outcome::Entities)
            }
            Operation::ReadOne => {
                let entities = self.fetch(&model, Some(1))?;
                let entities = self.read_relations(&relations, entities)?;
                Ok(Outcome::Entity(entities.into_iter().next()))
            }
            Operation::Insert => {
                let entity = self.insert_row(&model, self.require_instance()?)?;
                self.write_relations(&relations, entity).map(|e| Outcome::Entity(Some(e)))
            }
            Operation::Update => {
                let entity = self.update_row(&model, self.require_instance()?)?;
                self.write_relations(&relations, entity).map(|e| Outcome::Entity(Some(e)))
            }
            Operation::Write => {
                let instance = self.require_instance()?;
                let entity = if self.exists(&model, &instance)? {
                    if model.primary_fields().is_empty() {
                        // every field is part of the identity, nothing to update
                        instance
                    } else {
                        self.update_row(&model, instance)?
                    }
                } else {
                    self.insert_row(&model, instance)?
                };
                self.write_relations(&relations, entity).map(|e| Outcome::Entity(Some(e)))
            }
            Operation::Delete => match self.instance.clone() {
                Some(instance) => {
                    let mut owners = vec![instance];
                    for relation in &relations {
                        owners = relation.delete(self.storage, owners)?;
                    }
                    let entity = owners.into_iter().next().unwrap_or_default();
                    self.delete_row(&model, &entity)?;
                    Ok(Outcome::Entity(Some(entity)))
                }
                None => {
                    if !relations.is_empty() {
                        let owners = self.fetch(&model, None)?;
                        let mut owners = self.read_relations(&relations, owners)?;
                        for relation in &relations {
                            owners = relation.delete(self.storage, owners)?;
                        }
                    }
                    let plan = self.filtered(QueryPlan::new(StatementKind::Delete, model.table()), &model)?;
                    self.storage.run(&plan).map(Outcome::Affected)
                }
            },
            Operation::Clear => {
                for relation in &relations {
                    relation.clear(self.storage)?;
                }
                let plan = QueryPlan::new(StatementKind::Clear, model.table());
                self.storage.run(&plan).map(Outcome::Affected)
            }
        }
    }

    fn require_instance(&self) -> Result<Entity> {
        self.instance.clone().ok_or_else(|| {
            StorageError::Query(format!(
                "{} on '{}' needs an entity instance",
                self.operation.as_str(),
                self.entity
            ))
        })
    }

    fn read_relations(&self, relations: &[Relation], mut entities: Vec<Entity>) -> Result<Vec<Entity>> {
        for relation in relations {
            entities = relation.read(self.storage, entities)?;
        }
        Ok(entities)
    }

    fn write_relations(&self, relations: &[Relation], entity: Entity) -> Result<Entity> {
        let mut owners = vec![entity];
        for relation in relations {
            owners = relation.write(self.storage, owners)?;
        }
        Ok(owners.into_iter().next().unwrap_or_default())
    }

    /// Map a condition to its column and coerce its values.
    fn map_condition(model: &Model, condition: &Condition) -> Result<Condition> {
        let field = model.field(condition.field())?;
        let values = if condition.comparison() == Comparison::Like {
            condition.values().to_vec()
        } else {
            condition
                .values()
                .iter()
                .map(|v| field.coerce(v.clone()))
                .collect::<Result<Vec<_>>>()?
        };
        Ok(condition.clone().with_field(field.column()).with_values(values))
    }

    /// Add constraints and scope conditions to a plan.
    fn filtered(&self, mut plan: QueryPlan, model: &Model) -> Result<QueryPlan> {
        for constraint in &self.constraints {
            plan = plan.constraint(Self::map_condition(model, constraint)?);
        }
        for condition in &self.scope.conditions {
            plan = plan.condition(Self::map_condition(model, condition)?);
        }
        Ok(plan)
    }

    fn selected_fields<'m>(&self, model: &'m Model) -> Result<Vec<&'m FieldDef>> {
        if self.fields.is_empty() {
            return Ok(model.fields().collect());
        }
        self.fields.iter().map(|name| model.field(name)).collect()
    }

    fn fetch(&self, model: &Model, limit: Option<u64>) -> Result<Vec<Entity>> {
        let mut plan = QueryPlan::new(StatementKind::Select, model.table());
        for field in self.selected_fields(model)? {
            plan = plan.field(field.column(), field.name());
        }
        plan = self.filtered(plan, model)?;
        for (name, order) in &self.scope.orders {
            plan = plan.order(model.field(name)?.column(), *order);
        }
        if let Some(limit) = limit.or(self.scope.limit) {
            plan = plan.limit(limit);
        }
        if let Some(offset) = self.scope.offset {
            plan = plan.offset(offset);
        }

        self.storage
            .fetch(&plan)?
            .into_iter()
            .map(|row| hydrate(model, row))
            .collect()
    }

    fn count(&self, model: &Model) -> Result<u64> {
        let plan = self.filtered(QueryPlan::new(StatementKind::Count, model.table()), model)?;
        let rows = self.storage.fetch(&plan)?;
        let value = rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next().map(|(_, v)| v))
            .unwrap_or(Value::Integer(0));
        let count = match FieldType::Integer.coerce(value)? {
            Value::Integer(n) => n,
            Value::Decimal(d) => d.to_i64().unwrap_or_default(),
            _ => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Fields identifying a row of `model`: the primary fields, or every
    /// field present on the instance when no primary index is declared.
    fn identity_fields<'m>(model: &'m Model, instance: &Entity) -> Vec<&'m FieldDef> {
        let primary = model.primary_fields();
        if !primary.is_empty() {
            return primary;
        }
        model.fields().filter(|f| instance.value(f.name()).is_some()).collect()
    }

    /// Equality conditions on the instance's identity; `None` if a primary
    /// value is missing.
    fn identity_conditions(model: &Model, instance: &Entity) -> Result<Option<Vec<Condition>>> {
        let fields = Self::identity_fields(model, instance);
        if fields.is_empty() {
            return Ok(None);
        }
        let has_primary = !model.primary_fields().is_empty();
        let mut conditions = Vec::with_capacity(fields.len());
        for field in fields {
            let value = field.coerce(instance.value_or_null(field.name()))?;
            if value.is_null() && has_primary {
                return Ok(None);
            }
            conditions.push(Condition::eq(field.column(), value));
        }
        Ok(Some(conditions))
    }

    fn exists(&self, model: &Model, instance: &Entity) -> Result<bool> {
        let Some(conditions) = Self::identity_conditions(model, instance)? else {
            return Ok(false);
        };
        let plan = conditions
            .into_iter()
            .fold(QueryPlan::new(StatementKind::Count, model.table()), QueryPlan::constraint);
        let rows = self.storage.fetch(&plan)?;
        let count = rows
            .first()
            .and_then(|row| row.values().next())
            .cloned()
            .map(|v| FieldType::Integer.coerce(v))
            .transpose()?
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok(count > 0)
    }

    fn insert_row(&self, model: &Model, mut instance: Entity) -> Result<Entity> {
        let mut plan = QueryPlan::new(StatementKind::Insert, model.table());
        let mut generated = Vec::new();

        for field in model.fields() {
            let value = match instance.value(field.name()) {
                Some(value) => field.coerce(value.clone())?,
                None if instance.has(field.name()) => {
                    return Err(StorageError::Query(format!(
                        "field '{}' of '{}' holds related data, not a value",
                        field.name(),
                        model.entity()
                    )))
                }
                None => {
                    if field.is_auto_increment() {
                        generated.push(field);
                    }
                    continue;
                }
            };
            if value.is_null() && field.is_auto_increment() {
                generated.push(field);
                continue;
            }
            plan = plan.value(field.column(), value.clone());
            instance.set(field.name(), value);
        }

        if generated.is_empty() || !self.storage.supports_returning() {
            self.storage.run(&plan)?;
            return Ok(instance);
        }

        for field in &generated {
            plan = plan.returning(field.column());
        }
        if let Some(row) = self.storage.fetch(&plan)?.into_iter().next() {
            for (column, value) in row {
                if let Some(field) = model.column_field(&column) {
                    instance.set(field.name(), field.coerce(value)?);
                }
            }
        }
        Ok(instance)
    }

    fn update_row(&self, model: &Model, mut instance: Entity) -> Result<Entity> {
        let primary = model.primary_fields();
        if primary.is_empty() {
            return Err(StorageError::Query(format!(
                "cannot update '{}' without a primary index",
                model.entity()
            )));
        }

        let mut plan = QueryPlan::new(StatementKind::Update, model.table());
        for field in &primary {
            let value = field.coerce(instance.value_or_null(field.name()))?;
            if value.is_null() {
                return Err(StorageError::Query(format!(
                    "cannot update '{}' without a value for primary field '{}'",
                    model.entity(),
                    field.name()
                )));
            }
            plan = plan.constraint(Condition::eq(field.column(), value));
        }

        for field in model.fields() {
            if primary.iter().any(|p| p.name() == field.name()) {
                continue;
            }
            if let Some(value) = instance.value(field.name()) {
                let value = field.coerce(value.clone())?;
                plan = plan.value(field.column(), value.clone());
                instance.set(field.name(), value);
            }
        }

        if plan.values().is_empty() {
            log::trace!("update of {} has no fields besides its key, skipped", model.entity());
            return Ok(instance);
        }
        self.storage.run(&plan)?;
        Ok(instance)
    }

    fn delete_row(&self, model: &Model, instance: &Entity) -> Result<u64> {
        let conditions = Self::identity_conditions(model, instance)?.ok_or_else(|| {
            StorageError::Query(format!(
                "cannot delete '{}' without its key values",
                model.entity()
            ))
        })?;
        let plan = conditions
            .into_iter()
            .fold(QueryPlan::new(StatementKind::Delete, model.table()), QueryPlan::constraint);
        self.storage.run(&plan)
    }
}

/// Turn a fetched row into an entity keyed by field name.
pub(crate) fn hydrate(model: &Model, row: crate::driver::Row) -> Result<Entity> {
    let mut entity = Entity::new();
    for (key, value) in row {
        match model.column_field(&key) {
            Some(field) => entity.set(field.name(), field.coerce(value)?),
            None => entity.set(key, value),
        }
    }
    Ok(entity)
}
