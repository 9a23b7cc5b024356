//! Backend-neutral statement descriptions.
//!
//! A [`QueryPlan`] is what the orchestrator hands to a
//! [`StatementBuilder`](super::builder::StatementBuilder): table, columns,
//! values and condition triples, already mapped to column names. It carries
//! no relation knowledge.

use crate::value::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Count,
    Insert,
    Update,
    Delete,
    /// Unconditional removal of every row.
    Clear,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Count => "count",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Clear => "clear",
        }
    }

    /// Whether the statement produces rows rather than an affected count.
    pub fn is_read(&self) -> bool {
        matches!(self, StatementKind::Select | StatementKind::Count)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Like,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Logical {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// One `(field, value, comparator)` triple and the operator joining it to
/// the previous condition.
///
/// Several values compare the field against each of them: `IN` / `NOT IN`
/// for equality, an `OR` group otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: String,
    values: Vec<Value>,
    comparison: Comparison,
    logical: Logical,
}

impl Condition {
    pub fn new(field: impl Into<String>, value: impl Into<Value>, comparison: Comparison, logical: Logical) -> Self {
        Condition {
            field: field.into(),
            values: vec![value.into()],
            comparison,
            logical,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, value, Comparison::Equal, Logical::And)
    }

    /// `field IN (values)`.
    pub fn any_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Condition {
            field: field.into(),
            values,
            comparison: Comparison::Equal,
            logical: Logical::And,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn logical(&self) -> Logical {
        self.logical
    }

    pub(crate) fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    pub(crate) fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }
}

/// Description of a single statement against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    kind: StatementKind,
    table: String,
    fields: Vec<(String, String)>,
    values: Vec<(String, Value)>,
    constraints: Vec<Condition>,
    conditions: Vec<Condition>,
    orders: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    returning: Vec<String>,
}

impl QueryPlan {
    pub fn new(kind: StatementKind, table: impl Into<String>) -> Self {
        QueryPlan {
            kind,
            table: table.into(),
            fields: Vec::new(),
            values: Vec::new(),
            constraints: Vec::new(),
            conditions: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            returning: Vec::new(),
        }
    }

    /// Select `column` under the name `alias`.
    pub fn field(mut self, column: impl Into<String>, alias: impl Into<String>) -> Self {
        self.fields.push((column.into(), alias.into()));
        self
    }

    pub fn value(mut self, column: impl Into<String>, value: Value) -> Self {
        self.values.push((column.into(), value));
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Condition that always holds in addition to the condition tree,
    /// whatever `Or` operators the tree contains.
    pub fn constraint(mut self, condition: Condition) -> Self {
        self.constraints.push(condition);
        self
    }

    pub fn order(mut self, column: impl Into<String>, order: Order) -> Self {
        self.orders.push((column.into(), order));
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

    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning.push(column.into());
        self
    }

    /// Drop everything but the kind and table.
    pub fn reset(self) -> Self {
        QueryPlan::new(self.kind, self.table)
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    pub fn constraints(&self) -> &[Condition] {
        &self.constraints
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn orders(&self) -> &[(String, Order)] {
        &self.orders
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    pub fn returning_columns(&self) -> &[String] {
        &self.returning
    }
}
