//! Statement construction.
//!
//! [`StatementBuilder`] turns a [`QueryPlan`] into backend SQL plus bound
//! parameters. [`SeaQueryBuilder`] is the implementation shipped with the
//! crate; it renders through `sea-query` for Postgres, MySQL and SQLite.

use super::plan::{Comparison, Condition, Logical, Order, QueryPlan, StatementKind};
use crate::error::BackendError;
use crate::value::Value;
use sea_query::{
    Asterisk, DynIden, Expr, ExprTrait, Func, MysqlQueryBuilder, PostgresQueryBuilder, Query,
    QueryStatementWriter, SqliteQueryBuilder, Values,
};
use serde::Deserialize;

/// SQL dialect a builder renders for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Mysql,
    Sqlite,
}

impl Dialect {
    pub fn supports_returning(&self) -> bool {
        !matches!(self, Dialect::Mysql)
    }
}

/// A rendered statement ready for a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub table: String,
    pub sql: String,
    pub values: Values,
}

impl Statement {
    pub fn parameters(&self) -> &[sea_query::Value] {
        &self.values.0
    }
}

/// Pure statement construction; knows nothing about relations.
pub trait StatementBuilder {
    /// Render `plan` into a statement.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Build` when the plan cannot be expressed, e.g.
    /// an ordering comparison against `NULL`.
    fn build(&self, plan: &QueryPlan) -> Result<Statement, BackendError>;

    /// Whether inserts can return generated columns.
    fn supports_returning(&self) -> bool {
        false
    }
}

impl<B: StatementBuilder + ?Sized> StatementBuilder for Box<B> {
    fn build(&self, plan: &QueryPlan) -> Result<Statement, BackendError> {
        (**self).build(plan)
    }

    fn supports_returning(&self) -> bool {
        (**self).supports_returning()
    }
}

/// `sea-query` backed builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeaQueryBuilder {
    dialect: Dialect,
}

fn iden(name: &str) -> DynIden {
    DynIden::from(name.to_string())
}

fn compare(column: &str, comparison: Comparison, value: &Value) -> Result<Expr, BackendError> {
    let col = Expr::col(iden(column));
    if value.is_null() {
        return match comparison {
            Comparison::Equal => Ok(col.is_null()),
            Comparison::NotEqual => Ok(col.is_not_null()),
            _ => Err(BackendError::Build(format!(
                "cannot compare '{column}' with NULL using {comparison:?}"
            ))),
        };
    }

    let bound = sea_query::Value::from(value.clone());
    Ok(match comparison {
        Comparison::Equal => col.eq(bound),
        Comparison::NotEqual => col.ne(bound),
        Comparison::Less => col.lt(bound),
        Comparison::Greater => col.gt(bound),
        Comparison::LessEqual => col.lte(bound),
        Comparison::GreaterEqual => col.gte(bound),
        Comparison::Like => col.like(value.to_string()),
    })
}

fn condition_expr(condition: &Condition) -> Result<sea_query::Condition, BackendError> {
    let column = condition.field();
    let comparison = condition.comparison();

    match condition.values() {
        // nothing can match an empty set
        [] => Ok(sea_query::Condition::all().add(Expr::cust(match comparison {
            Comparison::NotEqual => "1 = 1",
            _ => "1 = 0",
        }))),
        [single] => Ok(sea_query::Condition::all().add(compare(column, comparison, single)?)),
        many if matches!(comparison, Comparison::Equal | Comparison::NotEqual)
            && many.iter().all(|v| !v.is_null()) =>
        {
            let bound: Vec<sea_query::Value> = many.iter().cloned().map(sea_query::Value::from).collect();
            let col = Expr::col(iden(column));
            Ok(sea_query::Condition::all().add(if comparison == Comparison::Equal {
                col.is_in(bound)
            } else {
                col.is_not_in(bound)
            }))
        }
        many => {
            let mut group = if comparison == Comparison::NotEqual {
                sea_query::Condition::all()
            } else {
                sea_query::Condition::any()
            };
            for value in many {
                group = group.add(compare(column, comparison, value)?);
            }
            Ok(group)
        }
    }
}

/// Fold conditions into one tree: `AND` binds tighter than `OR`. Constraints
/// are joined to the whole tree with `AND`.
fn where_clause(plan: &QueryPlan) -> Result<Option<sea_query::Condition>, BackendError> {
    let mut groups: Vec<sea_query::Condition> = Vec::new();
    let mut current = sea_query::Condition::all();
    let mut current_len = 0usize;
    for condition in plan.conditions() {
        if condition.logical() == Logical::Or && current_len > 0 {
            groups.push(std::mem::replace(&mut current, sea_query::Condition::all()));
            current_len = 0;
        }
        current = current.add(condition_expr(condition)?);
        current_len += 1;
    }
    if current_len > 0 {
        groups.push(current);
    }

    let tree = match groups.len() {
        0 => None,
        1 => groups.pop(),
        _ => Some(groups.into_iter().fold(sea_query::Condition::any(), |any, group| any.add(group))),
    };

    if plan.constraints().is_empty() {
        return Ok(tree);
    }
    let mut all = sea_query::Condition::all();
    for constraint in plan.constraints() {
        all = all.add(condition_expr(constraint)?);
    }
    if let Some(tree) = tree {
        all = all.add(tree);
    }
    Ok(Some(all))
}

fn order(order: Order) -> sea_query::Order {
    match order {
        Order::Asc => sea_query::Order::Asc,
        Order::Desc => sea_query::Order::Desc,
    }
}

impl SeaQueryBuilder {
    pub fn new(dialect: Dialect) -> Self {
        SeaQueryBuilder { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn render<S: QueryStatementWriter>(&self, statement: &S) -> (String, Values) {
        match self.dialect {
            Dialect::Postgres => statement.build(PostgresQueryBuilder),
            Dialect::Mysql => statement.build(MysqlQueryBuilder),
            Dialect::Sqlite => statement.build(SqliteQueryBuilder),
        }
    }

    fn select(&self, plan: &QueryPlan) -> Result<(String, Values), BackendError> {
        let mut query = Query::select();
        query.from(iden(plan.table()));

        if plan.kind() == StatementKind::Count {
            query.expr_as(Func::count(Expr::col(Asterisk)), iden("count"));
        } else if plan.fields().is_empty() {
            query.column(Asterisk);
        } else {
            for (column, alias) in plan.fields() {
                query.expr_as(Expr::col(iden(column)), iden(alias));
            }
        }

        if let Some(condition) = where_clause(plan)? {
            query.cond_where(condition);
        }
        if plan.kind() == StatementKind::Select {
            for (column, direction) in plan.orders() {
                query.order_by(iden(column), order(*direction));
            }
            if let Some(limit) = plan.limit_value() {
                query.limit(limit);
            }
            if let Some(offset) = plan.offset_value() {
                query.offset(offset);
            }
        }
        Ok(self.render(&query))
    }

    fn insert(&self, plan: &QueryPlan) -> Result<(String, Values), BackendError> {
        let mut query = Query::insert();
        query.into_table(iden(plan.table()));

        if plan.values().is_empty() {
            query.or_default_values();
        } else {
            query.columns(plan.values().iter().map(|(column, _)| iden(column)));
            query
                .values(plan.values().iter().map(|(_, value)| Expr::val(value.clone())))
                .map_err(|e| BackendError::Build(e.to_string()))?;
        }

        if !plan.returning_columns().is_empty() && self.dialect.supports_returning() {
            query.returning(Query::returning().columns(plan.returning_columns().iter().map(|c| iden(c))));
        }
        Ok(self.render(&query))
    }

    fn update(&self, plan: &QueryPlan) -> Result<(String, Values), BackendError> {
        if plan.values().is_empty() {
            return Err(BackendError::Build(format!(
                "update of '{}' has no values",
                plan.table()
            )));
        }

        let mut query = Query::update();
        query.table(iden(plan.table()));
        for (column, value) in plan.values() {
            query.value(iden(column), Expr::val(value.clone()));
        }
        if let Some(condition) = where_clause(plan)? {
            query.cond_where(condition);
        }
        Ok(self.render(&query))
    }

    fn delete(&self, plan: &QueryPlan) -> Result<(String, Values), BackendError> {
        let mut query = Query::delete();
        query.from_table(iden(plan.table()));
        if plan.kind() == StatementKind::Delete {
            if let Some(condition) = where_clause(plan)? {
                query.cond_where(condition);
            }
        }
        Ok(self.render(&query))
    }
}

impl StatementBuilder for SeaQueryBuilder {
    fn build(&self, plan: &QueryPlan) -> Result<Statement, BackendError> {
        let (sql, values) = match plan.kind() {
            StatementKind::Select | StatementKind::Count => self.select(plan)?,
            StatementKind::Insert => self.insert(plan)?,
            StatementKind::Update => self.update(plan)?,
            StatementKind::Delete | StatementKind::Clear => self.delete(plan)?,
        };

        Ok(Statement {
            kind: plan.kind(),
            table: plan.table().to_string(),
            sql,
            values,
        })
    }

    fn supports_returning(&self) -> bool {
        self.dialect.supports_returning()
    }
}
