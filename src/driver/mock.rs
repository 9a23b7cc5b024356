//! In-memory driver that records statements and replays canned results.
//!
//! Results are queued per `(statement kind, table)`, so a test only has to
//! describe the tables it cares about:
//!
//! ```no_run
//! use mooring::driver::{mock, MockDriver};
//! use mooring::query::plan::StatementKind;
//!
//! let driver = MockDriver::new()
//!     .append_rows(StatementKind::Select, "post_tag", vec![mock::row([("post_id", 1), ("tag_id", 7)])])
//!     .append_count("posts", 1);
//! ```
//!
//! Unqueued reads return no rows (a count of 0 for counts) and unqueued
//! writes report one affected row.

use super::{Driver, Row};
use crate::error::BackendError;
use crate::query::builder::Statement;
use crate::query::plan::StatementKind;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

/// A canned driver response.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResult {
    Rows(Vec<Row>),
    Affected(u64),
    Error(String),
}

/// Transaction boundary recorded by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEvent {
    Start,
    Commit,
    Rollback,
}

/// Build a row from `(column, value)` pairs.
pub fn row<I, K, V>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

#[derive(Debug, Default)]
pub struct MockDriver {
    results: RefCell<HashMap<(StatementKind, String), VecDeque<MockResult>>>,
    statements: RefCell<Vec<Statement>>,
    transactions: RefCell<Vec<TransactionEvent>>,
    depth: Cell<u32>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, kind: StatementKind, table: &str, result: MockResult) {
        self.results
            .borrow_mut()
            .entry((kind, table.to_string()))
            .or_default()
            .push_back(result);
    }

    pub fn append_rows(self, kind: StatementKind, table: &str, rows: Vec<Row>) -> Self {
        self.push(kind, table, MockResult::Rows(rows));
        self
    }

    pub fn append_count(self, table: &str, count: i64) -> Self {
        self.push(StatementKind::Count, table, MockResult::Rows(vec![row([("count", count)])]));
        self
    }

    pub fn append_affected(self, kind: StatementKind, table: &str, affected: u64) -> Self {
        self.push(kind, table, MockResult::Affected(affected));
        self
    }

    pub fn append_error(self, kind: StatementKind, table: &str, message: impl Into<String>) -> Self {
        self.push(kind, table, MockResult::Error(message.into()));
        self
    }

    /// Queue a result on a driver that is already shared.
    pub fn queue(&self, kind: StatementKind, table: &str, result: MockResult) {
        self.push(kind, table, result);
    }

    /// Every statement received so far, in order.
    pub fn statements(&self) -> Vec<Statement> {
        self.statements.borrow().clone()
    }

    /// Statements of `kind` against `table`.
    pub fn statements_for(&self, kind: StatementKind, table: &str) -> Vec<Statement> {
        self.statements
            .borrow()
            .iter()
            .filter(|s| s.kind == kind && s.table == table)
            .cloned()
            .collect()
    }

    pub fn count_of(&self, kind: StatementKind, table: &str) -> usize {
        self.statements
            .borrow()
            .iter()
            .filter(|s| s.kind == kind && s.table == table)
            .count()
    }

    /// Statements touching `table`, of any kind.
    pub fn count_on(&self, table: &str) -> usize {
        self.statements.borrow().iter().filter(|s| s.table == table).count()
    }

    pub fn transaction_log(&self) -> Vec<TransactionEvent> {
        self.transactions.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.statements.borrow_mut().clear();
        self.transactions.borrow_mut().clear();
    }

    fn next(&self, statement: &Statement) -> Option<MockResult> {
        self.statements.borrow_mut().push(statement.clone());
        self.results
            .borrow_mut()
            .get_mut(&(statement.kind, statement.table.clone()))
            .and_then(VecDeque::pop_front)
    }
}

impl Driver for MockDriver {
    fn query(&self, statement: &Statement) -> Result<Vec<Row>, BackendError> {
        log::trace!("mock query on {}: {}", statement.table, statement.sql);
        match self.next(statement) {
            Some(MockResult::Rows(rows)) => Ok(rows),
            Some(MockResult::Error(message)) => Err(BackendError::Mock(message)),
            Some(MockResult::Affected(_)) => Err(BackendError::Mock(format!(
                "{} on '{}' expected rows, an affected count was queued",
                statement.kind, statement.table
            ))),
            None if statement.kind == StatementKind::Count => Ok(vec![row([("count", 0)])]),
            None => Ok(Vec::new()),
        }
    }

    fn execute(&self, statement: &Statement) -> Result<u64, BackendError> {
        log::trace!("mock execute on {}: {}", statement.table, statement.sql);
        match self.next(statement) {
            Some(MockResult::Affected(n)) => Ok(n),
            Some(MockResult::Rows(rows)) => Ok(rows.len() as u64),
            Some(MockResult::Error(message)) => Err(BackendError::Mock(message)),
            None => Ok(1),
        }
    }

    fn transaction_start(&self) -> Result<(), BackendError> {
        self.depth.set(self.depth.get() + 1);
        self.transactions.borrow_mut().push(TransactionEvent::Start);
        Ok(())
    }

    fn transaction_commit(&self) -> Result<(), BackendError> {
        if self.depth.get() == 0 {
            return Err(BackendError::Transaction("no active transaction to commit".to_string()));
        }
        self.depth.set(self.depth.get() - 1);
        self.transactions.borrow_mut().push(TransactionEvent::Commit);
        Ok(())
    }

    fn transaction_rollback(&self) -> Result<(), BackendError> {
        if self.depth.get() == 0 {
            return Err(BackendError::Transaction("no active transaction to roll back".to_string()));
        }
        self.depth.set(self.depth.get() - 1);
        self.transactions.borrow_mut().push(TransactionEvent::Rollback);
        Ok(())
    }

    fn transaction_check(&self) -> bool {
        self.depth.get() > 0
    }
}
