//! Statement execution.
//!
//! A [`Driver`] runs rendered statements and owns the transaction boundary.
//! Reads return [`Row`]s keyed by the selected alias; writes return the
//! number of affected rows.

#[cfg(feature = "mock")]
pub mod mock;
#[cfg(feature = "postgres")]
pub mod params;
#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "mock")]
pub use mock::{MockDriver, MockResult};
#[cfg(feature = "postgres")]
pub use postgres::{IsolationLevel, PostgresDriver};

use crate::error::BackendError;
use crate::query::builder::Statement;
use crate::value::Value;
use indexmap::IndexMap;
use std::rc::Rc;
use std::sync::Arc;

/// One fetched row: column alias to value, in select order.
pub type Row = IndexMap<String, Value>;

/// Executes statements against a storage backend.
///
/// Transactions nest: starting a transaction while one is open creates an
/// inner boundary that commits or rolls back on its own.
pub trait Driver {
    /// Run a statement that produces rows.
    fn query(&self, statement: &Statement) -> Result<Vec<Row>, BackendError>;

    /// Run a statement and return the number of affected rows.
    fn execute(&self, statement: &Statement) -> Result<u64, BackendError>;

    fn transaction_start(&self) -> Result<(), BackendError>;

    fn transaction_commit(&self) -> Result<(), BackendError>;

    fn transaction_rollback(&self) -> Result<(), BackendError>;

    /// Whether a transaction is open.
    fn transaction_check(&self) -> bool;
}

macro_rules! forward_driver {
    ($($ptr:ty),*) => {
        $(
            impl<D: Driver + ?Sized> Driver for $ptr {
                fn query(&self, statement: &Statement) -> Result<Vec<Row>, BackendError> {
                    (**self).query(statement)
                }

                fn execute(&self, statement: &Statement) -> Result<u64, BackendError> {
                    (**self).execute(statement)
                }

                fn transaction_start(&self) -> Result<(), BackendError> {
                    (**self).transaction_start()
                }

                fn transaction_commit(&self) -> Result<(), BackendError> {
                    (**self).transaction_commit()
                }

                fn transaction_rollback(&self) -> Result<(), BackendError> {
                    (**self).transaction_rollback()
                }

                fn transaction_check(&self) -> bool {
                    (**self).transaction_check()
                }
            }
        )*
    };
}

forward_driver!(&D, Box<D>, Rc<D>, Arc<D>);
