//! # Mooring
//!
//! Entity-relational mapping over a pluggable statement builder and driver.
//!
//! Models describe tables, fields, indexes and relations. A [`Storage`]
//! holds the registered models together with a [`StatementBuilder`] and a
//! [`Driver`], and hands out [`Query`] values for entity operations.
//! Relations requested on a query are resolved in batches: one statement
//! per direct relation, two per through relation, whatever the number of
//! owner entities.
//!
//! The PostgreSQL driver runs on `may_postgres` (feature `postgres`); the
//! in-memory [`MockDriver`](driver::MockDriver) (feature `mock`) records
//! statements for tests.

pub mod config;
pub mod driver;
pub mod entity;
pub mod error;
pub mod model;
pub mod query;
pub mod relation;
pub mod storage;
pub mod telemetry;
pub mod value;

pub use config::StorageConfig;
pub use driver::{Driver, Row};
pub use entity::{Entity, Property};
pub use error::{BackendError, Lookup, Result, StorageError};
pub use model::{FieldDef, FieldType, IndexDef, Model, ModelBag, RelationDef, RelationType};
pub use query::{
    Comparison, Dialect, Logical, Operation, Order, Outcome, Query, Scope, SeaQueryBuilder, StatementBuilder,
};
pub use relation::{Identity, Relation};
pub use storage::Storage;
pub use value::Value;
