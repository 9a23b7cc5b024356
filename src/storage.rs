//! Entry point: registered models plus the builder and driver that run
//! their statements.
//!
//! # Example
//!
//! ```no_run
//! use mooring::driver::MockDriver;
//! use mooring::model::{FieldDef, FieldType, IndexDef, Model};
//! use mooring::query::SeaQueryBuilder;
//! use mooring::{Entity, Storage};
//!
//! # fn example() -> Result<(), mooring::StorageError> {
//! let post = Model::new(
//!     "post",
//!     "posts",
//!     vec![FieldDef::new("id", FieldType::Integer), FieldDef::new("title", FieldType::String)],
//!     vec![IndexDef::primary(["id"])?],
//!     vec![],
//! )?;
//! let storage = Storage::new(MockDriver::new(), SeaQueryBuilder::default()).with_model(post);
//!
//! storage.transaction(|storage| {
//!     storage.write("post", Entity::new().with("id", 1).with("title", "Hello")).one()
//! })?;
//! # Ok(())
//! # }
//! ```

use crate::driver::{Driver, Row};
use crate::entity::Entity;
use crate::error::Result;
use crate::model::{Model, ModelBag};
use crate::query::{Operation, Query, QueryPlan, StatementBuilder};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "postgres")]
use crate::config::StorageConfig;
#[cfg(feature = "postgres")]
use crate::driver::PostgresDriver;
#[cfg(feature = "postgres")]
use crate::query::SeaQueryBuilder;

pub struct Storage {
    driver: Box<dyn Driver>,
    builder: Box<dyn StatementBuilder>,
    models: ModelBag,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("models", &self.models)
            .field("in_transaction", &self.driver.transaction_check())
            .finish_non_exhaustive()
    }
}

impl Storage {
    pub fn new(driver: impl Driver + 'static, builder: impl StatementBuilder + 'static) -> Self {
        Storage {
            driver: Box::new(driver),
            builder: Box::new(builder),
            models: ModelBag::new(),
        }
    }

    /// Connect with a [`PostgresDriver`] and a builder for the configured
    /// dialect.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the connection string is invalid
    /// or the server cannot be reached.
    #[cfg(feature = "postgres")]
    pub fn connect(config: &StorageConfig) -> Result<Self> {
        let driver = PostgresDriver::connect(&config.url)?.with_isolation(config.isolation_level);
        log::info!("storage connected ({:?} dialect)", config.dialect);
        Ok(Self::new(driver, SeaQueryBuilder::new(config.dialect)))
    }

    /// Register a model under its entity name, and under `alias` if given.
    pub fn register_model(&mut self, model: Model, alias: Option<&str>) -> &mut Self {
        self.models.set(model, alias);
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.models.set(model, None);
        self
    }

    pub fn has_model(&self, id: &str) -> bool {
        self.models.has(id)
    }

    /// # Errors
    ///
    /// `StorageError::NotFound` if no model is registered under `id`.
    pub fn model(&self, id: &str) -> Result<Arc<Model>> {
        self.models.get(id)
    }

    pub fn models(&self) -> &ModelBag {
        &self.models
    }

    pub fn count(&self, entity: &str) -> Query<'_> {
        Query::new(self, entity, Operation::Count, None)
    }

    pub fn read(&self, entity: &str) -> Query<'_> {
        Query::new(self, entity, Operation::Read, None)
    }

    pub fn read_one(&self, entity: &str) -> Query<'_> {
        Query::new(self, entity, Operation::ReadOne, None)
    }

    pub fn insert(&self, entity: &str, instance: Entity) -> Query<'_> {
        Query::new(self, entity, Operation::Insert, Some(instance))
    }

    pub fn update(&self, entity: &str, instance: Entity) -> Query<'_> {
        Query::new(self, entity, Operation::Update, Some(instance))
    }

    /// Insert or update, depending on whether a row with the instance's
    /// identity exists.
    pub fn write(&self, entity: &str, instance: Entity) -> Query<'_> {
        Query::new(self, entity, Operation::Write, Some(instance))
    }

    pub fn delete(&self, entity: &str, instance: Entity) -> Query<'_> {
        Query::new(self, entity, Operation::Delete, Some(instance))
    }

    /// Delete every row matching the query's conditions.
    pub fn delete_where(&self, entity: &str) -> Query<'_> {
        Query::new(self, entity, Operation::Delete, None)
    }

    /// Delete every row of the entity's table.
    pub fn clear(&self, entity: &str) -> Query<'_> {
        Query::new(self, entity, Operation::Clear, None)
    }

    pub fn transaction_start(&self) -> Result<()> {
        Ok(self.driver.transaction_start()?)
    }

    pub fn transaction_commit(&self) -> Result<()> {
        Ok(self.driver.transaction_commit()?)
    }

    pub fn transaction_rollback(&self) -> Result<()> {
        Ok(self.driver.transaction_rollback()?)
    }

    pub fn transaction_check(&self) -> bool {
        self.driver.transaction_check()
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// The error returned by `f` is passed through unchanged. A rollback
    /// that fails as well is logged.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Storage) -> Result<T>,
    {
        self.transaction_start()?;
        match f(self) {
            Ok(value) => {
                self.transaction_commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.transaction_rollback() {
                    log::error!("rollback after '{err}' failed: {rollback}");
                }
                Err(err)
            }
        }
    }

    pub(crate) fn supports_returning(&self) -> bool {
        self.builder.supports_returning()
    }

    /// Build and run a statement that returns rows.
    pub(crate) fn fetch(&self, plan: &QueryPlan) -> Result<Vec<Row>> {
        let statement = self.builder.build(plan)?;
        log::debug!("{} {}: {}", statement.kind, statement.table, statement.sql);
        Ok(self.driver.query(&statement)?)
    }

    /// Build and run a statement that returns an affected row count.
    pub(crate) fn run(&self, plan: &QueryPlan) -> Result<u64> {
        let statement = self.builder.build(plan)?;
        log::debug!("{} {}: {}", statement.kind, statement.table, statement.sql);
        Ok(self.driver.execute(&statement)?)
    }
}
