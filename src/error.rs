//! Error types for mooring operations
//!
//! Two layers:
//! - [`StorageError`] is what every public operation returns. Definition and
//!   lookup problems are raised by the engine itself.
//! - [`BackendError`] covers whatever the statement builder or the driver
//!   reports. It is carried through `StorageError::Backend` transparently so
//!   the backend's message reaches the caller unchanged.

use thiserror::Error;

/// What kind of name a failed lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Model,
    Field,
    Index,
    Relation,
}

impl std::fmt::Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Lookup::Model => "model",
            Lookup::Field => "field",
            Lookup::Index => "index",
            Lookup::Relation => "relation",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by models, queries and relation resolution.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A model, index or relation references fields that do not exist, or a
    /// key set is empty. Raised while definitions are being built.
    #[error("Definition error: {0}")]
    Definition(String),

    /// Lookup of an unregistered model, field, index or relation.
    #[error("Unknown {kind} '{name}' in entity '{entity}'")]
    NotFound {
        kind: Lookup,
        name: String,
        entity: String,
    },

    /// A relation container holds data of the wrong shape, or a mediator row
    /// cannot be assembled from the owner and target values.
    #[error("Relation error in '{relation}': {reason}")]
    Relation { relation: String, reason: String },

    /// The requested operation cannot be expressed for the given instance,
    /// e.g. an update without primary key values.
    #[error("Query error: {0}")]
    Query(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StorageError {
    pub(crate) fn not_found(kind: Lookup, name: impl Into<String>, entity: impl Into<String>) -> Self {
        StorageError::NotFound {
            kind,
            name: name.into(),
            entity: entity.into(),
        }
    }

    pub(crate) fn relation(relation: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::Relation {
            relation: relation.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by a statement builder or a driver.
#[derive(Debug, Error)]
pub enum BackendError {
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] may_postgres::Error),

    #[error("Invalid connection string: {0}")]
    Connection(String),

    #[error("Statement build error: {0}")]
    Build(String),

    #[error("Row decode error: {0}")]
    Decode(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Mock driver error: {0}")]
    Mock(String),
}

/// Result alias used throughout the crate.
pub type Result<T, E = StorageError> = std::result::Result<T, E>;
