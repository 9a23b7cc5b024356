//! Tracing spans for statements, transactions and relation resolution.
//!
//! Enabled with the `tracing` feature. Spans carry no subscriber of their
//! own; install one in the host application to collect them.

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use crate::query::builder::Statement;
    use tracing::{info_span, Span};

    pub fn connect_span() -> Span {
        info_span!("mooring.connect")
    }

    pub fn execute_statement_span(statement: &Statement) -> Span {
        info_span!(
            "mooring.statement",
            kind = %statement.kind,
            table = %statement.table,
            params = statement.values.0.len()
        )
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("mooring.transaction.begin")
    }

    pub fn commit_transaction_span() -> Span {
        info_span!("mooring.transaction.commit")
    }

    pub fn rollback_transaction_span() -> Span {
        info_span!("mooring.transaction.rollback")
    }

    pub fn operation_span(operation: &str, entity: &str) -> Span {
        info_span!("mooring.operation", operation, entity)
    }

    pub fn relation_span(relation: &str, operation: &str, owners: usize) -> Span {
        info_span!("mooring.relation", relation, operation, owners)
    }
}
