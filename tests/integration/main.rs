//! End-to-end behaviour of `Storage` against the mock driver: statement
//! counts per table, container contents and error propagation.

mod fixed_values;
mod models;
mod relations_direct;
mod relations_through;
mod storage;
