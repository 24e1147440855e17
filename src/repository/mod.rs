//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! over an async SQLite connection.

pub mod case_store;
pub mod diesel_models;
pub mod pool;
pub mod util;

pub use case_store::{CaseStore, StoreError};
pub use pool::{AsyncSqlitePool, DieselError};
