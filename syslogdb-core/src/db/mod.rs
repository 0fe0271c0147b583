//! Database layer for syslogdb
//!
//! This module provides the storage engine behind the warehouse:
//! - The [`LogStore`] contract the query and ingestion logic depend on
//! - A bounded connection pool
//! - The SQLite implementation and its schema

pub mod pool;
pub mod repo;
pub mod schema;
pub mod store;

pub use pool::{ConnectionPool, PooledConnection};
pub use repo::Database;
pub use store::LogStore;
