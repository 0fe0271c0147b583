//! SQLite storage engine
//!
//! Implements [`LogStore`] over a bounded pool of connections. Every
//! operation checks out its own connection, so consecutive calls from one
//! caller may run on different connections and are never wrapped in a
//! shared transaction.

use super::pool::{ConnectionPool, PooledConnection};
use super::schema;
use super::store::{check_arity, check_identifiers, LogStore};
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::query::condition::escape_literal;
use crate::types::{Cell, Row};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::time::Duration;

/// SQLite-backed message store
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Open or create a database at the given path with default settings
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, &DatabaseConfig::default())
    }

    /// Open or create a database at the given path
    pub fn open_with(path: &Path, config: &DatabaseConfig) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db_path = path.to_path_buf();
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let pool = ConnectionPool::new(config.pool_size, move || {
            let conn = Connection::open(&db_path)?;
            conn.busy_timeout(busy_timeout)?;
            // WAL lets readers proceed while an ingestor writes
            conn.execute_batch(
                "
                PRAGMA foreign_keys = ON;
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                ",
            )?;
            Ok(conn)
        })?;

        let db = Self { pool };
        db.provision()?;

        tracing::info!(
            path = %path.display(),
            pool_size = db.pool.capacity(),
            "Opened message store"
        );
        Ok(db)
    }

    /// Open a private in-memory database (for testing)
    ///
    /// The store runs on a single connection regardless of
    /// `config.pool_size`: concurrent callers queue on the pool instead of
    /// hitting SQLite's table-level locks, which ignore the busy timeout.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with(&DatabaseConfig::default())
    }

    pub fn open_in_memory_with(config: &DatabaseConfig) -> Result<Self> {
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let pool = ConnectionPool::new(1, move || {
            let conn = Connection::open_in_memory()?;
            conn.busy_timeout(busy_timeout)?;
            conn.execute("PRAGMA foreign_keys = ON", [])?;
            Ok(conn)
        })?;

        let db = Self { pool };
        db.provision()?;
        Ok(db)
    }

    fn provision(&self) -> Result<()> {
        let conn = self.conn()?;
        schema::provision(&conn)
    }

    fn conn(&self) -> Result<PooledConnection> {
        self.pool.get()
    }

    /// The connection pool backing this store
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Total number of fact rows
    pub fn count_messages(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM MessageRepository", [], |r| r.get(0))?;
        Ok(count)
    }

    /// Number of rows in any dimension or fact table
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        check_identifiers(&[table])?;
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
        Ok(count)
    }
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

fn equality_clause(fields: &[&str]) -> String {
    fields
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{} = ?{}", f, i + 1))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn collect_rows(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let rows = stmt
        .query_map(params, |row| {
            (0..width)
                .map(|i| row.get::<_, Cell>(i))
                .collect::<rusqlite::Result<Row>>()
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl LogStore for Database {
    fn query(&self, sql: &str) -> Result<Vec<Row>> {
        tracing::debug!(sql, "query");
        let conn = self.conn()?;
        collect_rows(&conn, sql, [])
    }

    fn insert(&self, table: &str, fields: &[&str], values: &[Cell]) -> Result<()> {
        check_identifiers(&[table])?;
        check_identifiers(fields)?;
        check_arity(fields, values)?;

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            fields.join(", "),
            placeholders(values.len())
        );
        let conn = self.conn()?;
        conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    fn get_fields(
        &self,
        table: &str,
        out_fields: &[&str],
        in_fields: &[&str],
        in_values: &[Cell],
    ) -> Result<Vec<Row>> {
        check_identifiers(&[table])?;
        check_identifiers(out_fields)?;
        check_identifiers(in_fields)?;
        check_arity(in_fields, in_values)?;

        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            out_fields.join(", "),
            table,
            equality_clause(in_fields)
        );
        let conn = self.conn()?;
        collect_rows(&conn, &sql, params_from_iter(in_values.iter()))
    }

    fn escape_string(&self, s: &str) -> Result<String> {
        Ok(escape_literal(s))
    }

    fn insert_or_get_key(
        &self,
        table: &str,
        key_field: &str,
        in_fields: &[&str],
        in_values: &[Cell],
    ) -> Result<i64> {
        check_identifiers(&[table, key_field])?;
        check_identifiers(in_fields)?;
        check_arity(in_fields, in_values)?;

        // The no-op update makes RETURNING yield the existing row on conflict
        let sql = format!(
            "INSERT INTO {table} ({cols}) VALUES ({vals}) \
             ON CONFLICT({cols}) DO UPDATE SET {first} = excluded.{first} \
             RETURNING {key_field}",
            table = table,
            cols = in_fields.join(", "),
            vals = placeholders(in_values.len()),
            first = in_fields[0],
            key_field = key_field,
        );
        let conn = self.conn()?;
        let key: i64 = conn.query_row(&sql, params_from_iter(in_values.iter()), |r| r.get(0))?;
        Ok(key)
    }
}
