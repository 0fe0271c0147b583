//! Star schema provisioning
//!
//! The fact table and its six dimensions are created idempotently when a
//! store is opened. The schema has a single version, recorded in
//! `PRAGMA user_version`; there is no migration path between versions.

use crate::error::{Error, Result};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = r#"
    -- ============================================
    -- Dimensions (append-only, unique by natural key)
    -- ============================================

    CREATE TABLE IF NOT EXISTS UserDNs (
        UserDNID         INTEGER PRIMARY KEY AUTOINCREMENT,
        OwnerDN          TEXT NOT NULL,
        OwnerGroup       TEXT NOT NULL,
        UNIQUE(OwnerDN, OwnerGroup)
    );

    CREATE TABLE IF NOT EXISTS ClientIPs (
        ClientIPNumberID     INTEGER PRIMARY KEY AUTOINCREMENT,
        ClientIPNumberString TEXT NOT NULL,
        ClientFQDN           TEXT NOT NULL,
        UNIQUE(ClientIPNumberString, ClientFQDN)
    );

    CREATE TABLE IF NOT EXISTS Sites (
        SiteID           INTEGER PRIMARY KEY AUTOINCREMENT,
        SiteName         TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS FixedTextMessages (
        FixedTextID      INTEGER PRIMARY KEY AUTOINCREMENT,
        FixedTextString  TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS Systems (
        SystemID         INTEGER PRIMARY KEY AUTOINCREMENT,
        SystemName       TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS SubSystems (
        SubSystemID      INTEGER PRIMARY KEY AUTOINCREMENT,
        SubSystemName    TEXT NOT NULL UNIQUE
    );

    -- ============================================
    -- Fact table (append-only)
    -- ============================================

    CREATE TABLE IF NOT EXISTS MessageRepository (
        MessageID        INTEGER PRIMARY KEY AUTOINCREMENT,
        MessageTime      TEXT NOT NULL,
        VariableText     TEXT NOT NULL DEFAULT '',
        LogLevel         TEXT NOT NULL,
        UserDNID         INTEGER NOT NULL REFERENCES UserDNs(UserDNID),
        ClientIPNumberID INTEGER NOT NULL REFERENCES ClientIPs(ClientIPNumberID),
        SiteID           INTEGER NOT NULL REFERENCES Sites(SiteID),
        FixedTextID      INTEGER NOT NULL REFERENCES FixedTextMessages(FixedTextID),
        SystemID         INTEGER NOT NULL REFERENCES Systems(SystemID),
        SubSystemID      INTEGER NOT NULL REFERENCES SubSystems(SubSystemID)
    );

    CREATE INDEX IF NOT EXISTS idx_messages_time ON MessageRepository(MessageTime);
"#;

/// Create all tables if missing and stamp the schema version.
pub fn provision(conn: &Connection) -> Result<()> {
    let current = get_schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(Error::Configuration(format!(
            "database schema version {} is newer than supported version {}",
            current, SCHEMA_VERSION
        )));
    }

    conn.execute_batch(SCHEMA)?;
    conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;

    if current < SCHEMA_VERSION {
        tracing::info!(version = SCHEMA_VERSION, "Provisioned message schema");
    }
    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provision_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        provision(&conn).unwrap();
        provision(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        provision(&conn).unwrap();

        let tables = [
            "MessageRepository",
            "UserDNs",
            "ClientIPs",
            "Sites",
            "FixedTextMessages",
            "Systems",
            "SubSystems",
        ];

        for table in tables {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_dimensions_share_only_their_key_with_fact_table() {
        let conn = Connection::open_in_memory().unwrap();
        provision(&conn).unwrap();

        let columns = |table: &str| -> Vec<String> {
            conn.prepare(&format!("PRAGMA table_info({})", table))
                .unwrap()
                .query_map([], |row| row.get::<_, String>(1))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };

        let fact = columns("MessageRepository");
        for dim in crate::query::catalog::DIMENSIONS {
            let shared: Vec<_> = columns(dim.table)
                .into_iter()
                .filter(|c| fact.contains(c))
                .collect();
            assert_eq!(shared, vec![dim.key_field.to_string()], "{}", dim.table);
        }
    }

    #[test]
    fn test_newer_schema_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 99").unwrap();
        assert!(provision(&conn).is_err());
    }
}
