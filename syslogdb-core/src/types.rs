//! Core domain types for syslogdb
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Fact table** | `MessageRepository`, one append-only row per ingested message |
//! | **Dimension** | A table mapping a natural key to a surrogate integer key |
//! | **Natural key** | The real-world identifying value(s) of a dimension row |
//! | **Surrogate key** | Generated integer standing in for a natural key in the fact table |
//! | **Fixed text** | The constant part of a log message, shared across occurrences |
//! | **Variable text** | The per-occurrence part of a log message |

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Serialize};

/// Text layout of `MessageTime`: second precision, no fractional part.
pub const MESSAGE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a timestamp the way `MessageTime` stores it.
///
/// Sub-second precision is dropped, never rounded.
pub fn format_message_time(ts: &DateTime<Utc>) -> String {
    ts.format(MESSAGE_TIME_FORMAT).to_string()
}

/// Parse a `MessageTime` string back into a UTC timestamp.
pub fn parse_message_time(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, MESSAGE_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

// ============================================
// Cells and rows
// ============================================

/// A single value read from or written to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Integer(i) => Some(*i),
            Cell::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Integer(i)
    }
}

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Cell::Null => ToSqlOutput::Owned(Value::Null),
            Cell::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Cell::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            Cell::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl FromSql for Cell {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(f) => Cell::Real(f),
            ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Cell::Text(String::from_utf8_lossy(b).into_owned()),
        })
    }
}

/// One result row, columns in SELECT-list order
pub type Row = Vec<Cell>;

// ============================================
// Log messages
// ============================================

/// Severity of a log message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Always,
    Fatal,
    Except,
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Always => "ALWAYS",
            LogLevel::Fatal => "FATAL",
            LogLevel::Except => "EXCEPT",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Verbose => "VERBOSE",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALWAYS" => Ok(LogLevel::Always),
            "FATAL" => Ok(LogLevel::Fatal),
            "EXCEPT" | "EXCEPTION" => Ok(LogLevel::Except),
            "ERROR" => Ok(LogLevel::Error),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "INFO" => Ok(LogLevel::Info),
            "VERBOSE" => Ok(LogLevel::Verbose),
            "DEBUG" => Ok(LogLevel::Debug),
            _ => Err(format!("unknown log level: {}", s)),
        }
    }
}

/// A structured log event emitted by some component of the distributed system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessage {
    /// When the event was emitted
    pub time: DateTime<Utc>,
    /// Severity
    pub level: LogLevel,
    /// Constant part of the message
    pub fixed_text: String,
    /// Per-occurrence part of the message
    #[serde(default)]
    pub variable_text: String,
    /// Emitting system (defaults to "Unknown" on ingestion)
    #[serde(default)]
    pub system_name: Option<String>,
    /// Emitting subsystem (defaults to "Unknown" on ingestion)
    #[serde(default)]
    pub sub_system_name: Option<String>,
}

impl LogMessage {
    pub fn new(level: LogLevel, fixed_text: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            level,
            fixed_text: fixed_text.into(),
            variable_text: String::new(),
            system_name: None,
            sub_system_name: None,
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn with_variable_text(mut self, text: impl Into<String>) -> Self {
        self.variable_text = text.into();
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_name = Some(system.into());
        self
    }

    pub fn with_sub_system(mut self, sub_system: impl Into<String>) -> Self {
        self.sub_system_name = Some(sub_system.into());
        self
    }
}

/// Where a message came from: everything the ingestor needs besides the message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageOrigin {
    /// Site name (defaults to "Unknown")
    #[serde(default)]
    pub site: Option<String>,
    /// Fully qualified name of the emitting node
    pub node_fqdn: String,
    /// Distinguished name of the owning user
    pub user_dn: String,
    /// Group of the owning user
    pub user_group: String,
    /// Remote address the message was received from
    pub remote_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_message_time_drops_fraction() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap()
            + chrono::Duration::milliseconds(987);
        assert_eq!(format_message_time(&ts), "2024-03-01 12:30:45");
    }

    #[test]
    fn test_parse_message_time() {
        let ts = parse_message_time("2024-03-01 12:30:45").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap());
        assert!(parse_message_time("yesterday").is_none());
    }

    #[test]
    fn test_log_level_roundtrip() {
        for level in [
            LogLevel::Always,
            LogLevel::Fatal,
            LogLevel::Except,
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Verbose,
            LogLevel::Debug,
        ] {
            assert_eq!(level.as_str().parse::<LogLevel>().unwrap(), level);
        }
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("LOUD".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_cell_serializes_untagged() {
        let row: Row = vec![Cell::Text("CERN".into()), Cell::Integer(3), Cell::Null];
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"["CERN",3,null]"#);
    }

    #[test]
    fn test_cell_as_i64() {
        assert_eq!(Cell::Integer(7).as_i64(), Some(7));
        assert_eq!(Cell::Text("12".into()).as_i64(), Some(12));
        assert_eq!(Cell::Null.as_i64(), None);
    }
}
