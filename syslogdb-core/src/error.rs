//! Error types for syslogdb-core

use thiserror::Error;

/// Main error type for the syslogdb-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed condition, unknown field, or bad configuration file
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Engine failure during a select or lookup, message passed through verbatim
    #[error("{0}")]
    QueryExecution(String),

    /// Dimension or fact insert failed
    #[error("could not insert the data into {table} table: {message}")]
    Insert { table: String, message: String },

    /// Raw database error, only raised inside the storage layer
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Category of an [`Error`], as reported in result envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    QueryExecution,
    Insert,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::QueryExecution => "QueryExecutionError",
            ErrorKind::Insert => "InsertError",
            ErrorKind::Storage => "StorageError",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::QueryExecution(_) => ErrorKind::QueryExecution,
            Error::Insert { .. } => ErrorKind::Insert,
            Error::Database(_) | Error::Io(_) | Error::Json(_) => ErrorKind::Storage,
        }
    }

    /// Recast a storage failure as a query execution failure.
    ///
    /// Errors already in the taxonomy pass through untouched.
    pub fn into_query_error(self) -> Self {
        match self {
            Error::Database(e) => Error::QueryExecution(e.to_string()),
            Error::Io(e) => Error::QueryExecution(e.to_string()),
            Error::Json(e) => Error::QueryExecution(e.to_string()),
            other => other,
        }
    }

    /// Recast any failure as an insert failure against `table`.
    pub fn into_insert_error(self, table: &str) -> Self {
        match self {
            Error::Insert { .. } => self,
            Error::Database(e) => Error::Insert {
                table: table.to_string(),
                message: e.to_string(),
            },
            other => Error::Insert {
                table: table.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for syslogdb-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_becomes_query_error() {
        let err = Error::Database(rusqlite::Error::InvalidQuery).into_query_error();
        assert_eq!(err.kind(), ErrorKind::QueryExecution);
    }

    #[test]
    fn test_insert_error_names_table() {
        let err = Error::QueryExecution("disk full".to_string()).into_insert_error("Sites");
        match err {
            Error::Insert { table, message } => {
                assert_eq!(table, "Sites");
                assert_eq!(message, "disk full");
            }
            other => panic!("expected insert error, got {other:?}"),
        }
    }

    #[test]
    fn test_configuration_passes_through() {
        let err = Error::Configuration("bad".to_string()).into_query_error();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.kind().as_str(), "ConfigurationError");
    }
}
