//! Storage engine contract
//!
//! The query and ingestion logic only ever talks to a [`LogStore`]. The
//! SQLite-backed [`super::Database`] is the production implementation; tests
//! wrap it to record or fail statements.

use crate::error::{Error, Result};
use crate::types::{Cell, Row};

/// Primitive operations the warehouse needs from a relational engine
pub trait LogStore: Send + Sync {
    /// Run a complete SELECT statement and return every row
    fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Insert one row into `table`
    fn insert(&self, table: &str, fields: &[&str], values: &[Cell]) -> Result<()>;

    /// Equality lookup: `SELECT out_fields FROM table WHERE in_fields = in_values`
    fn get_fields(
        &self,
        table: &str,
        out_fields: &[&str],
        in_fields: &[&str],
        in_values: &[Cell],
    ) -> Result<Vec<Row>>;

    /// Escape a value for inclusion in a single-quoted SQL literal
    fn escape_string(&self, s: &str) -> Result<String>;

    /// Insert the natural key if absent and return the row's `key_field`.
    ///
    /// Must be a single atomic statement relying on a unique constraint over
    /// `in_fields`.
    fn insert_or_get_key(
        &self,
        table: &str,
        key_field: &str,
        in_fields: &[&str],
        in_values: &[Cell],
    ) -> Result<i64>;
}

/// Plain SQL identifier: ASCII letters, digits and underscores, not leading
/// with a digit.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reject anything that is not a plain identifier before it reaches SQL text
pub fn check_identifiers(names: &[&str]) -> Result<()> {
    match names.iter().find(|name| !is_identifier(name)) {
        Some(bad) => Err(Error::Configuration(format!("invalid identifier: {:?}", bad))),
        None => Ok(()),
    }
}

/// Check that a field list and a value list line up
pub fn check_arity(fields: &[&str], values: &[Cell]) -> Result<()> {
    if fields.len() != values.len() || fields.is_empty() {
        return Err(Error::Configuration(format!(
            "{} field(s) given for {} value(s)",
            fields.len(),
            values.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("SiteName"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("Site Name"));
        assert!(!is_identifier("x;--"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_check_arity() {
        assert!(check_arity(&["a"], &[Cell::Integer(1)]).is_ok());
        assert!(check_arity(&["a", "b"], &[Cell::Integer(1)]).is_err());
        assert!(check_arity(&[], &[]).is_err());
    }
}
