//! Dimension key resolution
//!
//! Maps a natural key to its surrogate key, creating the dimension row the
//! first time the natural key is seen.

use crate::config::KeyResolution;
use crate::db::LogStore;
use crate::error::{Error, Result};
use crate::query::catalog::Dimension;
use crate::types::{Cell, Row};
use std::sync::Arc;

/// Get-or-create resolver for dimension surrogate keys
pub struct KeyResolver {
    store: Arc<dyn LogStore>,
    strategy: KeyResolution,
}

impl KeyResolver {
    pub fn new(store: Arc<dyn LogStore>, strategy: KeyResolution) -> Self {
        Self { store, strategy }
    }

    pub fn strategy(&self) -> KeyResolution {
        self.strategy
    }

    /// Surrogate key for `natural_key` in `dim`, inserting the row if needed.
    ///
    /// `natural_key` values line up with `dim.natural_key` columns.
    pub fn resolve(&self, dim: &Dimension, natural_key: &[&str]) -> Result<i64> {
        if natural_key.len() != dim.natural_key.len() {
            return Err(Error::Configuration(format!(
                "{} expects {} natural key value(s), got {}",
                dim.table,
                dim.natural_key.len(),
                natural_key.len()
            )));
        }
        let values: Vec<Cell> = natural_key.iter().map(|v| Cell::from(*v)).collect();

        let key = match self.strategy {
            KeyResolution::Atomic => self.insert_or_get(dim, &values)?,
            KeyResolution::LookupThenInsert => self.lookup_then_insert(dim, &values)?,
        };

        tracing::trace!(table = dim.table, key, "Resolved dimension key");
        Ok(key)
    }

    fn insert_or_get(&self, dim: &Dimension, values: &[Cell]) -> Result<i64> {
        self.store
            .insert_or_get_key(dim.table, dim.key_field, dim.natural_key, values)
            .map_err(|e| {
                tracing::warn!(table = dim.table, error = %e, "Dimension upsert failed");
                e.into_insert_error(dim.table)
            })
    }

    // Two concurrent callers may both miss the lookup and both insert; with a
    // unique constraint the loser gets an InsertError, without one the
    // dimension ends up with two keys for one natural key.
    fn lookup_then_insert(&self, dim: &Dimension, values: &[Cell]) -> Result<i64> {
        if let Some(key) = self.lookup(dim, values)? {
            return Ok(key);
        }

        self.store
            .insert(dim.table, dim.natural_key, values)
            .map_err(|e| {
                tracing::warn!(table = dim.table, error = %e, "Dimension insert failed");
                e.into_insert_error(dim.table)
            })?;
        tracing::debug!(table = dim.table, "Created dimension row");

        self.lookup(dim, values)?.ok_or_else(|| {
            Error::QueryExecution(format!(
                "no {} row found for the natural key just inserted",
                dim.table
            ))
        })
    }

    fn lookup(&self, dim: &Dimension, values: &[Cell]) -> Result<Option<i64>> {
        let rows = self
            .store
            .get_fields(dim.table, &[dim.key_field], dim.natural_key, values)
            .map_err(Error::into_query_error)?;
        first_key(dim, &rows)
    }
}

fn first_key(dim: &Dimension, rows: &[Row]) -> Result<Option<i64>> {
    match rows.first().and_then(|row| row.first()) {
        None => Ok(None),
        Some(cell) => cell.as_i64().map(Some).ok_or_else(|| {
            Error::QueryExecution(format!(
                "{} returned a non-integer {}: {:?}",
                dim.table, dim.key_field, cell
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::query::catalog::{SITES, USER_DNS};

    fn resolver(strategy: KeyResolution) -> (Arc<Database>, KeyResolver) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let resolver = KeyResolver::new(db.clone(), strategy);
        (db, resolver)
    }

    #[test]
    fn test_sequential_resolution_is_idempotent() {
        for strategy in [KeyResolution::Atomic, KeyResolution::LookupThenInsert] {
            let (db, resolver) = resolver(strategy);
            let a = resolver.resolve(&SITES, &["CERN"]).unwrap();
            let b = resolver.resolve(&SITES, &["CERN"]).unwrap();
            assert_eq!(a, b, "{:?}", strategy);
            assert_eq!(db.count_rows("Sites").unwrap(), 1);
        }
    }

    #[test]
    fn test_distinct_keys_for_distinct_values() {
        let (_db, resolver) = resolver(KeyResolution::LookupThenInsert);
        let a = resolver
            .resolve(&USER_DNS, &["/CN=alice", "dirac_user"])
            .unwrap();
        let b = resolver
            .resolve(&USER_DNS, &["/CN=alice", "dirac_admin"])
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_arity() {
        let (_db, resolver) = resolver(KeyResolution::Atomic);
        assert!(matches!(
            resolver.resolve(&USER_DNS, &["/CN=alice"]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_non_integer_key_is_query_error() {
        let rows = vec![vec![Cell::Text("abc".into())]];
        assert!(matches!(
            first_key(&SITES, &rows),
            Err(Error::QueryExecution(_))
        ));
        assert_eq!(first_key(&SITES, &[]).unwrap(), None);
    }
}
