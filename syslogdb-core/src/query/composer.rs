//! SELECT assembly and execution

use crate::db::LogStore;
use crate::error::{Error, Result};
use crate::types::Row;
use std::sync::Arc;

/// What a composed SELECT returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// The fields, one row per joined row
    Rows,
    /// The fields, duplicate rows removed by the engine
    Distinct,
    /// A single `count(*)` row
    Count,
}

/// Builds SELECT statements and runs them against the store
pub struct QueryComposer {
    store: Arc<dyn LogStore>,
}

impl QueryComposer {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// Run `SELECT <fields | DISTINCT fields | count(*)> FROM <table_list> <where_clause>`.
    ///
    /// With [`Projection::Rows`] rows come back exactly as the join yields them.
    pub fn execute<S: AsRef<str>>(
        &self,
        fields: &[S],
        table_list: &str,
        where_clause: &str,
        projection: Projection,
    ) -> Result<Vec<Row>> {
        let sql = compose(fields, table_list, where_clause, projection);
        tracing::debug!(sql = %sql, "Executing composed query");
        self.store.query(&sql).map_err(Error::into_query_error)
    }
}

/// Render the statement text
pub fn compose<S: AsRef<str>>(
    fields: &[S],
    table_list: &str,
    where_clause: &str,
    projection: Projection,
) -> String {
    let field_list = || {
        fields
            .iter()
            .map(|f| f.as_ref())
            .collect::<Vec<_>>()
            .join(",")
    };
    let select = match projection {
        Projection::Rows => field_list(),
        Projection::Distinct => format!("DISTINCT {}", field_list()),
        Projection::Count => "count(*)".to_string(),
    };

    if where_clause.is_empty() {
        format!("SELECT {} FROM {}", select, table_list)
    } else {
        format!("SELECT {} FROM {} {}", select, table_list, where_clause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::types::Cell;

    #[test]
    fn test_compose_fields() {
        assert_eq!(
            compose(&["SiteName"], "Sites", "", Projection::Rows),
            "SELECT SiteName FROM Sites"
        );
        assert_eq!(
            compose(
                &["MessageTime", "SiteName"],
                "MessageRepository NATURAL JOIN Sites",
                "WHERE (SiteName='CERN')",
                Projection::Rows
            ),
            "SELECT MessageTime,SiteName FROM MessageRepository NATURAL JOIN Sites WHERE (SiteName='CERN')"
        );
    }

    #[test]
    fn test_compose_count_ignores_fields() {
        assert_eq!(
            compose(&["SiteName", "MessageTime"], "MessageRepository", "", Projection::Count),
            "SELECT count(*) FROM MessageRepository"
        );
    }

    #[test]
    fn test_compose_distinct() {
        assert_eq!(
            compose(&["OwnerGroup"], "UserDNs", "", Projection::Distinct),
            "SELECT DISTINCT OwnerGroup FROM UserDNs"
        );
    }

    #[test]
    fn test_distinct_collapses_duplicates() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        for dn in ["/CN=alice", "/CN=bob"] {
            db.insert(
                "UserDNs",
                &["OwnerDN", "OwnerGroup"],
                &[Cell::from(dn), Cell::from("lhcb_user")],
            )
            .unwrap();
        }
        let composer = QueryComposer::new(db);
        let rows = composer
            .execute(&["OwnerGroup"], "UserDNs", "", Projection::Distinct)
            .unwrap();
        assert_eq!(rows, vec![vec![Cell::from("lhcb_user")]]);
    }

    #[test]
    fn test_engine_failure_is_query_error() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let composer = QueryComposer::new(db);
        let err = composer
            .execute(&["NoSuchColumn"], "Sites", "", Projection::Rows)
            .unwrap_err();
        match err {
            Error::QueryExecution(msg) => assert!(msg.contains("NoSuchColumn"), "{msg}"),
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[test]
    fn test_execute_returns_rows() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.insert("Sites", &["SiteName"], &[Cell::from("CERN")])
            .unwrap();
        let composer = QueryComposer::new(db);
        let rows = composer
            .execute(&["SiteName"], "Sites", "", Projection::Rows)
            .unwrap();
        assert_eq!(rows, vec![vec![Cell::from("CERN")]]);
    }
}
