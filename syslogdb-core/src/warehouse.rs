//! Message warehouse front end
//!
//! Named operations over the star schema: ingest one message, list messages
//! by date, site, user, group, node or fixed text, run a generic field and
//! condition query, count matches, and list dimension values.
//!
//! Every query goes through the same pipeline: build the WHERE clause (so a
//! malformed condition fails before anything runs), normalize the requested
//! fields, plan the join, compose and execute.

use crate::config::{DatabaseConfig, KeyResolution};
use crate::db::{Database, LogStore};
use crate::error::{Error, Result};
use crate::ingest::MessageIngestor;
use crate::query::catalog::{self, DEFAULT_FIELDS, MESSAGE_TIME};
use crate::query::condition::{self, single_condition, ConditionValue, Conditions};
use crate::query::planner::build_table_list;
use crate::query::{Projection, QueryComposer};
use crate::types::{LogMessage, MessageOrigin, Row};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Resolve the time window for a by-date query.
///
/// With neither bound given the window is the last 24 hours before `now`;
/// otherwise the bounds are used exactly as given.
pub fn date_window(
    initial: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match (initial, end) {
        (None, None) => (Some(now - Duration::hours(24)), None),
        bounds => bounds,
    }
}

/// Ingestion and analytical queries over one store
pub struct MessageWarehouse {
    store: Arc<dyn LogStore>,
    composer: QueryComposer,
    ingestor: MessageIngestor,
}

impl MessageWarehouse {
    pub fn new(store: Arc<dyn LogStore>, strategy: KeyResolution) -> Self {
        Self {
            composer: QueryComposer::new(Arc::clone(&store)),
            ingestor: MessageIngestor::new(Arc::clone(&store), strategy),
            store,
        }
    }

    /// Open the SQLite store described by `config`
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let db = Database::open_with(&config.resolved_path(), config)?;
        Ok(Self::new(Arc::new(db), config.key_resolution))
    }

    /// Private in-memory warehouse (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::new(Arc::new(db), KeyResolution::default()))
    }

    pub fn store(&self) -> &Arc<dyn LogStore> {
        &self.store
    }

    // ============================================
    // Ingestion
    // ============================================

    /// Store one log message
    pub fn insert_message(&self, message: &LogMessage, origin: &MessageOrigin) -> Result<()> {
        self.ingestor.insert_message(message, origin)
    }

    // ============================================
    // Message queries
    // ============================================

    /// Messages between two dates; the last day when both are omitted
    pub fn get_messages_by_date(
        &self,
        initial: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Row>> {
        let (initial, end) = date_window(initial, end, Utc::now());
        self.query_db::<&str>(&[], &Conditions::new(), end, initial, Projection::Rows)
    }

    pub fn get_messages_by_fixed_text(
        &self,
        texts: impl Into<ConditionValue>,
        initial: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Row>> {
        self.query_single("FixedTextString", texts.into(), initial, end)
    }

    pub fn get_messages_by_site(
        &self,
        site: impl Into<ConditionValue>,
        initial: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Row>> {
        self.query_single("SiteName", site.into(), initial, end)
    }

    pub fn get_messages_by_user(
        &self,
        user_dn: impl Into<ConditionValue>,
        initial: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Row>> {
        self.query_single("OwnerDN", user_dn.into(), initial, end)
    }

    pub fn get_messages_by_group(
        &self,
        group: impl Into<ConditionValue>,
        initial: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Row>> {
        self.query_single("OwnerGroup", group.into(), initial, end)
    }

    pub fn get_messages_by_site_node(
        &self,
        node: impl Into<ConditionValue>,
        initial: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Row>> {
        self.query_single("ClientFQDN", node.into(), initial, end)
    }

    /// Generic query: `fields` (default set when empty) matching `conditions`
    pub fn get_messages<S: AsRef<str>>(
        &self,
        fields: &[S],
        conditions: &Conditions,
        initial: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Row>> {
        self.query_db(fields, conditions, end, initial, Projection::Rows)
    }

    /// Number of messages matching `conditions`; all messages when empty
    pub fn get_count_messages(
        &self,
        conditions: &Conditions,
        initial: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        // MessageTime keeps the fact table in the join even for a single
        // dimension condition
        let fields: Vec<&str> = if conditions.is_empty() {
            Vec::new()
        } else {
            conditions
                .keys()
                .map(String::as_str)
                .chain(std::iter::once(MESSAGE_TIME))
                .collect()
        };

        let rows = self.query_db(&fields[..], conditions, end, initial, Projection::Count)?;
        rows.first()
            .and_then(|row| row.first())
            .and_then(|cell| cell.as_i64())
            .ok_or_else(|| Error::QueryExecution("count query returned no value".to_string()))
    }

    // ============================================
    // Dimension listings
    // ============================================

    pub fn get_sites(&self) -> Result<Vec<Row>> {
        self.list("SiteName")
    }

    pub fn get_systems(&self) -> Result<Vec<Row>> {
        self.list("SystemName")
    }

    pub fn get_sub_systems(&self) -> Result<Vec<Row>> {
        self.list("SubSystemName")
    }

    /// Group names. A group shared by several user DNs is listed once.
    pub fn get_groups(&self) -> Result<Vec<Row>> {
        self.query_db(
            &["OwnerGroup"],
            &Conditions::new(),
            None,
            None,
            Projection::Distinct,
        )
    }

    pub fn get_fixed_text_strings(&self) -> Result<Vec<Row>> {
        self.list("FixedTextString")
    }

    // ============================================
    // Pipeline
    // ============================================

    fn list(&self, field: &str) -> Result<Vec<Row>> {
        self.query_db(&[field], &Conditions::new(), None, None, Projection::Rows)
    }

    fn query_single(
        &self,
        field: &str,
        value: ConditionValue,
        initial: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Row>> {
        let conditions = single_condition(field, value);
        self.query_db::<&str>(&[], &conditions, end, initial, Projection::Rows)
    }

    fn query_db<S: AsRef<str>>(
        &self,
        fields: &[S],
        conditions: &Conditions,
        older: Option<DateTime<Utc>>,
        newer: Option<DateTime<Utc>>,
        projection: Projection,
    ) -> Result<Vec<Row>> {
        let where_clause = condition::build_condition(
            conditions,
            older.as_ref(),
            newer.as_ref(),
            |s| self.store.escape_string(s),
        )?;

        let requested = if fields.is_empty() && projection != Projection::Count {
            catalog::dedup_fields(DEFAULT_FIELDS)
        } else {
            catalog::dedup_fields(fields)
        };
        catalog::validate_fields(&requested)?;

        let normalized = catalog::normalize_fields(&requested);
        let table_list = build_table_list(&normalized)?;

        self.composer
            .execute(&requested, &table_list, &where_clause, projection)
            .map_err(|e| {
                tracing::warn!(error = %e, "Message query failed");
                e
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_window_defaults_to_last_day() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        let (initial, end) = date_window(None, None, now);
        assert_eq!(initial, Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
        assert_eq!(end, None);
    }

    #[test]
    fn test_date_window_keeps_given_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(date_window(None, Some(end), now), (None, Some(end)));
        assert_eq!(date_window(Some(end), None, now), (Some(end), None));
    }

    #[test]
    fn test_empty_warehouse_counts_zero() {
        let wh = MessageWarehouse::open_in_memory().unwrap();
        assert_eq!(wh.get_count_messages(&Conditions::new(), None, None).unwrap(), 0);
        assert!(wh.get_sites().unwrap().is_empty());
    }
}
