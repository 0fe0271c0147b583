//! Message ingestion
//!
//! One log message becomes six dimension lookups (creating rows on first
//! sight) followed by a single fact row. Dimension rows are never rolled back:
//! if the fact insert fails they stay valid and are reused next time.

pub mod resolver;

pub use resolver::KeyResolver;

use crate::config::KeyResolution;
use crate::db::LogStore;
use crate::error::Result;
use crate::query::catalog::{
    CLIENT_IPS, FACT_TABLE, FIXED_TEXT_MESSAGES, SITES, SUB_SYSTEMS, SYSTEMS, USER_DNS,
};
use crate::types::{format_message_time, Cell, LogMessage, MessageOrigin};
use std::sync::Arc;

/// Placeholder for a missing site, system or subsystem
pub const UNKNOWN: &str = "Unknown";

fn or_unknown(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => UNKNOWN,
    }
}

/// Writes log messages into the star schema
pub struct MessageIngestor {
    store: Arc<dyn LogStore>,
    resolver: KeyResolver,
}

impl MessageIngestor {
    pub fn new(store: Arc<dyn LogStore>, strategy: KeyResolution) -> Self {
        let resolver = KeyResolver::new(Arc::clone(&store), strategy);
        Self { store, resolver }
    }

    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    /// Store one message. Aborts at the first failing dimension, in which
    /// case no fact row is written.
    pub fn insert_message(&self, message: &LogMessage, origin: &MessageOrigin) -> Result<()> {
        let site = or_unknown(origin.site.as_deref());
        let system = or_unknown(message.system_name.as_deref());
        let sub_system = or_unknown(message.sub_system_name.as_deref());

        let user_dn_id = self
            .resolver
            .resolve(&USER_DNS, &[origin.user_dn.as_str(), origin.user_group.as_str()])?;
        let client_ip_id = self
            .resolver
            .resolve(&CLIENT_IPS, &[origin.remote_address.as_str(), origin.node_fqdn.as_str()])?;
        let site_id = self.resolver.resolve(&SITES, &[site])?;
        let fixed_text_id = self
            .resolver
            .resolve(&FIXED_TEXT_MESSAGES, &[message.fixed_text.as_str()])?;
        let system_id = self.resolver.resolve(&SYSTEMS, &[system])?;
        let sub_system_id = self.resolver.resolve(&SUB_SYSTEMS, &[sub_system])?;

        let fields = [
            "MessageTime",
            "VariableText",
            "LogLevel",
            USER_DNS.key_field,
            CLIENT_IPS.key_field,
            SITES.key_field,
            FIXED_TEXT_MESSAGES.key_field,
            SYSTEMS.key_field,
            SUB_SYSTEMS.key_field,
        ];
        let values = [
            Cell::Text(format_message_time(&message.time)),
            Cell::Text(message.variable_text.clone()),
            Cell::from(message.level.as_str()),
            Cell::Integer(user_dn_id),
            Cell::Integer(client_ip_id),
            Cell::Integer(site_id),
            Cell::Integer(fixed_text_id),
            Cell::Integer(system_id),
            Cell::Integer(sub_system_id),
        ];

        self.store
            .insert(FACT_TABLE, &fields, &values)
            .map_err(|e| {
                tracing::warn!(error = %e, "Fact insert failed, dimension rows kept");
                e.into_insert_error(FACT_TABLE)
            })?;

        tracing::debug!(
            site,
            system,
            level = message.level.as_str(),
            "Ingested message"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::types::LogLevel;

    fn origin(site: Option<&str>) -> MessageOrigin {
        MessageOrigin {
            site: site.map(str::to_string),
            node_fqdn: "lxplus001.cern.ch".into(),
            user_dn: "/DC=ch/DC=cern/CN=alice".into(),
            user_group: "lhcb_user".into(),
            remote_address: "137.138.1.1".into(),
        }
    }

    #[test]
    fn test_missing_names_default_to_unknown() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ingestor = MessageIngestor::new(db.clone(), KeyResolution::Atomic);

        let msg = LogMessage::new(LogLevel::Info, "Job started").with_system("");
        ingestor.insert_message(&msg, &origin(None)).unwrap();

        let rows = db
            .query("SELECT SiteName, SystemName, SubSystemName FROM MessageRepository NATURAL JOIN Sites NATURAL JOIN Systems NATURAL JOIN SubSystems")
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![
                Cell::from(UNKNOWN),
                Cell::from(UNKNOWN),
                Cell::from(UNKNOWN)
            ]]
        );
    }

    #[test]
    fn test_dimensions_shared_across_messages() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ingestor = MessageIngestor::new(db.clone(), KeyResolution::LookupThenInsert);

        for text in ["Job started", "Job finished", "Job started"] {
            let msg = LogMessage::new(LogLevel::Info, text).with_system("WorkloadManagement");
            ingestor.insert_message(&msg, &origin(Some("LCG.CERN.ch"))).unwrap();
        }

        assert_eq!(db.count_messages().unwrap(), 3);
        assert_eq!(db.count_rows("Sites").unwrap(), 1);
        assert_eq!(db.count_rows("UserDNs").unwrap(), 1);
        assert_eq!(db.count_rows("FixedTextMessages").unwrap(), 2);
    }

    #[test]
    fn test_or_unknown() {
        assert_eq!(or_unknown(None), UNKNOWN);
        assert_eq!(or_unknown(Some("")), UNKNOWN);
        assert_eq!(or_unknown(Some("CERN")), "CERN");
    }
}
