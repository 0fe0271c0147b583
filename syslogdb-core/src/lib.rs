//! # syslogdb-core
//!
//! Core library for syslogdb - a message logging data warehouse.
//!
//! Log events from a distributed system are stored in a star schema: one
//! append-only fact row per message (`MessageRepository`) referencing six
//! dimension tables by surrogate key. Queries by time range, site, user,
//! group, node, fixed text or arbitrary field combinations are composed on
//! the fly with the fewest natural joins that cover the requested fields.
//!
//! This library provides:
//! - The field catalog, condition builder and join planner
//! - Dimension key resolution and message ingestion
//! - The [`MessageWarehouse`] front end and [`Envelope`] results
//! - An SQLite storage engine with a bounded connection pool
//! - Configuration management and logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use syslogdb_core::{Config, LogLevel, LogMessage, MessageOrigin, MessageWarehouse};
//!
//! let config = Config::load().expect("failed to load config");
//! let warehouse = MessageWarehouse::open(&config.database).expect("failed to open store");
//!
//! let message = LogMessage::new(LogLevel::Error, "Connection failed").with_system("Framework");
//! let origin = MessageOrigin {
//!     site: Some("LCG.CERN.ch".into()),
//!     node_fqdn: "lxplus001.cern.ch".into(),
//!     user_dn: "/DC=ch/DC=cern/CN=alice".into(),
//!     user_group: "lhcb_user".into(),
//!     remote_address: "137.138.1.1".into(),
//! };
//! warehouse.insert_message(&message, &origin).expect("insert failed");
//!
//! let rows = warehouse
//!     .get_messages_by_fixed_text("Connection failed", None, None)
//!     .expect("query failed");
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, KeyResolution};
pub use db::{Database, LogStore};
pub use envelope::Envelope;
pub use error::{Error, ErrorKind, Result};
pub use query::{ConditionValue, Conditions};
pub use types::*;
pub use warehouse::MessageWarehouse;

// Public modules
pub mod config;
pub mod db;
pub mod envelope;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod query;
pub mod types;
pub mod warehouse;
