//! Field catalog
//!
//! Every queryable column and the table that owns it, plus the ordered rules
//! that collapse fields sharing a table onto one representative so the planner
//! never joins the same table twice.

use crate::error::{Error, Result};

/// The fact table
pub const FACT_TABLE: &str = "MessageRepository";

/// Dimension tables, in join order for a full-catalog scan
pub const DIMENSION_TABLES: &[&str] = &[
    "UserDNs",
    "ClientIPs",
    "Sites",
    "FixedTextMessages",
    "Systems",
    "SubSystems",
];

pub const MESSAGE_TIME: &str = "MessageTime";

/// Field -> owning table
const FIELD_TABLES: &[(&str, &str)] = &[
    ("MessageTime", FACT_TABLE),
    ("VariableText", FACT_TABLE),
    ("LogLevel", FACT_TABLE),
    ("OwnerDN", "UserDNs"),
    ("OwnerGroup", "UserDNs"),
    ("ClientIPNumberString", "ClientIPs"),
    ("ClientFQDN", "ClientIPs"),
    ("SiteName", "Sites"),
    ("FixedTextString", "FixedTextMessages"),
    ("SystemName", "Systems"),
    ("SubSystemName", "SubSystems"),
    // Foreign keys live in the fact table
    ("UserDNID", FACT_TABLE),
    ("ClientIPNumberID", FACT_TABLE),
    ("SiteID", FACT_TABLE),
    ("FixedTextID", FACT_TABLE),
    ("SystemID", FACT_TABLE),
    ("SubSystemID", FACT_TABLE),
];

/// Fields returned when a caller does not choose any
pub const DEFAULT_FIELDS: &[&str] = &[
    "MessageTime",
    "LogLevel",
    "FixedTextString",
    "VariableText",
    "SystemName",
    "SubSystemName",
    "OwnerDN",
    "OwnerGroup",
    "ClientIPNumberString",
    "SiteName",
];

/// A field that can stand in for another field of the same table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizationRule {
    /// Field dropped from the set when requested
    pub drop: &'static str,
    /// Field added in its place, unless already present
    pub representative: &'static str,
}

/// Applied in order
pub const NORMALIZATION_RULES: &[NormalizationRule] = &[
    NormalizationRule {
        drop: "VariableText",
        representative: MESSAGE_TIME,
    },
    NormalizationRule {
        drop: "LogLevel",
        representative: MESSAGE_TIME,
    },
    NormalizationRule {
        drop: "OwnerGroup",
        representative: "OwnerDN",
    },
    NormalizationRule {
        drop: "ClientFQDN",
        representative: "ClientIPNumberString",
    },
];

/// A natural-key dimension and the columns that identify its rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    pub table: &'static str,
    pub key_field: &'static str,
    pub natural_key: &'static [&'static str],
}

pub const USER_DNS: Dimension = Dimension {
    table: "UserDNs",
    key_field: "UserDNID",
    natural_key: &["OwnerDN", "OwnerGroup"],
};

pub const CLIENT_IPS: Dimension = Dimension {
    table: "ClientIPs",
    key_field: "ClientIPNumberID",
    natural_key: &["ClientIPNumberString", "ClientFQDN"],
};

pub const SITES: Dimension = Dimension {
    table: "Sites",
    key_field: "SiteID",
    natural_key: &["SiteName"],
};

pub const FIXED_TEXT_MESSAGES: Dimension = Dimension {
    table: "FixedTextMessages",
    key_field: "FixedTextID",
    natural_key: &["FixedTextString"],
};

pub const SYSTEMS: Dimension = Dimension {
    table: "Systems",
    key_field: "SystemID",
    natural_key: &["SystemName"],
};

pub const SUB_SYSTEMS: Dimension = Dimension {
    table: "SubSystems",
    key_field: "SubSystemID",
    natural_key: &["SubSystemName"],
};

/// All dimensions, in ingestion order
pub const DIMENSIONS: &[Dimension] = &[
    USER_DNS,
    CLIENT_IPS,
    SITES,
    FIXED_TEXT_MESSAGES,
    SYSTEMS,
    SUB_SYSTEMS,
];

/// Owning table of `field`, if it is a catalog field
pub fn table_for(field: &str) -> Option<&'static str> {
    FIELD_TABLES
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, table)| *table)
}

pub fn is_known_field(field: &str) -> bool {
    table_for(field).is_some()
}

/// Reject any field the catalog does not know
pub fn validate_fields<S: AsRef<str>>(fields: &[S]) -> Result<()> {
    for field in fields {
        let field = field.as_ref();
        if !is_known_field(field) {
            return Err(Error::Configuration(format!("unknown field: {}", field)));
        }
    }
    Ok(())
}

/// Deduplicate, keeping first occurrence order
pub fn dedup_fields<S: AsRef<str>>(fields: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(fields.len());
    for field in fields {
        let field = field.as_ref();
        if !out.iter().any(|f| f == field) {
            out.push(field.to_string());
        }
    }
    out
}

/// Collapse fields that share a table onto a single representative.
///
/// The result drives the table list planner.
pub fn normalize_fields<S: AsRef<str>>(fields: &[S]) -> Vec<String> {
    let mut set = dedup_fields(fields);

    for rule in NORMALIZATION_RULES {
        if let Some(pos) = set.iter().position(|f| f == rule.drop) {
            set.remove(pos);
            if !set.iter().any(|f| f == rule.representative) {
                set.push(rule.representative.to_string());
            }
        }
    }

    set
}
