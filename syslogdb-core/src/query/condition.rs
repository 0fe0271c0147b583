//! WHERE clause construction
//!
//! Conditions arrive as a field -> value map, where each value is either a
//! single string or a list of strings. Values for one field are OR'd, fields
//! are AND'd, then the time bounds are appended.

use crate::error::{Error, Result};
use crate::query::catalog::{self, MESSAGE_TIME};
use crate::types::format_message_time;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Field -> value(s) as received from callers.
///
/// Values are loosely typed on purpose: remote callers send JSON, and
/// anything other than a string or a list of strings is rejected when the
/// clause is built.
pub type Conditions = BTreeMap<String, serde_json::Value>;

/// A well-formed condition value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionValue {
    One(String),
    Any(Vec<String>),
}

impl ConditionValue {
    pub fn values(&self) -> &[String] {
        match self {
            ConditionValue::One(v) => std::slice::from_ref(v),
            ConditionValue::Any(vs) => vs,
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(s: &str) -> Self {
        ConditionValue::One(s.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(s: String) -> Self {
        ConditionValue::One(s)
    }
}

impl From<Vec<String>> for ConditionValue {
    fn from(vs: Vec<String>) -> Self {
        ConditionValue::Any(vs)
    }
}

impl From<&[&str]> for ConditionValue {
    fn from(vs: &[&str]) -> Self {
        ConditionValue::Any(vs.iter().map(|s| s.to_string()).collect())
    }
}

impl From<ConditionValue> for serde_json::Value {
    fn from(value: ConditionValue) -> Self {
        match value {
            ConditionValue::One(s) => serde_json::Value::String(s),
            ConditionValue::Any(vs) => {
                serde_json::Value::Array(vs.into_iter().map(serde_json::Value::String).collect())
            }
        }
    }
}

impl TryFrom<&serde_json::Value> for ConditionValue {
    type Error = Error;

    fn try_from(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(s) => Ok(ConditionValue::One(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => Ok(s.clone()),
                    other => Err(malformed(other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(ConditionValue::Any),
            other => Err(malformed(other)),
        }
    }
}

fn malformed(value: &serde_json::Value) -> Error {
    let kind = match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "object",
    };
    Error::Configuration(format!(
        "The values of conditions should be strings or lists: the type provided was {}",
        kind
    ))
}

/// Build a one-field condition map
pub fn single_condition(field: &str, value: impl Into<ConditionValue>) -> Conditions {
    let value: ConditionValue = value.into();
    let mut conds = Conditions::new();
    conds.insert(field.to_string(), value.into());
    conds
}

/// Quote-doubling escape for SQL string literals
pub fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

/// Check every condition value without building anything
pub fn validate_conditions(conditions: &Conditions) -> Result<()> {
    for (field, value) in conditions {
        if !catalog::is_known_field(field) {
            return Err(Error::Configuration(format!("unknown field: {}", field)));
        }
        ConditionValue::try_from(value)?;
    }
    Ok(())
}

/// Build the WHERE clause for `conditions` and the optional time bounds.
///
/// `older` is an exclusive upper bound, `newer` an exclusive lower bound.
/// Returns an empty string when there is nothing to filter on.
pub fn build_condition<F>(
    conditions: &Conditions,
    older: Option<&DateTime<Utc>>,
    newer: Option<&DateTime<Utc>>,
    escape: F,
) -> Result<String>
where
    F: Fn(&str) -> Result<String>,
{
    validate_conditions(conditions)?;

    let mut parts: Vec<String> = Vec::new();

    for (field, value) in conditions {
        let value = ConditionValue::try_from(value)?;
        let alternatives = value
            .values()
            .iter()
            .map(|v| -> Result<String> { Ok(format!("{}='{}'", field, escape(v)?)) })
            .collect::<Result<Vec<_>>>()?;
        // An empty list matches nothing rather than everything
        if alternatives.is_empty() {
            parts.push("(0)".to_string());
        } else {
            parts.push(format!("({})", alternatives.join(" OR ")));
        }
    }

    if let Some(older) = older {
        parts.push(format!("{}<'{}'", MESSAGE_TIME, format_message_time(older)));
    }
    if let Some(newer) = newer {
        parts.push(format!("{}>'{}'", MESSAGE_TIME, format_message_time(newer)));
    }

    if parts.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("WHERE {}", parts.join(" AND ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn escape(s: &str) -> Result<String> {
        Ok(escape_literal(s))
    }

    fn t1() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_multi_value_with_newer_bound() {
        let conds = single_condition("SiteName", &["CERN", "IN2P3"][..]);
        let clause = build_condition(&conds, None, Some(&t1()), escape).unwrap();
        assert_eq!(
            clause,
            "WHERE (SiteName='CERN' OR SiteName='IN2P3') AND MessageTime>'2024-01-01 00:00:00'"
        );
    }

    #[test]
    fn test_fields_conjoined() {
        let mut conds = Conditions::new();
        conds.insert("SiteName".into(), json!("CERN"));
        conds.insert("LogLevel".into(), json!(["ERROR", "FATAL"]));
        let clause = build_condition(&conds, None, None, escape).unwrap();
        assert_eq!(
            clause,
            "WHERE (LogLevel='ERROR' OR LogLevel='FATAL') AND (SiteName='CERN')"
        );
    }

    #[test]
    fn test_both_bounds_without_conditions() {
        let older = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let clause = build_condition(&Conditions::new(), Some(&older), Some(&t1()), escape).unwrap();
        assert_eq!(
            clause,
            "WHERE MessageTime<'2024-01-02 00:00:00' AND MessageTime>'2024-01-01 00:00:00'"
        );
    }

    #[test]
    fn test_empty_is_empty() {
        let clause = build_condition(&Conditions::new(), None, None, escape).unwrap();
        assert_eq!(clause, "");
    }

    #[test]
    fn test_number_value_rejected() {
        let mut conds = Conditions::new();
        conds.insert("SiteName".into(), json!(42));
        let err = build_condition(&conds, None, None, escape).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_list_with_non_string_rejected() {
        let mut conds = Conditions::new();
        conds.insert("SiteName".into(), json!(["CERN", 7]));
        assert!(matches!(
            build_condition(&conds, None, None, escape),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let conds = single_condition("SiteName='x' OR 1", "CERN");
        assert!(matches!(
            build_condition(&conds, None, None, escape),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_quotes_escaped() {
        let conds = single_condition("FixedTextString", "can't connect");
        let clause = build_condition(&conds, None, None, escape).unwrap();
        assert_eq!(clause, "WHERE (FixedTextString='can''t connect')");
    }

    #[test]
    fn test_empty_list_matches_nothing() {
        let conds = single_condition("SiteName", Vec::<String>::new());
        let clause = build_condition(&conds, None, None, escape).unwrap();
        assert_eq!(clause, "WHERE (0)");
    }
}
