//! Result envelopes
//!
//! Every operation returns [`crate::Result`]. At the edge (CLI output, remote
//! callers) results are flattened into an [`Envelope`]: either `OK` with a
//! `Value`, or not `OK` with a `Message`. Raw engine errors never appear here,
//! only their message text.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Transport form of an operation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "OK")]
    pub ok: bool,

    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,

    #[serde(rename = "Message", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Error category name, e.g. `ConfigurationError`
    #[serde(rename = "Kind", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(value: T) -> Self {
        Self {
            ok: true,
            value: Some(value),
            message: None,
            kind: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            value: None,
            message: Some(message.into()),
            kind: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }
}

impl<T> From<Result<T>> for Envelope<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Envelope::ok(value),
            Err(e) => Envelope {
                kind: Some(e.kind().as_str().to_string()),
                ..Envelope::error(e.to_string())
            },
        }
    }
}
