//! Request identity: the `(method, path)` key used for matching and tracking.
//!
//! Comparison is purely structural. Method casing, trailing slashes and query
//! strings are kept exactly as the host presents them, so `GET /a` and
//! `get /a` are two different identities, as are `/a` and `/a/`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Anything the host can hand to the engine as an intercepted request.
///
/// Only the method and the server-observed URL take part in a decision; every
/// other field the host carries is ignored.
pub trait InterceptedRequest {
    /// HTTP verb as observed, e.g. `"GET"`.
    fn method(&self) -> &str;
    /// URL as observed by the server, including any query component.
    fn url(&self) -> &str;
}

/// Canonical `(method, path)` identity of a request.
///
/// Cheap to clone: both parts are shared `Arc<str>`s, so the tracker and the
/// target set can hold copies without reallocating on every decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    method: Arc<str>,
    path: Arc<str>,
}

impl RequestIdentity {
    /// Build an identity from a method and a path, taken verbatim.
    #[must_use]
    pub fn new(method: impl AsRef<str>, path: impl AsRef<str>) -> Self {
        Self {
            method: Arc::from(method.as_ref()),
            path: Arc::from(path.as_ref()),
        }
    }

    /// Capture the identity of a live request.
    #[must_use]
    pub fn from_request<R: InterceptedRequest + ?Sized>(request: &R) -> Self {
        Self::new(request.method(), request.url())
    }

    /// HTTP verb.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path as observed, query string included.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl InterceptedRequest for RequestIdentity {
    fn method(&self) -> &str {
        &self.method
    }

    fn url(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Typed schema of one entry in a `targets` configuration list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    /// HTTP verb, e.g. `"POST"`.
    pub method: String,
    /// Path to match, compared verbatim.
    pub path: String,
}

impl TargetRecord {
    /// Parse the `index`-th element of a `targets` list.
    ///
    /// The element must deserialize into a record and pass [`validate`](Self::validate);
    /// the caller decides how to fall back on failure.
    pub fn from_value(value: &serde_json::Value, index: usize) -> Result<Self, ValidationError> {
        let record = Self::deserialize(value).map_err(|e| ValidationError::InvalidTarget {
            index,
            reason: e.to_string(),
        })?;
        record.validate(index)?;
        Ok(record)
    }

    /// Reject records with an empty method or path.
    ///
    /// Applied both at startup and on reload.
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        let empty = match (self.method.is_empty(), self.path.is_empty()) {
            (true, _) => "method",
            (_, true) => "path",
            _ => return Ok(()),
        };
        Err(ValidationError::InvalidTarget {
            index,
            reason: format!("field `{empty}` must not be empty"),
        })
    }
}

impl From<&TargetRecord> for RequestIdentity {
    fn from(record: &TargetRecord) -> Self {
        Self::new(&record.method, &record.path)
    }
}

/// Parse every element of a JSON list into identities, all or nothing.
///
/// The first element that fails parsing aborts the whole list.
pub(crate) fn parse_target_list(items: &[serde_json::Value]) -> Result<Vec<RequestIdentity>, ValidationError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| TargetRecord::from_value(item, index).map(|record| RequestIdentity::from(&record)))
        .collect()
}

/// Short name of a JSON value's type, for diagnostics.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
