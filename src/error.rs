//! Error types for the fault-injection engine

use thiserror::Error;

/// Result type alias for the engine
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
///
/// None of these ever reach the decision path; they surface only from
/// startup configuration and strict payload parsing.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reload payload failed validation
    #[error("Invalid reload payload: {0}")]
    InvalidPayload(#[from] ValidationError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Structured validation failure of a configuration payload field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Payload root is not a JSON object
    #[error("payload must be an object, got {found}")]
    PayloadNotObject {
        /// JSON type actually received
        found: &'static str,
    },

    /// `chance` is present but not a number
    #[error("chance must be a number, got {found}")]
    ChanceNotNumeric {
        /// JSON type actually received
        found: &'static str,
    },

    /// `targets` is present but not a list
    #[error("targets must be a list, got {found}")]
    TargetsNotList {
        /// JSON type actually received
        found: &'static str,
    },

    /// One element of `targets` is not a `{method, path}` record
    #[error("target #{index} is invalid: {reason}; expected {{\"method\": \"GET|POST|...\", \"path\": \"/some/path\"}}")]
    InvalidTarget {
        /// Position in the list
        index: usize,
        /// What was wrong with it
        reason: String,
    },
}
