//! Error types for the BigQuery MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Each variant maps to one failure class: startup configuration, parameter
//! validation, upstream query failures and per-field conversion problems.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BqError {
    /// Fatal at startup; the server never begins serving.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The warehouse call itself failed. `message` is the upstream text, untouched.
    #[error("BigQuery API error: {message}")]
    Upstream {
        message: String,
        /// HTTP status, when the failure came back as a response
        status: Option<u16>,
    },

    #[error("Cannot convert field '{field}' (value: {value}): {reason}")]
    Conversion {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BqError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an upstream error with an optional HTTP status.
    pub fn upstream(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Upstream {
            message: message.into(),
            status,
        }
    }

    /// Create a field conversion error.
    pub fn conversion(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Message text without the category prefix.
    ///
    /// Upstream failures are handed to the tool caller exactly as BigQuery
    /// reported them; every other variant uses its display form.
    pub fn message(&self) -> String {
        match self {
            Self::Upstream { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether this error must stop the process at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

impl From<reqwest::Error> for BqError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        if err.is_decode() {
            BqError::internal(format!("Failed to decode BigQuery response: {}", err))
        } else {
            BqError::upstream(err.to_string(), status)
        }
    }
}

impl From<gcp_auth::Error> for BqError {
    fn from(err: gcp_auth::Error) -> Self {
        BqError::auth(err.to_string())
    }
}

/// Result type alias for BigQuery operations.
pub type BqResult<T> = Result<T, BqError>;

/// Convert BqError to MCP ErrorData for semantic error categorization.
impl From<BqError> for rmcp::ErrorData {
    fn from(err: BqError) -> Self {
        match &err {
            BqError::InvalidInput { .. } | BqError::Conversion { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), None)
            }
            BqError::Configuration { .. } => {
                rmcp::ErrorData::invalid_request(err.to_string(), None)
            }
            BqError::Upstream { status, .. } => rmcp::ErrorData::internal_error(
                err.to_string(),
                status.map(|code| serde_json::json!({ "status": code })),
            ),
            BqError::Auth { .. } | BqError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), None)
            }
        }
    }
}
