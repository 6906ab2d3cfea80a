//! Error types for clampr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::http::Method;

/// All error types that can occur while talking to SDC and CLAMP
#[derive(Debug, Error)]
pub enum ClampError {
    /// No service with that name in the SDC catalog
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// Remote API answered with a non-success status
    #[error("[{action}] API error {status}: {body}")]
    Api { action: String, status: u16, body: String },

    /// Network/transport error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Loop instance creation did not produce a usable loop
    #[error("Couldn't create loop instance: {0}")]
    LoopCreation(String),

    /// Operational policy attach did not add a record
    #[error("Couldn't add operational policy {policy_type}/{version} to {loop_name}")]
    PolicyNotAttached {
        loop_name: String,
        policy_type: String,
        version: String,
    },

    /// Loop still present after a failed delete
    #[error("Couldn't delete loop {loop_name}: {reason}")]
    DeleteFailed { loop_name: String, reason: String },

    /// Certificate material could not be loaded
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Payload template failed to render
    #[error("Template error: {0}")]
    Template(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClampError {
    /// Whether the transport may send a `method` request again after this error.
    ///
    /// Only connection-level failures qualify: a connect failure for any
    /// method, a timeout for idempotent ones. HTTP statuses are never retried.
    pub fn is_retryable(&self, method: Method) -> bool {
        match self {
            ClampError::Network(e) => e.is_connect() || (e.is_timeout() && method.is_idempotent()),
            _ => false,
        }
    }

    /// HTTP status carried by an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            ClampError::Api { status, .. } => Some(*status),
            ClampError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for clampr operations
pub type Result<T> = std::result::Result<T, ClampError>;
