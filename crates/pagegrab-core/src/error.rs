use thiserror::Error;

use crate::models::Relay;

/// A single failed relay attempt, kept for the aggregate error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFailure {
    pub relay: Relay,
    pub cause: String,
}

impl std::fmt::Display for RelayFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.relay.host_label(), self.cause)
    }
}

/// Application-wide error types for pagegrab.
#[derive(Error, Debug)]
pub enum AppError {
    /// Relay answered with a non-success status or the body could not be read.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Relay attempt exceeded its deadline.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Relay returned a JSON envelope without usable `contents`.
    #[error("Invalid relay envelope: {0}")]
    InvalidEnvelope(String),

    /// Every configured relay failed. Causes are listed in priority order.
    #[error(
        "All relays failed ({}): {}. Check that the URL is valid and the site allows public access, \
         or try a different URL or enter page URLs manually.",
        tried_relays(.failures),
        joined_causes(.failures)
    )]
    AllRelaysFailed { failures: Vec<RelayFailure> },

    /// The caller abandoned the request.
    #[error("Request cancelled")]
    Cancelled,

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A chapter draft or curation edit was rejected.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Chapter persistence failed.
    #[error("Store error: {0}")]
    StoreError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

fn tried_relays(failures: &[RelayFailure]) -> String {
    failures
        .iter()
        .map(|f| f.relay.host_label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn joined_causes(failures: &[RelayFailure]) -> String {
    if failures.is_empty() {
        return "no relays configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    /// Returns true if this is a per-relay failure that the next relay may recover from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_)
                | AppError::Timeout(_)
                | AppError::NetworkError(_)
                | AppError::InvalidEnvelope(_)
        )
    }
}
