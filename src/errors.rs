//! Error types for the stockbridge broker
//!
//! Only `InvalidInput` and exhausted-fallback provider failures propagate to
//! callers. Budget denials and oversize results are absorbed internally and
//! surface as metadata on an otherwise successful response.

use thiserror::Error;

/// Which rolling rate window rejected an admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// Short window (per minute)
    Minute,
    /// Long window (per day)
    Day,
}

impl std::fmt::Display for WindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowKind::Minute => write!(f, "minute"),
            WindowKind::Day => write!(f, "day"),
        }
    }
}

/// Main error type for broker operations
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Malformed request parameters, surfaced immediately and never retried
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A rolling window limit would be breached; routed to fallback, never raw
    #[error("Call budget exceeded in {window} window, retry in {retry_after_secs}s")]
    BudgetExceeded {
        window: WindowKind,
        retry_after_secs: u64,
    },

    /// The provider itself rejected the call for rate-limit reasons
    #[error("Provider reported rate limit: {0}")]
    ProviderRateLimited(String),

    /// Network, timeout, or non-rate-limit provider error
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Request state machine was driven with an impossible event
    #[error("Invalid state transition from {from:?} via {event:?}")]
    InvalidTransition { from: String, event: String },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Backing store errors
    #[error("Store error: {0}")]
    StoreError(String),

    /// Operation timed out
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

/// Result type alias for broker operations
pub type Result<T> = std::result::Result<T, BrokerError>;

impl From<anyhow::Error> for BrokerError {
    fn from(err: anyhow::Error) -> Self {
        BrokerError::ConfigError(err.to_string())
    }
}

impl BrokerError {
    /// True for errors that may be retried against the provider
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::ProviderUnavailable(_)
                | BrokerError::HttpError(_)
                | BrokerError::Timeout { .. }
        )
    }

    /// True when the error should be absorbed by the fallback path rather
    /// than surfaced to the caller
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            BrokerError::BudgetExceeded { .. }
                | BrokerError::ProviderRateLimited(_)
                | BrokerError::ProviderUnavailable(_)
                | BrokerError::HttpError(_)
                | BrokerError::Timeout { .. }
        )
    }
}
