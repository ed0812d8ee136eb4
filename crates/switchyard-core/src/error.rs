// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Switchyard routing engine.

use thiserror::Error;

use crate::types::ProviderErrorKind;

/// The primary error type used across Switchyard crates.
///
/// Only [`SwitchyardError::Config`] is fatal, and only at engine build time.
/// Every other variant is recovered or degraded before it can reach a caller
/// of `route()`.
#[derive(Debug, Error)]
pub enum SwitchyardError {
    /// Invalid static configuration (no providers, unknown adapter ids).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A single provider attempt failed.
    #[error("provider {provider} failed ({kind}): {message}")]
    Provider {
        provider: String,
        kind: ProviderErrorKind,
        message: String,
    },

    /// Every provider in the fallback chain failed.
    #[error("all {attempts} provider attempts failed")]
    AllProvidersFailed { attempts: usize },

    /// Malformed query input.
    #[error("classification error: {0}")]
    Classification(String),

    /// Feedback referenced a decision that was never recorded.
    #[error("unknown decision: {0}")]
    UnknownDecision(String),

    /// Satisfaction score outside [0, 1] or not a number.
    #[error("invalid feedback score: {0}")]
    InvalidFeedback(f64),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The caller cancelled the request before a response was ready.
    #[error("request cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display_names_kind() {
        let err = SwitchyardError::Provider {
            provider: "alpha".into(),
            kind: ProviderErrorKind::RateLimited,
            message: "429".into(),
        };
        assert_eq!(err.to_string(), "provider alpha failed (rate_limited): 429");
    }

    #[test]
    fn storage_error_wraps_source() {
        let err = SwitchyardError::Storage {
            source: Box::new(std::io::Error::other("disk full")),
        };
        assert!(err.to_string().contains("disk full"));
    }
}
