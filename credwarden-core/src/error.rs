//! Core error types for `credwarden`.

use thiserror::Error;

/// Core error type for `credwarden` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unrecognized failure reason keyword.
    #[error("Unknown failure reason: {0}")]
    UnknownFailureReason(String),

    /// Unrecognized billing recovery mode.
    #[error("Unknown billing recovery mode: {0}")]
    UnknownRecoveryMode(String),

    /// Model reference that is not of the form `provider/model`.
    #[error("Invalid model reference: {0}")]
    InvalidModelRef(String),

    /// The model catalog could not be listed.
    #[error("Model catalog unavailable: {0}")]
    CatalogUnavailable(String),
}
