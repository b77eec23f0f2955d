//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// The four variants drive four different caller behaviors: validation
/// errors send the user back to the offending input, remote errors may be
/// retried by re-invoking the same operation, not-found errors abort the
/// current flow, and malformed responses are remote "successes" that violate
/// the expected contract and are treated as failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoryError {
    /// Local input validation failed; the user must edit the named field.
    #[error("validation failed on {field}: {message}")]
    Validation {
        /// The input field the message should be attached to.
        field: &'static str,
        /// Human-readable message for the presentation layer.
        message: String,
    },

    /// Network or backend failure. Retryable by re-invoking the operation.
    #[error("remote error: {0}")]
    Remote(String),

    /// A referenced entity no longer exists upstream. Fatal to the flow.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. "board" or "scene".
        entity: &'static str,
        /// The raw identifier that failed to resolve.
        id: i64,
    },

    /// The remote reported success but the response violates the contract,
    /// e.g. a generated chapter with an empty title.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl StoryError {
    /// Shorthand for a field-keyed validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns true when re-invoking the failed operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}
