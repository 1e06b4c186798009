//! Domain error kinds.
//!
//! Library functions return `anyhow::Result`; failures that callers need to
//! tell apart (missing rows, cross-dealership access, bad input, disabled
//! providers, upstream API failures) are raised as a [`ShowroomError`] so the
//! HTTP layer can downcast them into status codes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShowroomError {
    /// A lead, conversation or inventory row does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The row exists but belongs to another dealership.
    #[error("access denied: {0}")]
    Forbidden(String),

    /// Caller-supplied input failed validation.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// An operation needs embeddings but the provider is disabled.
    #[error("embeddings are disabled: {0}")]
    EmbeddingsDisabled(String),

    /// The embedding or chat API failed after retries.
    #[error("upstream provider error: {0}")]
    Upstream(String),
}

impl ShowroomError {
    pub fn not_found(what: impl Into<String>) -> anyhow::Error {
        ShowroomError::NotFound(what.into()).into()
    }

    pub fn invalid(msg: impl Into<String>) -> anyhow::Error {
        ShowroomError::Invalid(msg.into()).into()
    }

    pub fn forbidden(msg: impl Into<String>) -> anyhow::Error {
        ShowroomError::Forbidden(msg.into()).into()
    }
}
