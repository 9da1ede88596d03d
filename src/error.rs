use thiserror::Error;

/// Errors produced by the marking pipeline.
///
/// Each variant maps to one failure class with its own handling policy:
/// input and config errors abort before any backend call, backend
/// unavailability is retried with backoff before surfacing, rejections and
/// malformed replies surface immediately, and persistence failures are
/// reported without discarding the grading result.
#[derive(Debug, Error)]
pub enum MarkError {
    /// An uploaded page could not be read or decoded. Raised before any
    /// backend call is made.
    #[error("unreadable page {ordinal}: {reason}")]
    Input { ordinal: usize, reason: String },

    /// Deployment misconfiguration: missing credential, unresolvable answer
    /// key, unsupported model. Fatal for the run, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transient backend failure (timeout, rate limit, server error) that
    /// exhausted its retry budget.
    #[error("backend unavailable after {attempts} attempts: {reason}")]
    BackendUnavailable { attempts: u32, reason: String },

    /// The backend rejected a well-formed request outright. Retrying an
    /// invalid request cannot succeed, so this surfaces immediately.
    #[error("backend rejected request ({status}): {reason}")]
    ModelRejected { status: u16, reason: String },

    /// The backend reply envelope could not be decoded into text at all.
    /// Replies that decode but fail the strict shape are not errors: they
    /// come back as results flagged invalid, feedback intact.
    #[error("malformed backend reply: {reason}")]
    ResponseFormat { reason: String },

    /// The gradebook store could not be read or written. The grading result
    /// itself is still valid and must be shown to the caller.
    #[error("gradebook store: {0}")]
    Persistence(#[source] std::io::Error),
}

impl MarkError {
    /// Whether the underlying backend failure is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarkError::BackendUnavailable { .. })
    }
}
