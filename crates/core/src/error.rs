//! Error types for the switchyard domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; [`DispatchError`] is the
//! only one that ever reaches a caller of the turn pipeline.

use thiserror::Error;

use crate::turn::SessionId;

/// The turn-level error: everything that can end a turn without a normal reply.
///
/// Context-fetch and delegation failures are deliberately absent: both are
/// recovered inside the dispatcher and degrade to a best-effort reply.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// The overall turn deadline passed. Side effects that already
    /// happened (a delegated call, for instance) are not rolled back.
    #[error("Turn for session {session_id} timed out after {after_secs}s")]
    Timeout { session_id: SessionId, after_secs: u64 },
}

impl DispatchError {
    /// Whether the failure was caused by the caller (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(self, DispatchError::Input(_))
    }
}

// --- Bounded context errors ---

/// Rejections raised before any side effect happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("the 'message' field must not be empty")]
    EmptyMessage,

    #[error("the 'session_id' field must be a non-negative integer (got {0})")]
    InvalidSessionId(i64),

    #[error("the 'tenant_config.tenant_id' field must be greater than 0 (got {0})")]
    InvalidTenantId(i64),
}

/// Typed failures of the intent classifier. Always fatal for the turn.
#[derive(Debug, Clone, Error)]
pub enum ClassifierError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limited by classifier backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Could not reach classifier backend: {0}")]
    Connectivity(String),

    #[error("Classifier output did not match the expected schema: {0}")]
    MalformedOutput(String),

    #[error("Classifier request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Classifier did not answer within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Classifier not configured: {0}")]
    NotConfigured(String),
}

impl ClassifierError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClassifierError::Timeout { .. })
    }
}

/// Failures of a single capability invocation. Recovered by the dispatcher.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("Capability '{0}' has no registered handler")]
    Unavailable(String),

    #[error("Capability '{0}' is disabled or has no endpoint configured")]
    Disabled(String),

    #[error("Capability call failed: {0}")]
    Remote(String),

    #[error("Capability call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Capability returned an empty result")]
    Empty,
}

/// Failures of the business-context lookup. Recovered by the fetcher.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    #[error("Context lookup network error: {0}")]
    Network(String),

    #[error("Context lookup returned HTTP {0}")]
    Status(u16),

    #[error("Context lookup was rejected by the endpoint")]
    Rejected,

    #[error("Context lookup response could not be decoded: {0}")]
    Decode(String),

    #[error("Context lookup timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}
