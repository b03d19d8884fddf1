//! Error taxonomy for the engine and its collaborators.
//!
//! Defined in `examrun-core` so the session engine can classify adapter
//! failures without string matching. Adapter implementations translate
//! transport-level failures into [`StoreError`] at the boundary.

use thiserror::Error;

/// Errors from the record-store collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A single record was not found. For question fetches the caller skips
    /// the record; for attempt lookups this means "no prior attempt".
    #[error("record not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// The backend rejected a write as malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The backend returned an unexpected error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The request was cancelled before completing.
    #[error("request cancelled")]
    Cancelled,
}

impl StoreError {
    /// Returns `true` when retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout(_) | StoreError::NetworkError(_) | StoreError::Cancelled
        )
    }

    /// Returns `true` for the not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Errors surfaced by the session state machine.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The supplied access code did not match the configured one. The stage
    /// stays at the gate; retries are unlimited.
    #[error("incorrect access code")]
    AccessDenied,

    /// `begin` was called while the gate is still closed.
    #[error("access code required before starting")]
    GateClosed,

    /// The test resolved to zero questions; the session fails closed.
    #[error("no questions available for this session")]
    NoQuestions,

    /// A collaborator call failed. For submission writes the session stays
    /// resumable and the ledger is kept intact.
    #[error(transparent)]
    Store(#[from] StoreError),
}
