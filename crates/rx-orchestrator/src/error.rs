use thiserror::Error;

/// Failures of an orchestration step. Each one is also surfaced to the
/// operator as a [`Notice`](crate::notice::Notice).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// Missing or invalid operator input, e.g. no repository URL.
    #[error("configuration required: {0}")]
    Configuration(String),

    /// The action was refused because conflicting work is in flight.
    #[error("busy: {0}")]
    ConcurrencyGuard(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("submission failed: {0}")]
    Submission(String),

    /// The completion worker reported a failure for the tracked request.
    #[error("AI request failed: {0}")]
    AsyncResultFailure(String),

    /// The change feed for the tracked request broke.
    #[error("subscription channel error: {0}")]
    Channel(String),

    #[error("staging failed: {0}")]
    Staging(String),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
