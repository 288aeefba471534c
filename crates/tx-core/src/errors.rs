//! The kernel's tagged error enum.
//!
//! Repositories (`tx_db`) surface storage failures as raw `sqlx::Error`;
//! services translate those into one of the domain tags below at the
//! boundary, never passing a bare `sqlx::Error` through to a caller except
//! wrapped in [`Error::Database`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("learning not found: {0}")]
    LearningNotFound(String),

    #[error("learning not found for file: {0}")]
    FileLearningNotFound(String),

    #[error("attempt not found: {0}")]
    AttemptNotFound(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("adding this dependency would create a cycle through task {0}")]
    CircularDependency(String),

    #[error("invalid transition {from} -> {to} for task {task_id}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },

    #[error("dependency not found: {blocker_id} -> {blocked_id}")]
    DependencyNotFound { blocker_id: String, blocked_id: String },

    #[error("expected {expected} affected rows, got {actual}")]
    UnexpectedRowCount { expected: u64, actual: u64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("embedding capability unavailable")]
    EmbeddingUnavailable,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },

    #[error("learning edge not found: {0}")]
    EdgeNotFound(i64),

    #[error("anchor not found: {0}")]
    AnchorNotFound(String),

    #[error("candidate not found: {0}")]
    CandidateNotFound(String),

    #[error("extraction capability unavailable")]
    ExtractionUnavailable,

    #[error("reranker capability unavailable")]
    RerankerUnavailable,

    #[error("retrieval error: {0}")]
    RetrievalError(String),

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("worker not found: {0}")]
    WorkerNotFound(String),

    #[error("worker registration error: {0}")]
    RegistrationError(String),

    #[error("task {task_id} is already claimed by worker {claimed_by_worker_id}")]
    AlreadyClaimed {
        task_id: String,
        claimed_by_worker_id: String,
    },

    #[error("claim not found for task {0}")]
    ClaimNotFound(String),

    #[error("claim id not found: {0}")]
    ClaimIdNotFound(i64),

    #[error("lease expired for claim {0}")]
    LeaseExpired(i64),

    #[error("claim {0} has exceeded the maximum number of renewals")]
    MaxRenewalsExceeded(i64),

    #[error("orchestrator error: {0}")]
    OrchestratorError(String),

    #[error("file watcher error: {0}")]
    FileWatcherError(String),

    #[error("file watcher is already running")]
    WatcherAlreadyRunning,

    #[error("file watcher is not running")]
    WatcherNotRunning,

    #[error("message {0} is already acked")]
    MessageAlreadyAcked(i64),
}

impl Error {
    /// Stable machine-readable tag for JSON-mode's `{error:{code, message}}`.
    pub fn code(&self) -> &'static str {
        match self {
            Error::TaskNotFound(_) => "TaskNotFound",
            Error::LearningNotFound(_) => "LearningNotFound",
            Error::FileLearningNotFound(_) => "FileLearningNotFound",
            Error::AttemptNotFound(_) => "AttemptNotFound",
            Error::ValidationError(_) => "ValidationError",
            Error::CircularDependency(_) => "CircularDependency",
            Error::InvalidTransition { .. } => "InvalidTransition",
            Error::DependencyNotFound { .. } => "DependencyNotFound",
            Error::UnexpectedRowCount { .. } => "UnexpectedRowCount",
            Error::Database(_) => "DatabaseError",
            Error::EmbeddingUnavailable => "EmbeddingUnavailable",
            Error::EmbeddingDimensionMismatch { .. } => "EmbeddingDimensionMismatch",
            Error::EdgeNotFound(_) => "EdgeNotFound",
            Error::AnchorNotFound(_) => "AnchorNotFound",
            Error::CandidateNotFound(_) => "CandidateNotFound",
            Error::ExtractionUnavailable => "ExtractionUnavailable",
            Error::RerankerUnavailable => "RerankerUnavailable",
            Error::RetrievalError(_) => "RetrievalError",
            Error::RunNotFound(_) => "RunNotFound",
            Error::WorkerNotFound(_) => "WorkerNotFound",
            Error::RegistrationError(_) => "RegistrationError",
            Error::AlreadyClaimed { .. } => "AlreadyClaimed",
            Error::ClaimNotFound(_) => "ClaimNotFound",
            Error::ClaimIdNotFound(_) => "ClaimIdNotFound",
            Error::LeaseExpired(_) => "LeaseExpired",
            Error::MaxRenewalsExceeded(_) => "MaxRenewalsExceeded",
            Error::OrchestratorError(_) => "OrchestratorError",
            Error::FileWatcherError(_) => "FileWatcherError",
            Error::WatcherAlreadyRunning => "WatcherAlreadyRunning",
            Error::WatcherNotRunning => "WatcherNotRunning",
            Error::MessageAlreadyAcked(_) => "MessageAlreadyAcked",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Map a `get_task`-style lookup miss to `TaskNotFound` instead of letting
/// a bare `None` propagate; used at service boundaries after repository
/// calls that return `Option<T>`.
pub fn task_not_found(id: &str) -> Error {
    Error::TaskNotFound(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_stable_per_variant() {
        assert_eq!(Error::TaskNotFound("t1".into()).code(), "TaskNotFound");
        assert_eq!(
            Error::AlreadyClaimed {
                task_id: "t1".into(),
                claimed_by_worker_id: "w1".into()
            }
            .code(),
            "AlreadyClaimed"
        );
    }

    #[test]
    fn database_error_wraps_sqlx_error() {
        let sqlx_err = sqlx::Error::RowNotFound;
        let err: Error = sqlx_err.into();
        assert_eq!(err.code(), "DatabaseError");
    }
}
