use thiserror::Error;

/// Result type for orchestrator core operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Stable error taxonomy (the contract with API clients and robots).
///
/// Each variant maps to exactly one retry policy: everything except
/// `Transient` is not retried by the caller automatically.
#[derive(Error, Debug, Clone)]
pub enum OrchestratorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("stale lease")]
    StaleLease,

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl OrchestratorError {
    /// Whether a caller should retry this error with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// The stable taxonomy name used in logs and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::StaleLease => "stale_lease",
            Self::PreconditionFailed(_) => "precondition_failed",
            Self::Transient(_) => "transient",
            Self::Permanent(_) => "permanent",
        }
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

/// The retry hint a robot attaches when calling `fail`.
///
/// Ambiguous failures default to retryable, per the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureHint {
    #[default]
    Retryable,
    Permanent,
}

impl FailureHint {
    pub fn from_permanent_flag(permanent: bool) -> Self {
        if permanent {
            Self::Permanent
        } else {
            Self::Retryable
        }
    }

    pub fn is_permanent(self) -> bool {
        matches!(self, Self::Permanent)
    }
}
