use cash_common::error::{ErrorKind, ErrorKindExt};

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("transaction {0} already claimed")]
    AlreadyClaimed(String),
    #[error("storage backend error: {0}")]
    Backend(#[from] anyhow::Error),
    #[error("match result invariant violated: {0}")]
    InvariantViolation(String),
    #[error("no such workflow: {0}")]
    NotFound(String),
}

impl ErrorKindExt for AuditError {
    fn kind(&self) -> ErrorKind {
        match self {
            AuditError::AlreadyClaimed(_) => ErrorKind::ConcurrencyConflict,
            AuditError::Backend(_) => ErrorKind::ErpTransient,
            AuditError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            AuditError::NotFound(_) => ErrorKind::ValidationError,
        }
    }
}
