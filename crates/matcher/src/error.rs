use cash_common::error::{ErrorKind, ErrorKindExt};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("matcher post-allocation invariant violated: {0}")]
    InvariantViolation(String),
}

impl ErrorKindExt for MatchError {
    fn kind(&self) -> ErrorKind {
        match self {
            MatchError::InvariantViolation(_) => ErrorKind::InvariantViolation,
        }
    }
}
