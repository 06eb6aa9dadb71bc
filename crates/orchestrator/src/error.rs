use audit_store::error::AuditError;
use cash_common::error::{ErrorKind, ErrorKindExt};
use communicator::CommunicatorError;
use erp_facade::ErpError;
use extractor::ExtractorError;
use matcher::MatchError;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid transaction: {0}")]
    Validation(String),
    #[error("at capacity: max_concurrent_transactions reached")]
    Busy,
    #[error("no such workflow: {0}")]
    NotFound(String),
    #[error("workflow {0} is already terminal")]
    AlreadyTerminal(String),
    #[error("workflow cancelled")]
    Cancelled,
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error(transparent)]
    Extractor(#[from] ExtractorError),
    #[error(transparent)]
    Erp(#[from] ErpError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Communicator(#[from] CommunicatorError),
}

impl ErrorKindExt for OrchestratorError {
    fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::Validation(_) => ErrorKind::ValidationError,
            OrchestratorError::Busy => ErrorKind::ErpTransient,
            OrchestratorError::NotFound(_) => ErrorKind::ValidationError,
            OrchestratorError::AlreadyTerminal(_) => ErrorKind::ValidationError,
            OrchestratorError::Cancelled => ErrorKind::Cancelled,
            OrchestratorError::Audit(e) => e.kind(),
            OrchestratorError::Extractor(e) => e.kind(),
            OrchestratorError::Erp(e) => e.kind(),
            OrchestratorError::Match(e) => e.kind(),
            OrchestratorError::Communicator(e) => e.kind(),
        }
    }
}
