use cash_common::error::{ErrorKind, ErrorKindExt};

#[derive(Debug, thiserror::Error)]
pub enum ErpError {
    #[error("erp system '{0}' is not configured")]
    UnknownErpSystem(String),
    #[error("transient erp error: {0}")]
    Transient(String),
    #[error("permanent erp error: {0}")]
    Permanent(String),
    #[error("payment already applied: erp_transaction_id={0}")]
    DuplicatePayment(String),
    #[error("lost a concurrency race against another posting for the same customer")]
    ConcurrencyConflict,
}

impl ErrorKindExt for ErpError {
    fn kind(&self) -> ErrorKind {
        match self {
            ErpError::UnknownErpSystem(_) => ErrorKind::ValidationError,
            ErpError::Transient(_) => ErrorKind::ErpTransient,
            ErpError::Permanent(_) => ErrorKind::ErpPermanent,
            ErpError::DuplicatePayment(_) => ErrorKind::DuplicatePayment,
            ErpError::ConcurrencyConflict => ErrorKind::ConcurrencyConflict,
        }
    }
}
