use cash_common::error::{ErrorKind, ErrorKindExt};

#[derive(Debug, thiserror::Error)]
pub enum CommunicatorError {
    #[error("template '{0}' is not registered")]
    TemplateNotFound(String),
    #[error("template '{template}' is missing required field '{field}'")]
    MissingField { template: String, field: String },
    #[error("rate limit exceeded for recipient '{0}'")]
    RateLimited(String),
    #[error("transport delivery failed: {0}")]
    TransportFailed(String),
}

impl ErrorKindExt for CommunicatorError {
    fn kind(&self) -> ErrorKind {
        match self {
            CommunicatorError::TemplateNotFound(_) => ErrorKind::ValidationError,
            CommunicatorError::MissingField { .. } => ErrorKind::ValidationError,
            CommunicatorError::RateLimited(_) => ErrorKind::ErpTransient,
            CommunicatorError::TransportFailed(_) => ErrorKind::ErpTransient,
        }
    }
}
