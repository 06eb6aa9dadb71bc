use cash_common::domain::DocumentParseResult;
use cash_common::error::{ErrorKind, ErrorKindExt};

#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    #[error("extractor tier {0:?} is unavailable: {1}")]
    TierUnavailable(cash_common::domain::ExtractorTierKind, String),
    /// Carries the last tier's result so callers can still use its
    /// below-threshold candidates (spec §4.1/§7 partial results).
    #[error("all extractor tiers failed")]
    AllTiersUnavailable(DocumentParseResult),
    #[error("request timed out after {0} attempt(s)")]
    Timeout(u32),
}

impl ErrorKindExt for ExtractorError {
    fn kind(&self) -> ErrorKind {
        match self {
            ExtractorError::TierUnavailable(..) => ErrorKind::ExtractorUnavailable,
            ExtractorError::AllTiersUnavailable(_) => ErrorKind::ExtractorUnavailable,
            ExtractorError::Timeout(_) => ErrorKind::ExtractorUnavailable,
        }
    }
}
