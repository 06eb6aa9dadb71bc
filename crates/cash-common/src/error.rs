//! Shared error taxonomy, spec §7. Each component crate defines its own
//! `thiserror` error enum for its checked error cases and implements
//! [`ErrorKindExt`] so the `server` binary can map any of them onto a
//! uniform HTTP status without match-ing on component-specific variants.

use serde::{Deserialize, Serialize};

/// Abstract error kinds, language-neutral per spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    ExtractorUnavailable,
    ErpTransient,
    ErpPermanent,
    DuplicatePayment,
    ConcurrencyConflict,
    InvariantViolation,
    Cancelled,
}

impl ErrorKind {
    /// Whether the Orchestrator should retry the step in place rather than
    /// surface a terminal workflow outcome (spec §7 propagation policy).
    pub fn is_retryable_in_step(self) -> bool {
        matches!(self, ErrorKind::ErpTransient | ErrorKind::ConcurrencyConflict)
    }

    /// Whether this business outcome should be treated as success rather
    /// than an error path (spec §7: "ERP reports already-applied" is
    /// treated as success; the prior posting is returned).
    pub fn is_treated_as_success(self) -> bool {
        matches!(self, ErrorKind::DuplicatePayment)
    }
}

/// Implemented by every component's error enum so callers can classify an
/// error without depending on that crate's concrete variants.
pub trait ErrorKindExt {
    fn kind(&self) -> ErrorKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_and_conflict_retry_in_step() {
        for kind in [
            ErrorKind::ValidationError,
            ErrorKind::ExtractorUnavailable,
            ErrorKind::ErpPermanent,
            ErrorKind::DuplicatePayment,
            ErrorKind::InvariantViolation,
            ErrorKind::Cancelled,
        ] {
            assert!(!kind.is_retryable_in_step());
        }
        assert!(ErrorKind::ErpTransient.is_retryable_in_step());
        assert!(ErrorKind::ConcurrencyConflict.is_retryable_in_step());
    }
}
