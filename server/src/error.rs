//! HTTP error mapping (spec §6). The teacher's `routes.rs` references a
//! crate-level `AppError` used as an axum `IntoResponse`; here it wraps
//! every component error enum and maps onto the status codes in the HTTP
//! surface table rather than a single generic 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cash_common::error::{ErrorKind, ErrorKindExt};
use erp_facade::ErpError;
use orchestrator::OrchestratorError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Extractor(#[from] extractor::ExtractorError),
    #[error(transparent)]
    Erp(#[from] erp_facade::ErpError),
    #[error(transparent)]
    Communicator(#[from] communicator::CommunicatorError),
    #[error(transparent)]
    Audit(#[from] audit_store::AuditError),
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
    kind: Option<ErrorKind>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::Orchestrator(e) => (status_for_orchestrator(e), Some(e.kind())),
            AppError::Erp(e) => (status_for_erp(e), Some(e.kind())),
            AppError::Communicator(e @ communicator::CommunicatorError::TemplateNotFound(_)) => {
                (StatusCode::NOT_FOUND, Some(e.kind()))
            }
            AppError::Communicator(e) => (status_for_kind(e.kind()), Some(e.kind())),
            AppError::Extractor(e) => (status_for_kind(e.kind()), Some(e.kind())),
            AppError::Audit(e) => (status_for_kind(e.kind()), Some(e.kind())),
        };

        let body = ErrorBody { error: self.to_string(), kind };
        (status, Json(body)).into_response()
    }
}

fn status_for_orchestrator(e: &OrchestratorError) -> StatusCode {
    match e {
        OrchestratorError::Validation(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::Busy => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::AlreadyTerminal(_) => StatusCode::CONFLICT,
        OrchestratorError::Cancelled => StatusCode::CONFLICT,
        OrchestratorError::Audit(inner) => status_for_kind(inner.kind()),
        OrchestratorError::Extractor(inner) => status_for_kind(inner.kind()),
        OrchestratorError::Erp(inner) => status_for_erp(inner),
        OrchestratorError::Match(inner) => status_for_kind(inner.kind()),
        OrchestratorError::Communicator(inner) => status_for_kind(inner.kind()),
    }
}

fn status_for_erp(e: &ErpError) -> StatusCode {
    match e {
        ErpError::DuplicatePayment(_) => StatusCode::CONFLICT,
        ErpError::UnknownErpSystem(_) => StatusCode::BAD_REQUEST,
        _ => status_for_kind(e.kind()),
    }
}

/// Generic fallback for component errors with no HTTP-specific variant of
/// their own, keyed off the shared `ErrorKind` taxonomy (spec §7).
fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::ExtractorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ErpTransient | ErrorKind::ErpPermanent | ErrorKind::ConcurrencyConflict => {
            StatusCode::BAD_GATEWAY
        }
        ErrorKind::DuplicatePayment => StatusCode::CONFLICT,
        ErrorKind::InvariantViolation => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Cancelled => StatusCode::CONFLICT,
    }
}
