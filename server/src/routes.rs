//! HTTP surface (spec §6), routes mapped 1:1 onto the control-plane table.
//! Same `Router`/`State`/`with_state` shape as the teacher's
//! `coordinator::routes::router`.

use std::sync::Arc;

use audit_store::AuditStore;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use cash_common::domain::{CommunicationKind, DocumentParseResult, Invoice, TierPreference};
use cash_common::ids::{CustomerId, ErpSystem, InvoiceId, WorkflowId};
use cash_common::money::{Currency, Money};
use cash_common::{PaymentTransaction, WorkflowHandle};
use communicator::DispatchRequest;
use erp_facade::{Application, ConnectionStatus, FetchOutcome, InvoiceApplication, PostOutcome};
use extractor::ExtractRequest;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/workflows/cash-application/start", post(start_workflow))
        .route("/workflows/:id", get(get_workflow))
        .route("/workflows/:id/cancel", post(cancel_workflow))
        .route("/extract", post(extract))
        .route("/invoices/fetch", post(fetch_invoices))
        .route("/applications", post(post_application))
        .route("/erp/:system/test", get(test_erp_connection))
        .route("/notifications", post(dispatch_notification))
        .route("/health", get(health))
        .with_state(state)
}

fn parse_workflow_id(raw: &str) -> Result<WorkflowId, AppError> {
    uuid::Uuid::parse_str(raw)
        .map(WorkflowId)
        .map_err(|e| AppError::BadRequest(format!("'{raw}' is not a valid workflow id: {e}")))
}

#[derive(Serialize)]
struct StartWorkflowResponse {
    workflow_id: WorkflowId,
    status: &'static str,
}

async fn start_workflow(
    State(state): State<Arc<AppState>>,
    Json(txn): Json<PaymentTransaction>,
) -> Result<(StatusCode, Json<StartWorkflowResponse>), AppError> {
    let handle = state.orchestrator.start_workflow(txn).await?;
    if !handle.claimed {
        return Ok((
            StatusCode::CONFLICT,
            Json(StartWorkflowResponse { workflow_id: handle.workflow_id, status: "duplicate" }),
        ));
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(StartWorkflowResponse { workflow_id: handle.workflow_id, status: "accepted" }),
    ))
}

async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowHandle>, AppError> {
    let workflow_id = parse_workflow_id(&id)?;
    let handle = state.orchestrator.get_status(&workflow_id).await?;
    Ok(Json(handle))
}

async fn cancel_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let workflow_id = parse_workflow_id(&id)?;
    state.orchestrator.cancel(&workflow_id).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
struct ExtractRequestBody {
    document_uris: Vec<String>,
    remittance_text: String,
    client_id: String,
    tier_preference: Option<TierPreference>,
    confidence_threshold: Option<f64>,
}

async fn extract(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExtractRequestBody>,
) -> Result<Json<DocumentParseResult>, AppError> {
    let request = ExtractRequest {
        document_uris: body.document_uris,
        remittance_text: body.remittance_text,
        client_id: body.client_id,
        tier_preference: body.tier_preference.unwrap_or(TierPreference::Auto),
        confidence_threshold: body.confidence_threshold.unwrap_or(0.85),
    };
    let result = state.extractor.extract(request).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
struct FetchInvoicesBody {
    invoice_ids: Vec<String>,
    erp_system: String,
    customer_id: Option<String>,
}

#[derive(Serialize)]
struct FetchInvoicesResponse {
    invoices: Vec<Invoice>,
    not_found: Vec<InvoiceId>,
}

async fn fetch_invoices(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FetchInvoicesBody>,
) -> Result<Json<FetchInvoicesResponse>, AppError> {
    let ids: Vec<InvoiceId> = body.invoice_ids.into_iter().map(InvoiceId::new).collect();
    let erp_system = ErpSystem::new(body.erp_system);
    let customer_id = body.customer_id.map(CustomerId::new);
    let FetchOutcome { invoices, not_found } =
        state.erp_facade.fetch_invoices(&ids, &erp_system, customer_id.as_ref()).await?;
    Ok(Json(FetchInvoicesResponse { invoices, not_found }))
}

#[derive(Deserialize)]
struct InvoiceApplicationBody {
    invoice_id: String,
    amount_applied: Money,
}

#[derive(Deserialize)]
struct PostApplicationBody {
    transaction_id: String,
    customer_id: String,
    applications: Vec<InvoiceApplicationBody>,
    total_amount: Money,
    currency: Currency,
    erp_system: String,
}

#[derive(Serialize)]
struct PostApplicationResponse {
    erp_transaction_id: String,
}

async fn post_application(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PostApplicationBody>,
) -> Result<Json<PostApplicationResponse>, AppError> {
    let erp_system = ErpSystem::new(body.erp_system);
    let application = Application {
        transaction_id: body.transaction_id,
        customer_id: CustomerId::new(body.customer_id),
        applications: body
            .applications
            .into_iter()
            .map(|a| InvoiceApplication { invoice_id: InvoiceId::new(a.invoice_id), amount_applied: a.amount_applied })
            .collect(),
        total_amount: body.total_amount,
        currency: body.currency,
    };
    let PostOutcome { erp_transaction_id, .. } =
        state.erp_facade.post_application(&application, &erp_system).await?;
    Ok(Json(PostApplicationResponse { erp_transaction_id }))
}

async fn test_erp_connection(
    State(state): State<Arc<AppState>>,
    Path(system): Path<String>,
) -> Result<Json<ConnectionStatus>, AppError> {
    let status = state.erp_facade.test_connection(&ErpSystem::new(system)).await?;
    Ok(Json(status))
}

#[derive(Deserialize)]
struct NotificationBody {
    transaction_id: Option<String>,
    kind: CommunicationKind,
    recipient: String,
    template_name: String,
    data: serde_json::Value,
}

#[derive(Serialize)]
struct NotificationResponse {
    delivery_id: uuid::Uuid,
}

async fn dispatch_notification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NotificationBody>,
) -> Result<(StatusCode, Json<NotificationResponse>), AppError> {
    let request = DispatchRequest {
        transaction_id: body.transaction_id.map(cash_common::ids::TransactionId::new),
        kind: body.kind,
        recipient: body.recipient,
        template_name: body.template_name,
        data: body.data,
    };
    let outcome = state.communicator.dispatch(request).await?;
    Ok((StatusCode::ACCEPTED, Json(NotificationResponse { delivery_id: outcome.delivery_id })))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.audit.list_unfinalized().await {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))),
        Err(e) => {
            tracing::warn!(error = %e, "health check: audit store unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({"status": "unavailable"})))
        }
    }
}
