use async_trait::async_trait;
use cash_common::domain::{
    AuditEvent, CommunicationEvent, InvoicePaymentMatch, MatchResult, PaymentTransaction,
    ProcessingStatus, WorkflowHandle,
};
use cash_common::ids::{TransactionId, WorkflowId};

use crate::error::AuditError;

/// Outcome of `ClaimTransaction`, spec §4.6. `claimed=false` means a prior
/// claim already exists; the caller gets back the existing workflow so
/// `StartWorkflow` replay (spec §4.4, S8) returns the same id.
#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub claimed: bool,
    pub existing_status: ProcessingStatus,
    pub workflow_id: WorkflowId,
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub transaction_id: Option<TransactionId>,
    pub event_type: Option<String>,
    pub since_seq: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub status: Option<ProcessingStatus>,
    pub source_account_ref: Option<String>,
    pub limit: Option<i64>,
}

/// A not-yet-sequenced audit entry; `AppendAudit` assigns `seq`/`ts`.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub event_type: String,
    pub source: String,
    pub correlation_id: String,
    pub transaction_id: Option<TransactionId>,
    pub data: serde_json::Value,
}

/// The Audit Store contract, spec §4.6. Guarantees: serializable isolation
/// on `claim_transaction`/`record_match`; `audit_log` rows are never
/// deleted or updated once appended.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn claim_transaction(
        &self,
        txn: &PaymentTransaction,
    ) -> Result<ClaimOutcome, AuditError>;

    async fn record_match(
        &self,
        result: &MatchResult,
        matches: &[InvoicePaymentMatch],
    ) -> Result<(), AuditError>;

    async fn record_communication(&self, event: &CommunicationEvent) -> Result<(), AuditError>;

    async fn append_audit(&self, event: NewAuditEvent) -> Result<i64, AuditError>;

    async fn query_audit(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError>;

    async fn query_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<PaymentTransaction>, AuditError>;

    async fn finalize_transaction(
        &self,
        transaction_id: &TransactionId,
        status: ProcessingStatus,
    ) -> Result<(), AuditError>;

    async fn get_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Option<WorkflowHandle>, AuditError>;

    /// In-flight workflows not yet Finalized, for crash-recovery
    /// reconciliation at Orchestrator startup (spec §7: "on restart, the
    /// Orchestrator reconciles any in-flight workflows").
    async fn list_unfinalized(&self) -> Result<Vec<PaymentTransaction>, AuditError>;
}
