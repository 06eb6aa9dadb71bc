//! Core entities shared across every component, per spec §3. The Audit
//! Store is the only component that persists these; everyone else holds
//! transient in-memory views.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::{CustomerId, ErpSystem, InvoiceId, TransactionId, WorkflowId};
use crate::money::{Currency, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Matched,
    PartiallyMatched,
    Unmatched,
    RequiresReview,
    Error,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ProcessingStatus::Pending | ProcessingStatus::Processing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Open,
    Closed,
    Disputed,
    Overdue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyCode {
    ShortPayment,
    OverPayment,
    InvalidInvoice,
    CurrencyMismatch,
    DuplicatePayment,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorTierKind {
    Pattern,
    Layout,
    Cloud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierPreference {
    Auto,
    Pattern,
    Layout,
    Cloud,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationKind {
    CustomerClarification,
    InternalAlert,
    Confirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Queued,
    Sent,
    Delivered,
    Failed,
}

/// An incoming bank payment, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub transaction_id: TransactionId,
    pub source_account_ref: String,
    pub amount: Money,
    pub currency: Currency,
    #[serde(with = "time::serde::rfc3339")]
    pub value_date: OffsetDateTime,
    pub raw_remittance_data: String,
    pub customer_identifier: Option<CustomerId>,
    pub associated_document_uris: Vec<String>,
    pub processing_status: ProcessingStatus,
}

/// An ERP invoice snapshot. Non-authoritative: the ERP is system of record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: InvoiceId,
    pub erp_system: ErpSystem,
    pub customer_id: CustomerId,
    pub original_amount: Money,
    pub amount_due: Money,
    pub currency: Currency,
    pub status: InvoiceStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub erp_record_id: String,
    /// When this snapshot was fetched from the ERP; local copies are
    /// advisory only (spec §3 Ownership).
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

impl Invoice {
    pub fn is_amount_due_valid(&self) -> bool {
        self.amount_due.as_decimal() >= rust_decimal::Decimal::ZERO
            && self.amount_due.as_decimal() <= self.original_amount.as_decimal()
    }
}

pub const ALGORITHM_VERSION: &str = "mx-cascade-1";

/// One completed matching attempt for a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub transaction_id: TransactionId,
    pub status: ProcessingStatus,
    pub unapplied_amount: Money,
    pub discrepancy_code: DiscrepancyCode,
    pub confidence: f64,
    pub algorithm_version: String,
    pub log_entry: String,
    pub requires_human_review: bool,
    pub processing_time_ms: u64,
}

/// One invoice allocation within a `MatchResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicePaymentMatch {
    pub invoice_id: InvoiceId,
    pub erp_system: ErpSystem,
    pub amount_applied: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerDocumentResult {
    pub document_uri: String,
    pub extracted_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentParseResult {
    pub extracted_invoice_ids: Vec<String>,
    pub confidence: f64,
    pub tier_used: ExtractorTierKind,
    pub cost_estimate: f64,
    pub processing_time_ms: u64,
    pub per_document: Vec<PerDocumentResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationEvent {
    pub transaction_id: Option<TransactionId>,
    pub kind: CommunicationKind,
    pub template: String,
    pub recipient: String,
    pub payload: serde_json::Value,
    pub delivery_status: DeliveryStatus,
    pub error: Option<String>,
}

/// Append-only audit entry. `seq` is assigned by the Audit Store on
/// insertion and is strictly monotonic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub seq: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub event_type: String,
    pub source: String,
    pub correlation_id: String,
    pub transaction_id: Option<TransactionId>,
    pub data: serde_json::Value,
}

/// Handle returned by `StartWorkflow`/`GetStatus`, spec §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowHandle {
    pub workflow_id: WorkflowId,
    pub transaction_id: TransactionId,
    pub state: ProcessingStatus,
    pub result: Option<MatchResult>,
    pub error: Option<String>,
    /// False when this call found an already-claimed transaction and
    /// returned its existing workflow rather than starting a new one
    /// (spec §6: duplicate `transaction_id` answers 409 with the existing id).
    pub claimed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_status_terminality() {
        assert!(!ProcessingStatus::Pending.is_terminal());
        assert!(!ProcessingStatus::Processing.is_terminal());
        assert!(ProcessingStatus::Matched.is_terminal());
        assert!(ProcessingStatus::RequiresReview.is_terminal());
        assert!(ProcessingStatus::Error.is_terminal());
    }
}
