//! Diesel row types and their conversions to/from `cash_common::domain`
//! types. Grounded on the teacher's `DlcChannelState`
//! (`#[derive(FromSqlRow, AsExpression)]` custom enum column) in
//! `coordinator/src/db/dlc_channels.rs`; here every enum is instead stored
//! as a plain `Text` column with `Display`/`FromStr`-style mapping at the
//! model boundary, which keeps the schema free of Postgres `CREATE TYPE`
//! migrations this exercise does not ship.

use diesel::prelude::*;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

use cash_common::domain::{
    CommunicationEvent as DomainCommunicationEvent, CommunicationKind, DeliveryStatus,
    DiscrepancyCode, Invoice as DomainInvoice, InvoiceStatus, MatchResult as DomainMatchResult,
    PaymentTransaction as DomainPaymentTransaction, ProcessingStatus,
};
use cash_common::ids::{CustomerId, ErpSystem, InvoiceId, TransactionId, WorkflowId};
use cash_common::money::{Currency, Money};

use crate::schema::{
    audit_log, communication_events, invoice_payment_matches, invoices, match_results,
    transactions,
};

pub(crate) fn status_str(s: ProcessingStatus) -> &'static str {
    match s {
        ProcessingStatus::Pending => "pending",
        ProcessingStatus::Processing => "processing",
        ProcessingStatus::Matched => "matched",
        ProcessingStatus::PartiallyMatched => "partially_matched",
        ProcessingStatus::Unmatched => "unmatched",
        ProcessingStatus::RequiresReview => "requires_review",
        ProcessingStatus::Error => "error",
    }
}

pub(crate) fn parse_status(s: &str) -> Result<ProcessingStatus, String> {
    Ok(match s {
        "pending" => ProcessingStatus::Pending,
        "processing" => ProcessingStatus::Processing,
        "matched" => ProcessingStatus::Matched,
        "partially_matched" => ProcessingStatus::PartiallyMatched,
        "unmatched" => ProcessingStatus::Unmatched,
        "requires_review" => ProcessingStatus::RequiresReview,
        "error" => ProcessingStatus::Error,
        other => return Err(format!("unknown processing_status '{other}'")),
    })
}

fn discrepancy_str(d: DiscrepancyCode) -> &'static str {
    match d {
        DiscrepancyCode::ShortPayment => "short_payment",
        DiscrepancyCode::OverPayment => "over_payment",
        DiscrepancyCode::InvalidInvoice => "invalid_invoice",
        DiscrepancyCode::CurrencyMismatch => "currency_mismatch",
        DiscrepancyCode::DuplicatePayment => "duplicate_payment",
        DiscrepancyCode::None => "none",
    }
}

fn parse_discrepancy(s: &str) -> Result<DiscrepancyCode, String> {
    Ok(match s {
        "short_payment" => DiscrepancyCode::ShortPayment,
        "over_payment" => DiscrepancyCode::OverPayment,
        "invalid_invoice" => DiscrepancyCode::InvalidInvoice,
        "currency_mismatch" => DiscrepancyCode::CurrencyMismatch,
        "duplicate_payment" => DiscrepancyCode::DuplicatePayment,
        "none" => DiscrepancyCode::None,
        other => return Err(format!("unknown discrepancy_code '{other}'")),
    })
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = transactions)]
pub struct TransactionRow {
    pub transaction_id: String,
    pub source_account_ref: String,
    pub amount: Decimal,
    pub currency: String,
    pub value_date: OffsetDateTime,
    pub raw_remittance_data: String,
    pub customer_identifier: Option<String>,
    pub associated_document_uris: Vec<String>,
    pub status: String,
    pub workflow_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub processed_at: Option<OffsetDateTime>,
}

impl TransactionRow {
    pub fn from_domain(
        txn: &DomainPaymentTransaction,
        workflow_id: WorkflowId,
        now: OffsetDateTime,
    ) -> Self {
        TransactionRow {
            transaction_id: txn.transaction_id.as_str().to_owned(),
            source_account_ref: txn.source_account_ref.clone(),
            amount: txn.amount.as_decimal(),
            currency: txn.currency.to_string(),
            value_date: txn.value_date,
            raw_remittance_data: txn.raw_remittance_data.clone(),
            customer_identifier: txn.customer_identifier.as_ref().map(|c| c.to_string()),
            associated_document_uris: txn.associated_document_uris.clone(),
            status: status_str(txn.processing_status).to_owned(),
            workflow_id: workflow_id.0,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    pub fn into_domain(self) -> Result<DomainPaymentTransaction, String> {
        Ok(DomainPaymentTransaction {
            transaction_id: TransactionId::new(self.transaction_id),
            source_account_ref: self.source_account_ref,
            amount: Money::new(self.amount),
            currency: Currency::parse(&self.currency).map_err(|e| e.to_string())?,
            value_date: self.value_date,
            raw_remittance_data: self.raw_remittance_data,
            customer_identifier: self.customer_identifier.map(CustomerId::new),
            associated_document_uris: self.associated_document_uris,
            processing_status: parse_status(&self.status)?,
        })
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = invoices)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub invoice_id: String,
    pub erp_system: String,
    pub customer_id: String,
    pub original_amount: Decimal,
    pub amount_due: Decimal,
    pub currency: String,
    pub status: String,
    pub due_date: Option<OffsetDateTime>,
    pub erp_record_id: String,
    pub fetched_at: OffsetDateTime,
}

fn invoice_status_str(s: InvoiceStatus) -> &'static str {
    match s {
        InvoiceStatus::Open => "open",
        InvoiceStatus::Closed => "closed",
        InvoiceStatus::Disputed => "disputed",
        InvoiceStatus::Overdue => "overdue",
    }
}

fn parse_invoice_status(s: &str) -> Result<InvoiceStatus, String> {
    Ok(match s {
        "open" => InvoiceStatus::Open,
        "closed" => InvoiceStatus::Closed,
        "disputed" => InvoiceStatus::Disputed,
        "overdue" => InvoiceStatus::Overdue,
        other => return Err(format!("unknown invoice status '{other}'")),
    })
}

impl InvoiceRow {
    pub fn from_domain(inv: &DomainInvoice) -> Self {
        InvoiceRow {
            id: Uuid::new_v4(),
            invoice_id: inv.invoice_id.to_string(),
            erp_system: inv.erp_system.to_string(),
            customer_id: inv.customer_id.to_string(),
            original_amount: inv.original_amount.as_decimal(),
            amount_due: inv.amount_due.as_decimal(),
            currency: inv.currency.to_string(),
            status: invoice_status_str(inv.status).to_owned(),
            due_date: inv.due_date,
            erp_record_id: inv.erp_record_id.clone(),
            fetched_at: inv.fetched_at,
        }
    }

    pub fn into_domain(self) -> Result<DomainInvoice, String> {
        Ok(DomainInvoice {
            invoice_id: InvoiceId::new(self.invoice_id),
            erp_system: ErpSystem::new(self.erp_system),
            customer_id: CustomerId::new(self.customer_id),
            original_amount: Money::new(self.original_amount),
            amount_due: Money::new(self.amount_due),
            currency: Currency::parse(&self.currency).map_err(|e| e.to_string())?,
            status: parse_invoice_status(&self.status)?,
            due_date: self.due_date,
            erp_record_id: self.erp_record_id,
            fetched_at: self.fetched_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = match_results)]
pub struct MatchResultRow {
    pub id: Uuid,
    pub transaction_id: String,
    pub status: String,
    pub unapplied_amount: Decimal,
    pub discrepancy_code: String,
    pub confidence: f64,
    pub algorithm_version: String,
    pub log_entry: String,
    pub requires_human_review: bool,
    pub processing_time_ms: i64,
    pub created_at: OffsetDateTime,
}

impl MatchResultRow {
    pub fn from_domain(id: Uuid, r: &DomainMatchResult, now: OffsetDateTime) -> Self {
        MatchResultRow {
            id,
            transaction_id: r.transaction_id.to_string(),
            status: status_str(r.status).to_owned(),
            unapplied_amount: r.unapplied_amount.as_decimal(),
            discrepancy_code: discrepancy_str(r.discrepancy_code).to_owned(),
            confidence: r.confidence,
            algorithm_version: r.algorithm_version.clone(),
            log_entry: r.log_entry.clone(),
            requires_human_review: r.requires_human_review,
            processing_time_ms: r.processing_time_ms as i64,
            created_at: now,
        }
    }

    pub fn into_domain(self) -> Result<DomainMatchResult, String> {
        Ok(DomainMatchResult {
            transaction_id: TransactionId::new(self.transaction_id),
            status: parse_status(&self.status)?,
            unapplied_amount: Money::new(self.unapplied_amount),
            discrepancy_code: parse_discrepancy(&self.discrepancy_code)?,
            confidence: self.confidence,
            algorithm_version: self.algorithm_version,
            log_entry: self.log_entry,
            requires_human_review: self.requires_human_review,
            processing_time_ms: self.processing_time_ms as u64,
        })
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = invoice_payment_matches)]
pub struct InvoicePaymentMatchRow {
    pub id: Uuid,
    pub match_result_id: Uuid,
    pub invoice_id: String,
    pub external_invoice_id: String,
    pub amount_applied: Decimal,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = communication_events)]
pub struct CommunicationEventRow {
    pub id: Uuid,
    pub transaction_id: Option<String>,
    pub kind: String,
    pub recipient: String,
    pub template_name: String,
    pub payload: serde_json::Value,
    pub delivery_status: String,
    pub error: Option<String>,
    pub created_at: OffsetDateTime,
    pub sent_at: Option<OffsetDateTime>,
}

fn comm_kind_str(k: CommunicationKind) -> &'static str {
    match k {
        CommunicationKind::CustomerClarification => "customer_clarification",
        CommunicationKind::InternalAlert => "internal_alert",
        CommunicationKind::Confirmation => "confirmation",
    }
}

fn delivery_status_str(s: DeliveryStatus) -> &'static str {
    match s {
        DeliveryStatus::Queued => "queued",
        DeliveryStatus::Sent => "sent",
        DeliveryStatus::Delivered => "delivered",
        DeliveryStatus::Failed => "failed",
    }
}

impl CommunicationEventRow {
    pub fn from_domain(event: &DomainCommunicationEvent, now: OffsetDateTime) -> Self {
        CommunicationEventRow {
            id: Uuid::new_v4(),
            transaction_id: event.transaction_id.as_ref().map(|t| t.to_string()),
            kind: comm_kind_str(event.kind).to_owned(),
            recipient: event.recipient.clone(),
            template_name: event.template.clone(),
            payload: event.payload.clone(),
            delivery_status: delivery_status_str(event.delivery_status).to_owned(),
            error: event.error.clone(),
            created_at: now,
            sent_at: None,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = audit_log)]
pub struct AuditLogRow {
    pub seq: i64,
    pub ts: OffsetDateTime,
    pub event_type: String,
    pub source: String,
    pub correlation_id: String,
    pub transaction_id: Option<String>,
    pub data: serde_json::Value,
}
