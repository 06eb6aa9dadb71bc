//! In-process `AuditStore` test double, used by `orchestrator`'s
//! integration tests in place of a real Postgres (SPEC_FULL §8: no
//! `testcontainers` dependency for this exercise). Implements the same
//! serializable-isolation guarantees the trait promises via a single
//! `parking_lot::Mutex` guarding all state, matching the teacher's
//! `Arc<parking_lot::Mutex<..>>` idiom in `coordinator/src/routes.rs`'s
//! `AppState`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;

use cash_common::domain::{
    AuditEvent, CommunicationEvent, InvoicePaymentMatch, MatchResult, PaymentTransaction,
    ProcessingStatus, WorkflowHandle,
};
use cash_common::ids::{TransactionId, WorkflowId};

use crate::error::AuditError;
use crate::store::{AuditFilter, AuditStore, ClaimOutcome, NewAuditEvent, TransactionFilter};

#[derive(Default)]
struct State {
    transactions: HashMap<String, (PaymentTransaction, WorkflowId)>,
    match_results: HashMap<String, (MatchResult, Vec<InvoicePaymentMatch>)>,
    communications: Vec<CommunicationEvent>,
    audit_log: Vec<AuditEvent>,
}

#[derive(Clone, Default)]
pub struct InMemoryAuditStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn match_result_count(&self) -> usize {
        self.state.lock().match_results.len()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn claim_transaction(
        &self,
        txn: &PaymentTransaction,
    ) -> Result<ClaimOutcome, AuditError> {
        let mut state = self.state.lock();
        let key = txn.transaction_id.to_string();
        let workflow_id = WorkflowId::for_transaction(&txn.transaction_id);

        if let Some((existing, wf)) = state.transactions.get(&key) {
            return Ok(ClaimOutcome {
                claimed: false,
                existing_status: existing.processing_status,
                workflow_id: *wf,
            });
        }

        let mut claimed_txn = txn.clone();
        claimed_txn.processing_status = ProcessingStatus::Processing;
        state
            .transactions
            .insert(key, (claimed_txn, workflow_id));
        Ok(ClaimOutcome {
            claimed: true,
            existing_status: ProcessingStatus::Processing,
            workflow_id,
        })
    }

    async fn record_match(
        &self,
        result: &MatchResult,
        matches: &[InvoicePaymentMatch],
    ) -> Result<(), AuditError> {
        let mut state = self.state.lock();
        let key = result.transaction_id.to_string();
        if state.match_results.contains_key(&key) {
            return Err(AuditError::InvariantViolation(format!(
                "match result for {key} already recorded"
            )));
        }
        state
            .match_results
            .insert(key, (result.clone(), matches.to_vec()));
        Ok(())
    }

    async fn record_communication(&self, event: &CommunicationEvent) -> Result<(), AuditError> {
        self.state.lock().communications.push(event.clone());
        Ok(())
    }

    async fn append_audit(&self, event: NewAuditEvent) -> Result<i64, AuditError> {
        let mut state = self.state.lock();
        let seq = state.audit_log.last().map(|e| e.seq).unwrap_or(0) + 1;
        state.audit_log.push(AuditEvent {
            seq,
            ts: OffsetDateTime::now_utc(),
            event_type: event.event_type,
            source: event.source,
            correlation_id: event.correlation_id,
            transaction_id: event.transaction_id,
            data: event.data,
        });
        Ok(seq)
    }

    async fn query_audit(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        let state = self.state.lock();
        let mut out: Vec<AuditEvent> = state
            .audit_log
            .iter()
            .filter(|e| {
                filter
                    .transaction_id
                    .as_ref()
                    .map(|t| e.transaction_id.as_ref() == Some(t))
                    .unwrap_or(true)
            })
            .filter(|e| {
                filter
                    .event_type
                    .as_ref()
                    .map(|t| &e.event_type == t)
                    .unwrap_or(true)
            })
            .filter(|e| filter.since_seq.map(|s| e.seq > s).unwrap_or(true))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            out.truncate(limit as usize);
        }
        Ok(out)
    }

    async fn query_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<PaymentTransaction>, AuditError> {
        let state = self.state.lock();
        let mut out: Vec<PaymentTransaction> = state
            .transactions
            .values()
            .map(|(t, _)| t.clone())
            .filter(|t| {
                filter
                    .status
                    .map(|s| t.processing_status == s)
                    .unwrap_or(true)
            })
            .filter(|t| {
                filter
                    .source_account_ref
                    .as_ref()
                    .map(|a| &t.source_account_ref == a)
                    .unwrap_or(true)
            })
            .collect();
        if let Some(limit) = filter.limit {
            out.truncate(limit as usize);
        }
        Ok(out)
    }

    async fn finalize_transaction(
        &self,
        transaction_id: &TransactionId,
        status: ProcessingStatus,
    ) -> Result<(), AuditError> {
        let mut state = self.state.lock();
        let key = transaction_id.to_string();
        let entry = state
            .transactions
            .get_mut(&key)
            .ok_or_else(|| AuditError::NotFound(key.clone()))?;
        entry.0.processing_status = status;
        Ok(())
    }

    async fn get_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Option<WorkflowHandle>, AuditError> {
        let state = self.state.lock();
        let found = state.transactions.values().find(|(_, wf)| wf == workflow_id);
        let Some((txn, wf)) = found else { return Ok(None) };
        let result = state
            .match_results
            .get(&txn.transaction_id.to_string())
            .map(|(r, _)| r.clone());
        Ok(Some(WorkflowHandle {
            workflow_id: *wf,
            transaction_id: txn.transaction_id.clone(),
            state: txn.processing_status,
            result,
            error: None,
            claimed: true,
        }))
    }

    async fn list_unfinalized(&self) -> Result<Vec<PaymentTransaction>, AuditError> {
        self.query_transactions(TransactionFilter {
            status: Some(ProcessingStatus::Processing),
            source_account_ref: None,
            limit: None,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use cash_common::domain::ProcessingStatus;
    use cash_common::ids::TransactionId;
    use cash_common::money::{Currency, Money};
    use time::OffsetDateTime;

    use super::*;

    fn sample_txn(id: &str) -> PaymentTransaction {
        PaymentTransaction {
            transaction_id: TransactionId::new(id),
            source_account_ref: "ACC-1".to_owned(),
            amount: Money::parse_canonical("100.00").unwrap(),
            currency: Currency::parse("EUR").unwrap(),
            value_date: OffsetDateTime::now_utc(),
            raw_remittance_data: String::new(),
            customer_identifier: None,
            associated_document_uris: Vec::new(),
            processing_status: ProcessingStatus::Pending,
        }
    }

    #[tokio::test]
    async fn claim_is_idempotent() {
        let store = InMemoryAuditStore::new();
        let txn = sample_txn("TXN-001");
        let first = store.claim_transaction(&txn).await.unwrap();
        assert!(first.claimed);
        let second = store.claim_transaction(&txn).await.unwrap();
        assert!(!second.claimed);
        assert_eq!(first.workflow_id, second.workflow_id);
    }

    #[tokio::test]
    async fn audit_log_seq_is_monotonic() {
        let store = InMemoryAuditStore::new();
        for _ in 0..5 {
            store
                .append_audit(NewAuditEvent {
                    event_type: "test".to_owned(),
                    source: "test".to_owned(),
                    correlation_id: "c1".to_owned(),
                    transaction_id: None,
                    data: serde_json::json!({}),
                })
                .await
                .unwrap();
        }
        let events = store.query_audit(AuditFilter::default()).await.unwrap();
        let seqs: Vec<i64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    }
}
