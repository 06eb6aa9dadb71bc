//! The per-transaction workflow engine (spec §4.4). One `tokio::spawn`ed
//! task per transaction runs the Claim -> Extract -> FetchInvoices ->
//! Match -> Branch -> PostApplication -> Communicate -> Finalize sequence,
//! the same "spawn a task per inbound message" shape as the teacher's
//! `orderbook::trading::start`, generalized with a per-account keyed mutex
//! (spec §4.4 "per-account ordering") and a global `tokio::sync::Semaphore`
//! (spec §5 "backpressure").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use audit_store::{AuditError, AuditStore, NewAuditEvent};
use cash_common::config::Settings;
use cash_common::domain::{
    CommunicationEvent, CommunicationKind, DocumentParseResult, Invoice, MatchResult,
    PaymentTransaction, ProcessingStatus, WorkflowHandle,
};
use cash_common::error::ErrorKindExt;
use cash_common::ids::{CustomerId, ErpSystem, InvoiceId, WorkflowId};
use cash_common::InvoicePaymentMatch;
use communicator::{Communicator, DispatchRequest};
use erp_facade::{Application, ErpError, ErpFacade, InvoiceApplication};
use extractor::{ExtractRequest, Extractor, ExtractorError};
use matcher::{allocate, MatchInput, NextAction};

use crate::cancel::CancelRegistry;
use crate::error::OrchestratorError;
use crate::locks::KeyedLocks;

const EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const POST_TIMEOUT: Duration = Duration::from_secs(30);
const COMMUNICATE_TIMEOUT: Duration = Duration::from_secs(20);

const STEP_RETRY_MAX_ATTEMPTS: u32 = 3;
const STEP_RETRY_MAX_WAIT: Duration = Duration::from_secs(30);

const TEMPLATE_CONFIRMATION: &str = "payment_confirmation";
const TEMPLATE_CUSTOMER_CLARIFICATION: &str = "short_payment_clarification";
const TEMPLATE_INTERNAL_ALERT: &str = "internal_alert";
const INTERNAL_OPS_RECIPIENT: &str = "ops-alerts";

/// Orchestrator (OR), spec §4.4. Wires the four other components together
/// and owns the concurrency primitives described in spec §5: a global
/// semaphore for `max_concurrent_transactions`, a per-`source_account_ref`
/// lock table for ordering, and a cancellation flag per live workflow.
pub struct Orchestrator {
    audit: Arc<dyn AuditStore>,
    extractor: Arc<Extractor>,
    erp_facade: Arc<ErpFacade>,
    communicator: Arc<Communicator>,
    settings: Settings,
    /// `PaymentTransaction` carries no `erp_system` field (spec §3); this
    /// deployment addresses a single configured ERP target per workflow.
    default_erp_system: ErpSystem,
    account_locks: KeyedLocks,
    semaphore: Arc<tokio::sync::Semaphore>,
    cancellations: CancelRegistry,
}

impl Orchestrator {
    pub fn new(
        audit: Arc<dyn AuditStore>,
        extractor: Arc<Extractor>,
        erp_facade: Arc<ErpFacade>,
        communicator: Arc<Communicator>,
        settings: Settings,
        default_erp_system: ErpSystem,
    ) -> Arc<Self> {
        let max_concurrent = settings.max_concurrent_transactions;
        Arc::new(Orchestrator {
            audit,
            extractor,
            erp_facade,
            communicator,
            settings,
            default_erp_system,
            account_locks: KeyedLocks::new(),
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent)),
            cancellations: CancelRegistry::new(),
        })
    }

    /// `StartWorkflow`: claims the transaction idempotently, then spawns the
    /// background task that drives it to a terminal state. Returns
    /// immediately with the (possibly pre-existing) workflow handle -- a
    /// replayed call for an already-claimed transaction (spec §8 S8) never
    /// spawns a second task.
    #[tracing::instrument(skip(self, txn), fields(transaction_id = %txn.transaction_id))]
    pub async fn start_workflow(
        self: &Arc<Self>,
        txn: PaymentTransaction,
    ) -> Result<WorkflowHandle, OrchestratorError> {
        validate(&txn)?;
        let transaction_id = txn.transaction_id.clone();

        // Acquire capacity before claiming: a replayed call for an
        // already-claimed transaction must not be rejected as `Busy` just
        // because every slot happens to be full, and a fresh claim must
        // never be left stranded in `Processing` with no task to run it.
        let permit = self
            .semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| OrchestratorError::Busy)?;

        let claim = self.audit.claim_transaction(&txn).await?;
        if !claim.claimed {
            drop(permit);
            return Ok(WorkflowHandle {
                workflow_id: claim.workflow_id,
                transaction_id,
                state: claim.existing_status,
                result: None,
                error: None,
                claimed: false,
            });
        }

        let cancel_flag = self.cancellations.register(claim.workflow_id);
        let this = self.clone();
        let workflow_id = claim.workflow_id;

        tokio::spawn(async move {
            let _permit = permit;
            let timed_out = tokio::time::timeout(
                this.settings.workflow_timeout,
                this.run_workflow(workflow_id, txn, cancel_flag),
            )
            .await
            .is_err();
            if timed_out {
                tracing::warn!(%workflow_id, "workflow timed out");
            }
            this.cancellations.unregister(&workflow_id);
        });

        Ok(WorkflowHandle {
            workflow_id,
            transaction_id,
            state: ProcessingStatus::Processing,
            result: None,
            error: None,
            claimed: true,
        })
    }

    pub async fn get_status(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<WorkflowHandle, OrchestratorError> {
        self.audit
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(workflow_id.to_string()))
    }

    pub async fn cancel(&self, workflow_id: &WorkflowId) -> Result<(), OrchestratorError> {
        if self.cancellations.request_cancel(workflow_id) {
            return Ok(());
        }
        match self.audit.get_workflow(workflow_id).await? {
            Some(handle) if handle.state.is_terminal() => {
                Err(OrchestratorError::AlreadyTerminal(workflow_id.to_string()))
            }
            Some(_) => Ok(()), // race: finished between the two checks.
            None => Err(OrchestratorError::NotFound(workflow_id.to_string())),
        }
    }

    /// Crash-recovery reconciliation (spec §7): a workflow left
    /// `Processing` is either finalized (a match result was already
    /// recorded, meaning execution was past the Match/Post steps) or
    /// restarted from Claim.
    pub async fn reconcile_on_startup(self: &Arc<Self>) -> Result<usize, OrchestratorError> {
        let unfinalized = self.audit.list_unfinalized().await?;
        let mut reconciled = 0usize;
        for txn in unfinalized {
            let workflow_id = WorkflowId::for_transaction(&txn.transaction_id);
            let handle = self.audit.get_workflow(&workflow_id).await?;
            match handle.and_then(|h| h.result) {
                Some(result) => {
                    self.audit.finalize_transaction(&txn.transaction_id, result.status).await?;
                }
                None => {
                    let permit = match self.semaphore.clone().try_acquire_owned() {
                        Ok(p) => p,
                        Err(_) => continue,
                    };
                    let cancel_flag = self.cancellations.register(workflow_id);
                    let this = self.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        let _ = this.run_workflow(workflow_id, txn, cancel_flag).await;
                        this.cancellations.unregister(&workflow_id);
                    });
                }
            }
            reconciled += 1;
        }
        Ok(reconciled)
    }

    async fn run_workflow(
        &self,
        workflow_id: WorkflowId,
        txn: PaymentTransaction,
        cancel_flag: Arc<AtomicBool>,
    ) {
        let account_lock = self.account_locks.get(&txn.source_account_ref);
        let _account_guard = account_lock.lock().await;

        if let Err(e) = self.drive(workflow_id, &txn, &cancel_flag).await {
            tracing::warn!(%workflow_id, error = %e, "workflow terminated with error");
            let _ = self.audit.finalize_transaction(&txn.transaction_id, ProcessingStatus::Error).await;
            let _ = self
                .audit
                .append_audit(NewAuditEvent {
                    event_type: "workflow.error".to_owned(),
                    source: "orchestrator".to_owned(),
                    correlation_id: workflow_id.to_string(),
                    transaction_id: Some(txn.transaction_id.clone()),
                    data: serde_json::json!({"error": e.to_string(), "kind": e.kind()}),
                })
                .await;
        }
    }

    async fn drive(
        &self,
        workflow_id: WorkflowId,
        txn: &PaymentTransaction,
        cancel_flag: &AtomicBool,
    ) -> Result<(), OrchestratorError> {
        self.checkpoint(workflow_id, txn, "claimed", serde_json::json!({})).await?;

        check_cancelled(cancel_flag)?;
        let (had_candidates, invoice_ids) = match self.step_extract(txn).await {
            Ok(result) => {
                self.checkpoint(
                    workflow_id,
                    txn,
                    "extracted",
                    serde_json::json!({"tier": result.tier_used, "confidence": result.confidence}),
                )
                .await?;
                extraction_candidates(result)
            }
            Err(e) => {
                // Spec §7: ExtractorUnavailable degrades to whatever
                // candidates the last attempted tier produced, rather than
                // aborting the workflow. `AllTiersUnavailable` carries that
                // tier's result; any other extractor failure has none.
                tracing::info!(%workflow_id, error = %e, "extractor unavailable, degrading to partial candidate set");
                self.checkpoint(
                    workflow_id,
                    txn,
                    "extract_degraded",
                    serde_json::json!({"error": e.to_string()}),
                )
                .await?;
                match e {
                    ExtractorError::AllTiersUnavailable(partial) => extraction_candidates(partial),
                    _ => (false, Vec::new()),
                }
            }
        };

        check_cancelled(cancel_flag)?;
        let invoices = self.step_fetch_invoices(txn, &invoice_ids).await?;
        self.checkpoint(
            workflow_id,
            txn,
            "invoices_fetched",
            serde_json::json!({"found": invoices.len()}),
        )
        .await?;

        check_cancelled(cancel_flag)?;
        let match_output = allocate(MatchInput {
            payment: txn,
            had_candidates,
            invoices,
            policy: &self.settings.matcher_policy,
        })
        .map_err(OrchestratorError::from)?;

        self.audit.record_match(&match_output.result, &match_output.matches).await?;
        self.checkpoint(
            workflow_id,
            txn,
            "matched",
            serde_json::json!({"status": match_output.result.status, "discrepancy": match_output.result.discrepancy_code}),
        )
        .await?;

        check_cancelled(cancel_flag)?;
        let read_only_block = wants_post(match_output.next_action) && !self.settings.enable_autonomous_erp_updates;
        let final_status = if read_only_block { ProcessingStatus::RequiresReview } else { match_output.result.status };

        if wants_post(match_output.next_action) && !read_only_block {
            self.step_post_application(txn, &match_output.matches).await?;
            self.checkpoint(workflow_id, txn, "posted", serde_json::json!({})).await?;
        } else if read_only_block {
            self.checkpoint(workflow_id, txn, "post_skipped_read_only", serde_json::json!({})).await?;
        }

        check_cancelled(cancel_flag)?;
        if let Some((kind, template, recipient)) = communication_for(match_output.next_action, txn) {
            self.step_communicate(workflow_id, txn, kind, template, recipient, &match_output.result)
                .await?;
        }

        self.audit.finalize_transaction(&txn.transaction_id, final_status).await?;
        self.checkpoint(
            workflow_id,
            txn,
            "finalized",
            serde_json::json!({"status": final_status}),
        )
        .await?;

        Ok(())
    }

    async fn step_extract(&self, txn: &PaymentTransaction) -> Result<DocumentParseResult, ExtractorError> {
        let request = ExtractRequest {
            document_uris: txn.associated_document_uris.clone(),
            remittance_text: txn.raw_remittance_data.clone(),
            client_id: txn.transaction_id.to_string(),
            tier_preference: self.settings.extractor_tier_preference,
            confidence_threshold: self.settings.extractor_confidence_threshold,
        };
        match tokio::time::timeout(EXTRACT_TIMEOUT, self.extractor.extract(request)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractorError::Timeout(1)),
        }
    }

    async fn step_fetch_invoices(
        &self,
        txn: &PaymentTransaction,
        invoice_ids: &[InvoiceId],
    ) -> Result<Vec<Invoice>, OrchestratorError> {
        let customer = txn.customer_identifier.clone();
        let erp_system = self.default_erp_system.clone();
        let facade = self.erp_facade.clone();

        let outcome = retry_step(STEP_RETRY_MAX_ATTEMPTS, STEP_RETRY_MAX_WAIT, || {
            let facade = facade.clone();
            let erp_system = erp_system.clone();
            let customer = customer.clone();
            let invoice_ids = invoice_ids.to_vec();
            async move {
                let result = tokio::time::timeout(
                    FETCH_TIMEOUT,
                    facade.fetch_invoices(&invoice_ids, &erp_system, customer.as_ref()),
                )
                .await
                .unwrap_or_else(|_| Err(ErpError::Transient("fetch_invoices step timeout".into())));
                result.map_err(OrchestratorError::from)
            }
        })
        .await?;

        Ok(outcome.invoices)
    }

    async fn step_post_application(
        &self,
        txn: &PaymentTransaction,
        matches: &[InvoicePaymentMatch],
    ) -> Result<(), OrchestratorError> {
        if matches.is_empty() {
            return Ok(());
        }
        let customer_id = txn.customer_identifier.clone().unwrap_or_else(|| CustomerId::new("unknown"));

        let application = Application {
            transaction_id: txn.transaction_id.to_string(),
            customer_id,
            applications: matches
                .iter()
                .map(|m| InvoiceApplication { invoice_id: m.invoice_id.clone(), amount_applied: m.amount_applied })
                .collect(),
            total_amount: matches.iter().map(|m| m.amount_applied).sum(),
            currency: txn.currency,
        };
        let erp_system = self.default_erp_system.clone();
        let facade = self.erp_facade.clone();

        retry_step(STEP_RETRY_MAX_ATTEMPTS, STEP_RETRY_MAX_WAIT, || {
            let facade = facade.clone();
            let erp_system = erp_system.clone();
            let application = application.clone();
            async move {
                let result = tokio::time::timeout(POST_TIMEOUT, facade.post_application(&application, &erp_system))
                    .await
                    .unwrap_or_else(|_| Err(ErpError::Transient("post_application step timeout".into())));
                result.map_err(OrchestratorError::from)
            }
        })
        .await?;

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn step_communicate(
        &self,
        workflow_id: WorkflowId,
        txn: &PaymentTransaction,
        kind: CommunicationKind,
        template: &str,
        recipient: String,
        result: &MatchResult,
    ) -> Result<(), OrchestratorError> {
        let request = DispatchRequest {
            transaction_id: Some(txn.transaction_id.clone()),
            kind,
            recipient: recipient.clone(),
            template_name: template.to_owned(),
            data: serde_json::json!({
                "transaction_id": txn.transaction_id.to_string(),
                "amount": txn.amount.to_string(),
                "unapplied_amount": result.unapplied_amount.to_string(),
                "discrepancy_code": result.discrepancy_code,
            }),
        };

        let communicator = self.communicator.clone();
        let outcome = match tokio::time::timeout(COMMUNICATE_TIMEOUT, communicator.dispatch(request)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return Err(OrchestratorError::from(e)),
            Err(_) => {
                tracing::warn!(%workflow_id, "communicator dispatch timed out");
                return Ok(());
            }
        };

        let event = CommunicationEvent {
            transaction_id: Some(txn.transaction_id.clone()),
            kind,
            template: template.to_owned(),
            recipient,
            payload: serde_json::json!({"discrepancy_code": result.discrepancy_code}),
            delivery_status: outcome.status,
            error: outcome.error,
        };
        self.audit.record_communication(&event).await?;
        Ok(())
    }

    async fn checkpoint(
        &self,
        workflow_id: WorkflowId,
        txn: &PaymentTransaction,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<(), AuditError> {
        self.audit
            .append_audit(NewAuditEvent {
                event_type: format!("workflow.{event_type}"),
                source: "orchestrator".to_owned(),
                correlation_id: workflow_id.to_string(),
                transaction_id: Some(txn.transaction_id.clone()),
                data,
            })
            .await?;
        Ok(())
    }
}

fn validate(txn: &PaymentTransaction) -> Result<(), OrchestratorError> {
    if txn.transaction_id.as_str().trim().is_empty() {
        return Err(OrchestratorError::Validation("transaction_id must not be empty".into()));
    }
    if txn.amount.is_negative() {
        return Err(OrchestratorError::Validation("amount must not be negative".into()));
    }
    Ok(())
}

fn check_cancelled(flag: &AtomicBool) -> Result<(), OrchestratorError> {
    if flag.load(Ordering::SeqCst) {
        Err(OrchestratorError::Cancelled)
    } else {
        Ok(())
    }
}

/// Whether any ids were extracted at all (distinguishes the `InvalidInvoice`
/// discrepancy from `None` in the matcher's no-candidates rule), plus the
/// normalized, deduplicated id list to hand the ERP Facade.
fn extraction_candidates(result: DocumentParseResult) -> (bool, Vec<InvoiceId>) {
    let ids: Vec<InvoiceId> = extractor::normalize::dedupe_preserving_order(result.extracted_invoice_ids)
        .into_iter()
        .map(InvoiceId::new)
        .collect();
    let had_candidates = !ids.is_empty();
    (had_candidates, ids)
}

fn wants_post(action: NextAction) -> bool {
    matches!(
        action,
        NextAction::PostThenConfirmOptional
            | NextAction::PostThenCustomerClarification
            | NextAction::PostNoCommunication
            | NextAction::PostThenInternalAlert
    )
}

/// Maps a `NextAction` to the communication it implies (spec §4.4's branch
/// table), or `None` when no message is dispatched. Read-only mode (spec §6
/// `enable_autonomous_erp_updates = false`) still dispatches the same
/// communication; only the ERP write and the final status are suppressed.
fn communication_for(
    action: NextAction,
    txn: &PaymentTransaction,
) -> Option<(CommunicationKind, &'static str, String)> {
    let customer_recipient = txn
        .customer_identifier
        .as_ref()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "unknown-customer".to_owned());

    match action {
        NextAction::PostThenConfirmOptional => {
            Some((CommunicationKind::Confirmation, TEMPLATE_CONFIRMATION, customer_recipient))
        }
        NextAction::PostThenCustomerClarification => Some((
            CommunicationKind::CustomerClarification,
            TEMPLATE_CUSTOMER_CLARIFICATION,
            customer_recipient,
        )),
        NextAction::PostNoCommunication => None,
        NextAction::PostThenInternalAlert | NextAction::NoPostInternalAlert => {
            Some((CommunicationKind::InternalAlert, TEMPLATE_INTERNAL_ALERT, INTERNAL_OPS_RECIPIENT.to_owned()))
        }
    }
}

async fn retry_step<T, F, Fut>(max_attempts: u32, max_wait: Duration, op: F) -> Result<T, OrchestratorError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, OrchestratorError>>,
{
    cash_common::backoff::retry_with_backoff(
        max_attempts,
        max_wait,
        |e: &OrchestratorError| e.kind().is_retryable_in_step(),
        op,
    )
    .await
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use cash_common::domain::{InvoiceStatus, ProcessingStatus, TierPreference};
    use cash_common::ids::{ErpSystem as ErpSystemId, TransactionId};
    use cash_common::money::{Currency, Money};
    use erp_facade::{ConnectionStatus, ErpAdapter, FetchOutcome, PostOutcome};
    use time::OffsetDateTime;

    use super::*;

    fn settings() -> Settings {
        let mut s = Settings::default();
        s.max_concurrent_transactions = 4;
        s.workflow_timeout = Duration::from_secs(5);
        s.extractor_tier_preference = TierPreference::Pattern;
        s
    }

    fn txn(id: &str, amount: &str, remittance: &str) -> PaymentTransaction {
        PaymentTransaction {
            transaction_id: TransactionId::new(id),
            source_account_ref: "ACC-1".to_owned(),
            amount: Money::parse_canonical(amount).unwrap(),
            currency: Currency::parse("EUR").unwrap(),
            value_date: OffsetDateTime::now_utc(),
            raw_remittance_data: remittance.to_owned(),
            customer_identifier: Some(CustomerId::new("CUST-1")),
            associated_document_uris: Vec::new(),
            processing_status: ProcessingStatus::Pending,
        }
    }

    struct StubAdapter {
        invoice_amount: Money,
    }

    #[async_trait]
    impl ErpAdapter for StubAdapter {
        fn erp_system(&self) -> &str {
            "netsuite"
        }
        fn supports_native_idempotency(&self) -> bool {
            true
        }
        async fn fetch_invoices(
            &self,
            invoice_ids: &[InvoiceId],
            _customer_id: Option<&CustomerId>,
        ) -> Result<FetchOutcome, ErpError> {
            let invoices = invoice_ids
                .iter()
                .map(|id| Invoice {
                    invoice_id: id.clone(),
                    erp_system: ErpSystemId::new("netsuite"),
                    customer_id: CustomerId::new("CUST-1"),
                    original_amount: self.invoice_amount,
                    amount_due: self.invoice_amount,
                    currency: Currency::parse("EUR").unwrap(),
                    status: InvoiceStatus::Open,
                    due_date: None,
                    erp_record_id: format!("erp-{id}"),
                    fetched_at: OffsetDateTime::now_utc(),
                })
                .collect();
            Ok(FetchOutcome { invoices, not_found: Vec::new() })
        }
        async fn post_application(&self, application: &Application) -> Result<PostOutcome, ErpError> {
            Ok(PostOutcome {
                erp_transaction_id: format!("erp-{}", application.transaction_id),
                posted_at: OffsetDateTime::now_utc(),
            })
        }
        async fn find_existing_application(&self, _: &str) -> Result<Option<PostOutcome>, ErpError> {
            Ok(None)
        }
        async fn test_connection(&self) -> Result<ConnectionStatus, ErpError> {
            Ok(ConnectionStatus { ok: true, latency_ms: 1, version: None })
        }
    }

    fn build_with_settings(invoice_amount: &str, s: Settings) -> Arc<Orchestrator> {
        let audit: Arc<dyn AuditStore> = Arc::new(audit_store::InMemoryAuditStore::new());
        let extractor = Arc::new(Extractor::pattern_only());
        let mut facade = ErpFacade::new();
        facade.register(
            Arc::new(StubAdapter { invoice_amount: Money::parse_canonical(invoice_amount).unwrap() }),
            None,
        );
        let communicator = Arc::new(Communicator::new(
            Box::new(communicator::InMemoryTemplateRegistry::new()),
            Arc::new(communicator::LoggingTransport),
            100,
            3,
            Duration::from_millis(50),
        ));
        Orchestrator::new(audit, extractor, Arc::new(facade), communicator, s, ErpSystemId::new("netsuite"))
    }

    fn build(invoice_amount: &str) -> Arc<Orchestrator> {
        build_with_settings(invoice_amount, settings())
    }

    #[tokio::test]
    async fn perfect_match_runs_to_finalized() {
        let orchestrator = build("1000.00");
        let handle = orchestrator
            .start_workflow(txn("TXN-100", "1000.00", "Payment for INV-100"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let status = orchestrator.get_status(&handle.workflow_id).await.unwrap();
        assert_eq!(status.state, ProcessingStatus::Matched);
    }

    #[tokio::test]
    async fn replayed_start_is_idempotent() {
        let orchestrator = build("1000.00");
        let t = txn("TXN-101", "1000.00", "Payment for INV-101");
        let first = orchestrator.start_workflow(t.clone()).await.unwrap();
        let second = orchestrator.start_workflow(t).await.unwrap();
        assert_eq!(first.workflow_id, second.workflow_id);
    }

    #[tokio::test]
    async fn cancel_before_run_is_observed() {
        let orchestrator = build("1000.00");
        let handle = orchestrator
            .start_workflow(txn("TXN-102", "1000.00", "Payment for INV-102"))
            .await
            .unwrap();
        let _ = orchestrator.cancel(&handle.workflow_id).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let status = orchestrator.get_status(&handle.workflow_id).await.unwrap();
        // Either it raced to Matched before the flag was observed, or it
        // stopped and was finalized as Error; both are valid terminal
        // outcomes the cooperative model explicitly allows.
        assert!(status.state.is_terminal());
    }

    #[tokio::test]
    async fn busy_when_semaphore_saturated() {
        let mut s = settings();
        s.max_concurrent_transactions = 0;
        let orchestrator = build_with_settings("1000.00", s);
        let result = orchestrator.start_workflow(txn("TXN-103", "1000.00", "x")).await;
        assert!(matches!(result, Err(OrchestratorError::Busy)));
    }

    #[tokio::test]
    async fn read_only_mode_skips_post_and_forces_review() {
        let mut s = settings();
        s.enable_autonomous_erp_updates = false;
        let orchestrator = build_with_settings("1000.00", s);
        let handle = orchestrator
            .start_workflow(txn("TXN-104", "1000.00", "Payment for INV-104"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let status = orchestrator.get_status(&handle.workflow_id).await.unwrap();
        assert_eq!(status.state, ProcessingStatus::RequiresReview);
    }
}
