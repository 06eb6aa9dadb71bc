//! Diesel/Postgres-backed `AuditStore`. Connection acquisition and queries
//! run on `spawn_blocking`, the same pattern the teacher's
//! `orderbook::trading::process_new_order` uses for the diesel r2d2 pool.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use time::OffsetDateTime;
use uuid::Uuid;

use cash_common::domain::{
    AuditEvent, CommunicationEvent, InvoicePaymentMatch, MatchResult, PaymentTransaction,
    ProcessingStatus, WorkflowHandle,
};
use cash_common::ids::{TransactionId, WorkflowId};

use crate::error::AuditError;
use crate::models::{
    CommunicationEventRow, InvoicePaymentMatchRow, MatchResultRow, TransactionRow,
};
use crate::schema;
use crate::store::{AuditFilter, AuditStore, ClaimOutcome, NewAuditEvent, TransactionFilter};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        PgAuditStore { pool }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, AuditError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, diesel::result::Error> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| anyhow::anyhow!(e))?;
            f(&mut conn).map_err(|e| anyhow::anyhow!(e))
        })
        .await
        .map_err(|e| AuditError::Backend(anyhow::anyhow!(e)))?
        .map_err(AuditError::Backend)
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn claim_transaction(
        &self,
        txn: &PaymentTransaction,
    ) -> Result<ClaimOutcome, AuditError> {
        use schema::transactions::dsl;

        let workflow_id = WorkflowId::for_transaction(&txn.transaction_id);
        let row = TransactionRow::from_domain(txn, workflow_id, now());

        self.with_conn(move |conn| {
            conn.build_transaction().serializable().run(|conn| {
                let existing = dsl::transactions
                    .filter(dsl::transaction_id.eq(&row.transaction_id))
                    .select(dsl::status)
                    .first::<String>(conn)
                    .optional()?;

                if let Some(status) = existing {
                    return Ok((false, status));
                }

                diesel::insert_into(dsl::transactions)
                    .values(&row)
                    .execute(conn)?;
                Ok((true, row.status.clone()))
            })
        })
        .await
        .and_then(|(claimed, status)| {
            let existing_status = crate::models::parse_status(&status)
                .map_err(AuditError::InvariantViolation)?;
            Ok(ClaimOutcome { claimed, existing_status, workflow_id })
        })
    }

    async fn record_match(
        &self,
        result: &MatchResult,
        matches: &[InvoicePaymentMatch],
    ) -> Result<(), AuditError> {
        use schema::match_results::dsl as mr_dsl;

        let match_id = Uuid::new_v4();
        let result_row = MatchResultRow::from_domain(match_id, result, now());
        let match_rows: Vec<InvoicePaymentMatchRow> = matches
            .iter()
            .map(|m| InvoicePaymentMatchRow {
                id: Uuid::new_v4(),
                match_result_id: match_id,
                invoice_id: m.invoice_id.to_string(),
                external_invoice_id: m.invoice_id.to_string(),
                amount_applied: m.amount_applied.as_decimal(),
            })
            .collect();
        let transaction_id = result.transaction_id.to_string();

        // Check-then-insert inside the same serializable transaction, the
        // same idempotency guard `InMemoryAuditStore::record_match` applies
        // against its `match_results` map (spec §8.3: a match result may
        // only be recorded once per transaction).
        let already_recorded = self
            .with_conn(move |conn| {
                conn.build_transaction().serializable().run(|conn| {
                    let existing = mr_dsl::match_results
                        .filter(mr_dsl::transaction_id.eq(&transaction_id))
                        .select(mr_dsl::id)
                        .first::<Uuid>(conn)
                        .optional()?;
                    if existing.is_some() {
                        return Ok(true);
                    }
                    diesel::insert_into(schema::match_results::table)
                        .values(&result_row)
                        .execute(conn)?;
                    if !match_rows.is_empty() {
                        diesel::insert_into(schema::invoice_payment_matches::table)
                            .values(&match_rows)
                            .execute(conn)?;
                    }
                    Ok(false)
                })
            })
            .await?;

        if already_recorded {
            return Err(AuditError::InvariantViolation(format!(
                "match result for {} already recorded",
                result.transaction_id
            )));
        }
        Ok(())
    }

    async fn record_communication(&self, event: &CommunicationEvent) -> Result<(), AuditError> {
        let row = CommunicationEventRow::from_domain(event, now());
        self.with_conn(move |conn| {
            diesel::insert_into(schema::communication_events::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn append_audit(&self, event: NewAuditEvent) -> Result<i64, AuditError> {
        use schema::audit_log::dsl;

        self.with_conn(move |conn| {
            let seq = dsl::audit_log
                .select(diesel::dsl::max(dsl::seq))
                .first::<Option<i64>>(conn)?
                .unwrap_or(0)
                + 1;
            let row = crate::models::AuditLogRow {
                seq,
                ts: now(),
                event_type: event.event_type,
                source: event.source,
                correlation_id: event.correlation_id,
                transaction_id: event.transaction_id.map(|t| t.to_string()),
                data: event.data,
            };
            diesel::insert_into(dsl::audit_log).values(&row).execute(conn)?;
            Ok(seq)
        })
        .await
    }

    async fn query_audit(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        use schema::audit_log::dsl;

        self.with_conn(move |conn| {
            let mut query = dsl::audit_log.into_boxed();
            if let Some(txn_id) = &filter.transaction_id {
                query = query.filter(dsl::transaction_id.eq(txn_id.to_string()));
            }
            if let Some(event_type) = &filter.event_type {
                query = query.filter(dsl::event_type.eq(event_type.clone()));
            }
            if let Some(since) = filter.since_seq {
                query = query.filter(dsl::seq.gt(since));
            }
            query = query.order(dsl::seq.asc());
            if let Some(limit) = filter.limit {
                query = query.limit(limit);
            }
            let rows: Vec<crate::models::AuditLogRow> = query.load(conn)?;
            Ok(rows
                .into_iter()
                .map(|r| AuditEvent {
                    seq: r.seq,
                    ts: r.ts,
                    event_type: r.event_type,
                    source: r.source,
                    correlation_id: r.correlation_id,
                    transaction_id: r.transaction_id.map(TransactionId::new),
                    data: r.data,
                })
                .collect())
        })
        .await
    }

    async fn query_transactions(
        &self,
        filter: TransactionFilter,
    ) -> Result<Vec<PaymentTransaction>, AuditError> {
        use schema::transactions::dsl;

        let rows: Vec<TransactionRow> = self
            .with_conn(move |conn| {
                let mut query = dsl::transactions.into_boxed();
                if let Some(status) = filter.status {
                    query = query.filter(dsl::status.eq(crate::models::status_str(status)));
                }
                if let Some(account) = &filter.source_account_ref {
                    query = query.filter(dsl::source_account_ref.eq(account.clone()));
                }
                if let Some(limit) = filter.limit {
                    query = query.limit(limit);
                }
                query.load(conn)
            })
            .await?;

        rows.into_iter()
            .map(|r| r.into_domain().map_err(AuditError::InvariantViolation))
            .collect()
    }

    async fn finalize_transaction(
        &self,
        transaction_id: &TransactionId,
        status: ProcessingStatus,
    ) -> Result<(), AuditError> {
        use schema::transactions::dsl;

        let id = transaction_id.to_string();
        let status_str = crate::models::status_str(status).to_owned();
        let ts = now();
        self.with_conn(move |conn| {
            diesel::update(dsl::transactions.filter(dsl::transaction_id.eq(id)))
                .set((
                    dsl::status.eq(status_str),
                    dsl::updated_at.eq(ts),
                    dsl::processed_at.eq(ts),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn get_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<Option<WorkflowHandle>, AuditError> {
        use schema::match_results::dsl as mr_dsl;
        use schema::transactions::dsl;

        let wf_uuid = workflow_id.0;
        let row: Option<(TransactionRow, Option<MatchResultRow>)> = self
            .with_conn(move |conn| {
                let Some(txn_row): Option<TransactionRow> = dsl::transactions
                    .filter(dsl::workflow_id.eq(wf_uuid))
                    .first(conn)
                    .optional()?
                else {
                    return Ok(None);
                };
                let match_row = mr_dsl::match_results
                    .filter(mr_dsl::transaction_id.eq(&txn_row.transaction_id))
                    .first::<MatchResultRow>(conn)
                    .optional()?;
                Ok(Some((txn_row, match_row)))
            })
            .await?;

        let Some((row, match_row)) = row else { return Ok(None) };
        let status = crate::models::parse_status(&row.status)
            .map_err(AuditError::InvariantViolation)?;
        let transaction_id = TransactionId::new(row.transaction_id);
        let result = match match_row {
            Some(r) => Some(r.into_domain().map_err(AuditError::InvariantViolation)?),
            None => None,
        };
        Ok(Some(WorkflowHandle {
            workflow_id: *workflow_id,
            transaction_id,
            state: status,
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

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
