//! Generic HTTP-backed `ErpAdapter`, configurable per `erp_system` (spec
//! §4.2 "a configurable generic adapter"). Grounded on the teacher's
//! `reqwest`-based HTTP clients in `trade`/`commons`.

use async_trait::async_trait;
use cash_common::domain::{Invoice, InvoiceStatus};
use cash_common::ids::{CustomerId, ErpSystem, InvoiceId};
use cash_common::money::{Currency, Money};
use serde::{Deserialize, Serialize};

use crate::adapter::{
    Application, AuthMode, ConnectionStatus, ErpAdapter, FetchOutcome, PostOutcome,
};
use crate::error::ErpError;

pub struct HttpErpAdapter {
    erp_system: ErpSystem,
    base_url: String,
    auth: AuthMode,
    client: reqwest::Client,
    native_idempotency: bool,
}

impl HttpErpAdapter {
    pub fn new(
        erp_system: ErpSystem,
        base_url: impl Into<String>,
        auth: AuthMode,
        client: reqwest::Client,
        native_idempotency: bool,
    ) -> Self {
        HttpErpAdapter {
            erp_system,
            base_url: base_url.into(),
            auth,
            client,
            native_idempotency,
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            AuthMode::OAuth2 { access_token } => builder.bearer_auth(access_token),
            AuthMode::Certificate { .. } => builder, // client identity carried by the reqwest::Client itself.
            AuthMode::ApiKey { key } => builder.header("x-api-key", key),
            AuthMode::Generic => builder,
        }
    }

    fn classify_status(status: reqwest::StatusCode, body: String) -> ErpError {
        if status == reqwest::StatusCode::CONFLICT {
            return ErpError::DuplicatePayment(body);
        }
        if status.is_server_error() || status == reqwest::StatusCode::REQUEST_TIMEOUT {
            return ErpError::Transient(format!("status {status}: {body}"));
        }
        ErpError::Permanent(format!("status {status}: {body}"))
    }
}

#[derive(Serialize)]
struct FetchInvoicesWire<'a> {
    invoice_ids: &'a [String],
    customer_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct InvoiceWire {
    invoice_id: String,
    customer_id: String,
    original_amount: String,
    amount_due: String,
    currency: String,
    status: String,
    due_date: Option<String>,
    erp_record_id: String,
}

#[derive(Deserialize)]
struct FetchInvoicesResponseWire {
    invoices: Vec<InvoiceWire>,
    not_found: Vec<String>,
}

#[derive(Serialize)]
struct PostApplicationWire<'a> {
    transaction_id: &'a str,
    customer_id: &'a str,
    applications: Vec<InvoiceApplicationWire<'a>>,
    total_amount: String,
    currency: &'a str,
}

#[derive(Serialize)]
struct InvoiceApplicationWire<'a> {
    invoice_id: &'a str,
    amount_applied: String,
}

#[derive(Deserialize)]
struct PostApplicationResponseWire {
    erp_transaction_id: String,
    posted_at: time::OffsetDateTime,
}

fn parse_invoice_status(s: &str) -> InvoiceStatus {
    match s {
        "closed" => InvoiceStatus::Closed,
        "disputed" => InvoiceStatus::Disputed,
        "overdue" => InvoiceStatus::Overdue,
        _ => InvoiceStatus::Open,
    }
}

#[async_trait]
impl ErpAdapter for HttpErpAdapter {
    fn erp_system(&self) -> &str {
        self.erp_system.as_str()
    }

    fn supports_native_idempotency(&self) -> bool {
        self.native_idempotency
    }

    async fn fetch_invoices(
        &self,
        invoice_ids: &[InvoiceId],
        customer_id: Option<&CustomerId>,
    ) -> Result<FetchOutcome, ErpError> {
        let ids: Vec<String> = invoice_ids.iter().map(|i| i.to_string()).collect();
        let body = FetchInvoicesWire { invoice_ids: &ids, customer_id: customer_id.map(|c| c.as_str()) };

        let resp = self
            .authorize(self.client.post(format!("{}/invoices/fetch", self.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(|e| ErpError::Transient(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, text));
        }

        let parsed: FetchInvoicesResponseWire =
            resp.json().await.map_err(|e| ErpError::Transient(e.to_string()))?;

        let fetched_at = time::OffsetDateTime::now_utc();
        let invoices = parsed
            .invoices
            .into_iter()
            .map(|w| -> Result<Invoice, ErpError> {
                Ok(Invoice {
                    invoice_id: InvoiceId::new(w.invoice_id),
                    erp_system: self.erp_system.clone(),
                    customer_id: CustomerId::new(w.customer_id),
                    original_amount: Money::parse_canonical(&w.original_amount)
                        .map_err(|e| ErpError::Permanent(e.to_string()))?,
                    amount_due: Money::parse_canonical(&w.amount_due)
                        .map_err(|e| ErpError::Permanent(e.to_string()))?,
                    currency: Currency::parse(&w.currency).map_err(|e| ErpError::Permanent(e.to_string()))?,
                    status: parse_invoice_status(&w.status),
                    due_date: w
                        .due_date
                        .map(|d| {
                            time::OffsetDateTime::parse(&d, &time::format_description::well_known::Rfc3339)
                        })
                        .transpose()
                        .map_err(|e| ErpError::Permanent(e.to_string()))?,
                    erp_record_id: w.erp_record_id,
                    fetched_at,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FetchOutcome {
            invoices,
            not_found: parsed.not_found.into_iter().map(InvoiceId::new).collect(),
        })
    }

    async fn post_application(&self, application: &Application) -> Result<PostOutcome, ErpError> {
        let body = PostApplicationWire {
            transaction_id: &application.transaction_id,
            customer_id: application.customer_id.as_str(),
            applications: application
                .applications
                .iter()
                .map(|a| InvoiceApplicationWire {
                    invoice_id: a.invoice_id.as_str(),
                    amount_applied: a.amount_applied.to_string(),
                })
                .collect(),
            total_amount: application.total_amount.to_string(),
            currency: application.currency.as_str(),
        };

        let mut req = self.authorize(self.client.post(format!("{}/applications", self.base_url)));
        if self.native_idempotency {
            req = req.header("Idempotency-Key", &application.transaction_id);
        }

        let resp = req.json(&body).send().await.map_err(|e| ErpError::Transient(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, text));
        }

        let parsed: PostApplicationResponseWire =
            resp.json().await.map_err(|e| ErpError::Transient(e.to_string()))?;

        Ok(PostOutcome { erp_transaction_id: parsed.erp_transaction_id, posted_at: parsed.posted_at })
    }

    async fn find_existing_application(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PostOutcome>, ErpError> {
        let resp = self
            .authorize(
                self.client
                    .get(format!("{}/applications/by-reference/{}", self.base_url, transaction_id)),
            )
            .send()
            .await
            .map_err(|e| ErpError::Transient(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, text));
        }
        let parsed: PostApplicationResponseWire =
            resp.json().await.map_err(|e| ErpError::Transient(e.to_string()))?;
        Ok(Some(PostOutcome { erp_transaction_id: parsed.erp_transaction_id, posted_at: parsed.posted_at }))
    }

    async fn test_connection(&self) -> Result<ConnectionStatus, ErpError> {
        let start = std::time::Instant::now();
        let resp = self
            .authorize(self.client.get(format!("{}/health", self.base_url)))
            .send()
            .await
            .map_err(|e| ErpError::Transient(e.to_string()))?;
        let ok = resp.status().is_success();
        Ok(ConnectionStatus { ok, latency_ms: start.elapsed().as_millis() as u64, version: None })
    }
}
