//! The `ErpAdapter` seam (spec §4.2, §9 "Dynamic dispatch over ERP
//! variants"): one trait object per configured `erp_system`, composed by
//! the facade via a registry keyed by system name -- not inheritance. Each
//! variant owns its own credential/session state.

use async_trait::async_trait;
use cash_common::domain::Invoice;
use cash_common::ids::{CustomerId, InvoiceId};
use cash_common::money::{Currency, Money};

use crate::error::ErpError;

#[derive(Debug, Clone)]
pub struct Application {
    pub transaction_id: String,
    pub customer_id: CustomerId,
    pub applications: Vec<InvoiceApplication>,
    pub total_amount: Money,
    pub currency: Currency,
}

#[derive(Debug, Clone)]
pub struct InvoiceApplication {
    pub invoice_id: InvoiceId,
    pub amount_applied: Money,
}

#[derive(Debug, Clone)]
pub struct PostOutcome {
    pub erp_transaction_id: String,
    pub posted_at: time::OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub invoices: Vec<Invoice>,
    pub not_found: Vec<InvoiceId>,
}

#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub ok: bool,
    pub latency_ms: u64,
    pub version: Option<String>,
}

/// Auth scheme owned by each adapter instance (spec §4.2 "Variants"): one
/// concrete `ErpAdapter` implementation per vendor family, distinguished
/// here by the credential it carries rather than by separate trait impls,
/// since the wire shape (generic REST) is the same across vendors in this
/// exercise's scope.
#[derive(Debug, Clone)]
pub enum AuthMode {
    OAuth2 { access_token: String },
    Certificate { cert_ref: String },
    ApiKey { key: String },
    Generic,
}

#[async_trait]
pub trait ErpAdapter: Send + Sync {
    fn erp_system(&self) -> &str;

    /// Whether the underlying ERP accepts a caller-supplied idempotency key
    /// natively; when `false` the facade falls back to a pre-flight read
    /// (spec §4.2 Idempotency).
    fn supports_native_idempotency(&self) -> bool;

    async fn fetch_invoices(
        &self,
        invoice_ids: &[InvoiceId],
        customer_id: Option<&CustomerId>,
    ) -> Result<FetchOutcome, ErpError>;

    async fn post_application(&self, application: &Application) -> Result<PostOutcome, ErpError>;

    /// Used only when `supports_native_idempotency() == false`: looks for a
    /// prior posting bearing `transaction_id` in a reference field.
    async fn find_existing_application(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PostOutcome>, ErpError>;

    async fn test_connection(&self) -> Result<ConnectionStatus, ErpError>;
}
