//! `server`: the HTTP-facing binary wiring EX/EF/MX/CM around the
//! Orchestrator (spec §6), the same CLI-then-`Router::new().with_state`
//! shape as the teacher's `coordinator` binary.

mod config;
mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use audit_store::{AuditStore, InMemoryAuditStore, PgAuditStore};
use clap::Parser;
use communicator::{Communicator, InMemoryTemplateRegistry, LoggingTransport, Template};
use erp_facade::{AuthMode, ErpFacade, HttpErpAdapter};
use extractor::Extractor;
use orchestrator::Orchestrator;

use crate::config::Cli;
use crate::state::AppState;

const TEMPLATE_CONFIRMATION: &str = "payment_confirmation";
const TEMPLATE_CUSTOMER_CLARIFICATION: &str = "short_payment_clarification";
const TEMPLATE_INTERNAL_ALERT: &str = "internal_alert";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let toml = tokio::fs::read_to_string(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("reading config {:?}: {e}", cli.config))?;
    let settings = cash_common::config::Settings::load_from_toml(&toml)?;

    let audit: Arc<dyn AuditStore> = match &cli.database_url {
        Some(url) => {
            tracing::info!("audit store: postgres");
            let manager = diesel::r2d2::ConnectionManager::<diesel::PgConnection>::new(url);
            let pool = diesel::r2d2::Pool::builder().build(manager)?;
            Arc::new(PgAuditStore::new(pool))
        }
        None => {
            tracing::warn!("no --database-url/DATABASE_URL given: using a non-durable in-memory audit store");
            Arc::new(InMemoryAuditStore::new())
        }
    };

    let extractor = Arc::new(Extractor::pattern_only());

    let mut facade = ErpFacade::new();
    for erp in &settings.erp_systems {
        let credential = std::env::var(&erp.credential_ref).map_err(|_| {
            anyhow::anyhow!("erp system '{}': credential env var '{}' is not set", erp.erp_system, erp.credential_ref)
        })?;
        let client = reqwest::Client::new();
        let adapter = HttpErpAdapter::new(
            cash_common::ids::ErpSystem::new(erp.erp_system.clone()),
            erp.base_url.clone(),
            AuthMode::ApiKey { key: credential },
            client,
            true,
        );
        facade.register(Arc::new(adapter), Some(erp.max_concurrency));
    }
    let default_erp_system = settings
        .erp_systems
        .first()
        .map(|c| cash_common::ids::ErpSystem::new(c.erp_system.clone()))
        .ok_or_else(|| anyhow::anyhow!("at least one [[erp_systems]] entry is required"))?;
    let erp_facade = Arc::new(facade);

    let mut templates = InMemoryTemplateRegistry::new();
    templates.register(Template {
        name: TEMPLATE_CONFIRMATION.to_owned(),
        subject_template: "Payment {{transaction_id}} applied".to_owned(),
        body_template: "We applied {{amount}} from transaction {{transaction_id}}.".to_owned(),
        required_fields: vec!["transaction_id".to_owned(), "amount".to_owned()],
    });
    templates.register(Template {
        name: TEMPLATE_CUSTOMER_CLARIFICATION.to_owned(),
        subject_template: "Question about payment {{transaction_id}}".to_owned(),
        body_template:
            "We received {{amount}} but could only match {{unapplied_amount}} remains unapplied. Please clarify which invoice(s) this covers."
                .to_owned(),
        required_fields: vec!["transaction_id".to_owned(), "amount".to_owned(), "unapplied_amount".to_owned()],
    });
    templates.register(Template {
        name: TEMPLATE_INTERNAL_ALERT.to_owned(),
        subject_template: "Cash application needs review: {{transaction_id}}".to_owned(),
        body_template: "Transaction {{transaction_id}} ({{amount}}) requires review: {{discrepancy_code}}."
            .to_owned(),
        required_fields: vec![
            "transaction_id".to_owned(),
            "amount".to_owned(),
            "discrepancy_code".to_owned(),
        ],
    });
    let communicator = Arc::new(Communicator::new(
        Box::new(templates),
        Arc::new(LoggingTransport),
        settings.notification_rate_per_recipient,
        3,
        std::time::Duration::from_secs(30),
    ));

    let bind_addr = SocketAddr::from_str(&settings.bind_addr)?;
    let orchestrator = Orchestrator::new(
        audit.clone(),
        extractor.clone(),
        erp_facade.clone(),
        communicator.clone(),
        settings,
        default_erp_system,
    );

    match orchestrator.reconcile_on_startup().await {
        Ok(n) => tracing::info!(reconciled = n, "crash-recovery reconciliation complete"),
        Err(e) => tracing::error!(error = %e, "crash-recovery reconciliation failed"),
    }

    let app_state = Arc::new(AppState { orchestrator, extractor, erp_facade, communicator, audit });
    let app = routes::router(app_state);

    tracing::info!(%bind_addr, "starting cash-application server");
    axum::Server::bind(&bind_addr).serve(app.into_make_service()).await?;

    Ok(())
}
