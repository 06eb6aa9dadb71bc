//! Shared axum state (spec §6), the same `Arc<AppState>` + `with_state`
//! shape as the teacher's `coordinator::routes::AppState`.

use std::sync::Arc;

use audit_store::AuditStore;
use communicator::Communicator;
use erp_facade::ErpFacade;
use extractor::Extractor;
use orchestrator::Orchestrator;

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub extractor: Arc<Extractor>,
    pub erp_facade: Arc<ErpFacade>,
    pub communicator: Arc<Communicator>,
    pub audit: Arc<dyn AuditStore>,
}
