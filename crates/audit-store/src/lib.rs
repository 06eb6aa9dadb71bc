//! Append-only audit log + transactional state store (AS), spec §4.6.
//! Owns all persisted state; every other component holds transient
//! in-memory views only (spec §3 Ownership).

pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod schema;
pub mod store;

pub use error::AuditError;
pub use memory::InMemoryAuditStore;
pub use pg::{PgAuditStore, PgPool};
pub use store::{AuditFilter, AuditStore, ClaimOutcome, NewAuditEvent, TransactionFilter};
