//! Orchestrator (OR), spec §4.4: the durable per-transaction workflow
//! engine coordinating the Extractor, ERP Facade, Matcher and Communicator
//! against the Audit Store.

pub mod cancel;
pub mod error;
pub mod locks;
pub mod service;

pub use cancel::CancelRegistry;
pub use error::OrchestratorError;
pub use locks::KeyedLocks;
pub use service::Orchestrator;
