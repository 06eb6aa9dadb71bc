//! Shared domain types for the cash-application agent: fixed-point money,
//! identifiers, the data model entities, matcher policy, error taxonomy and
//! process configuration. Every other crate in the workspace depends on
//! this one.

pub mod backoff;
pub mod config;
pub mod domain;
pub mod error;
pub mod ids;
pub mod money;
pub mod policy;

pub use domain::*;
pub use error::{ErrorKind, ErrorKindExt};
pub use ids::{CustomerId, ErpSystem, InvoiceId, InvoiceKey, TransactionId, WorkflowId};
pub use money::{Currency, Money};
pub use policy::MatcherPolicy;
