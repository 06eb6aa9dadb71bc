//! Strongly-typed identifiers. Thin `String`/`Uuid` newtypes so that e.g. a
//! `CustomerId` can never be passed where an `InvoiceId` is expected.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_owned())
            }
        }
    };
}

string_id!(TransactionId);
string_id!(InvoiceId);
string_id!(ErpSystem);
string_id!(CustomerId);

/// Server-assigned workflow identifier. Distinct from `TransactionId`: a
/// replayed `StartWorkflow` call for the same transaction returns the
/// original `WorkflowId`, which is handed out once at Claim time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    pub fn new() -> Self {
        WorkflowId(Uuid::new_v4())
    }

    /// Deterministic id derived from the transaction id, so that claiming is
    /// idempotent without needing a lookup before the insert attempt.
    pub fn for_transaction(transaction_id: &TransactionId) -> Self {
        WorkflowId(Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            transaction_id.as_str().as_bytes(),
        ))
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique key for an invoice: `(invoice_id, erp_system)` per spec §3.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InvoiceKey {
    pub invoice_id: InvoiceId,
    pub erp_system: ErpSystem,
}

impl fmt::Display for InvoiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.invoice_id, self.erp_system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_id_for_transaction_is_deterministic() {
        let txn = TransactionId::new("TXN-001");
        let a = WorkflowId::for_transaction(&txn);
        let b = WorkflowId::for_transaction(&txn);
        assert_eq!(a, b);

        let other = WorkflowId::for_transaction(&TransactionId::new("TXN-002"));
        assert_ne!(a, other);
    }
}
