//! Cooperative cancellation (spec §4.4/§5): a flag checked at each
//! suspension point. Never interrupts an in-flight external call -- the
//! running step always finishes before the flag is observed again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cash_common::ids::WorkflowId;
use parking_lot::Mutex;

#[derive(Default)]
pub struct CancelRegistry {
    flags: Mutex<HashMap<WorkflowId, Arc<AtomicBool>>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, workflow_id: WorkflowId) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.flags.lock().insert(workflow_id, flag.clone());
        flag
    }

    /// Returns `true` if a workflow with this id is currently tracked (i.e.
    /// still running) and the cancel request was recorded.
    pub fn request_cancel(&self, workflow_id: &WorkflowId) -> bool {
        match self.flags.lock().get(workflow_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn unregister(&self, workflow_id: &WorkflowId) {
        self.flags.lock().remove(workflow_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_after_register_is_observed() {
        let registry = CancelRegistry::new();
        let id = WorkflowId::new();
        let flag = registry.register(id);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(registry.request_cancel(&id));
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn cancel_of_unknown_workflow_is_false() {
        let registry = CancelRegistry::new();
        assert!(!registry.request_cancel(&WorkflowId::new()));
    }
}
