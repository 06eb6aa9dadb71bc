//! Per-key async lock table (spec §4.4 "per-account ordering"): one
//! `tokio::sync::Mutex` per `source_account_ref`, lazily created. Same
//! keyed-lock idiom as `erp_facade::facade`'s per-customer table, itself
//! grounded on the teacher's `Arc<Mutex<HashMap<..>>>` in
//! `coordinator/src/routes.rs`'s `AppState`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;

pub struct KeyedLocks {
    locks: SyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        KeyedLocks { locks: SyncMutex::new(HashMap::new()) }
    }

    pub fn get(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(key.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_returns_same_lock() {
        let locks = KeyedLocks::new();
        let a = locks.get("ACC-1");
        let b = locks.get("ACC-1");
        let _guard = a.lock().await;
        assert!(b.try_lock().is_err());
    }

    #[tokio::test]
    async fn distinct_keys_are_independent() {
        let locks = KeyedLocks::new();
        let a = locks.get("ACC-1");
        let b = locks.get("ACC-2");
        let _guard = a.lock().await;
        assert!(b.try_lock().is_ok());
    }
}
