//! Per-device serialization.
//!
//! Two triggers aimed at the same physical device must not interleave their
//! frames. Each device identity key maps to an async mutex that is held from
//! open to close. Different devices never contend.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock table keyed by device identity key. Holds no hardware handles.
/// Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct DeviceLocks {
    table: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `key` is free and take it. Released when the guard drops.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock();
            Arc::clone(table.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of devices seen so far.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}
