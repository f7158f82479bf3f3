//! Per-service serialization of deploy runs.
//!
//! Traffic changes do not commute: two overlapping rollbacks can leave a
//! split nobody asked for. Runs against the same service therefore queue
//! behind each other; runs against different services do not interact.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use cutover_core::ServiceTarget;

/// Registry of one async mutex per `region/service`.
#[derive(Clone, Default)]
pub struct DeployLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl DeployLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other run holds `target`, then hold it until the
    /// returned guard is dropped.
    pub async fn acquire(&self, target: &ServiceTarget) -> OwnedMutexGuard<()> {
        let key = target.key();
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(key.clone()).or_default().clone()
        };

        match lock.clone().try_lock_owned() {
            Ok(guard) => {
                debug!(service = %key, "deploy lock acquired");
                guard
            }
            Err(_) => {
                info!(service = %key, "another deploy is in flight, waiting");
                let guard = lock.lock_owned().await;
                info!(service = %key, "deploy lock acquired after wait");
                guard
            }
        }
    }
}
