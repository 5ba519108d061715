//! InstallationLimiter - 同一 installation のジョブを直列化する
//!
//! The orchestrator does load -> fetch -> save without a transaction. Two
//! jobs of the same installation running at once would overwrite each other's
//! progress, so workers hold a permit for the installation while handling a
//! job. Jobs of different installations never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::{DestinationHost, InstallationId};

type Key = (DestinationHost, InstallationId);

#[derive(Default)]
struct Slots {
    // 使われていない slot は permit の drop 時に消す
    slots: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

#[derive(Clone, Default)]
pub struct InstallationLimiter {
    inner: Arc<Slots>,
}

impl InstallationLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other permit for this installation is alive.
    pub async fn acquire(
        &self,
        destination_host: &DestinationHost,
        installation_id: InstallationId,
    ) -> InstallationPermit {
        let key = (destination_host.clone(), installation_id);
        let slot = {
            let mut slots = self
                .inner
                .slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        let guard = slot.lock_owned().await;
        InstallationPermit {
            key,
            guard: Some(guard),
            limiter: Arc::clone(&self.inner),
        }
    }

    /// Installations that currently have a permit out or someone waiting.
    pub fn active(&self) -> usize {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Held while one job of the installation runs. Dropping it lets the next
/// job of the same installation in.
pub struct InstallationPermit {
    key: Key,
    guard: Option<OwnedMutexGuard<()>>,
    limiter: Arc<Slots>,
}

impl InstallationPermit {
    pub fn installation_id(&self) -> InstallationId {
        self.key.1
    }
}

impl Drop for InstallationPermit {
    fn drop(&mut self) {
        // guard を先に手放してから slot を掃除する
        drop(self.guard.take());
        let mut slots = self
            .limiter
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(&self.key) {
            // only the map holds it: nobody is running or waiting
            if Arc::strong_count(slot) == 1 {
                slots.remove(&self.key);
            }
        }
    }
}
