//! In-memory SubscriptionStore.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{DestinationHost, InstallationId, StoreError, Subscription};
use crate::ports::SubscriptionStore;

type Key = (DestinationHost, InstallationId);

/// Keeps subscriptions in a map. `load` hands out clones, so callers never
/// share state with the store or with each other.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: Mutex<HashMap<Key, Subscription>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove an installation, as uninstalling the app would.
    pub async fn remove(
        &self,
        destination_host: &DestinationHost,
        installation_id: InstallationId,
    ) -> Option<Subscription> {
        self.subscriptions
            .lock()
            .await
            .remove(&(destination_host.clone(), installation_id))
    }

    pub async fn len(&self) -> usize {
        self.subscriptions.lock().await.len()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn load(
        &self,
        destination_host: &DestinationHost,
        installation_id: InstallationId,
    ) -> Result<Option<Subscription>, StoreError> {
        let subscriptions = self.subscriptions.lock().await;
        Ok(subscriptions
            .get(&(destination_host.clone(), installation_id))
            .cloned())
    }

    async fn save(&self, subscription: &Subscription) -> Result<(), StoreError> {
        let key = (
            subscription.destination_host().clone(),
            subscription.installation_id(),
        );
        self.subscriptions
            .lock()
            .await
            .insert(key, subscription.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Installation, SyncStatus};

    #[tokio::test]
    async fn save_then_load_returns_an_independent_copy() {
        let store = InMemorySubscriptionStore::new();
        let host = DestinationHost::new("h");
        let id = InstallationId::new(3);
        assert!(store.load(&host, id).await.unwrap().is_none());

        let mut sub = Subscription::new(Installation::new(id, host.clone()));
        store.save(&sub).await.unwrap();

        sub.sync_status = SyncStatus::Active;
        let loaded = store.load(&host, id).await.unwrap().unwrap();
        assert_eq!(loaded.sync_status, SyncStatus::Pending);
    }

    #[tokio::test]
    async fn installations_are_keyed_by_host_too() {
        let store = InMemorySubscriptionStore::new();
        let id = InstallationId::new(3);
        let sub = Subscription::new(Installation::new(id, DestinationHost::new("a")));
        store.save(&sub).await.unwrap();

        assert!(store.load(&DestinationHost::new("b"), id).await.unwrap().is_none());
        assert!(store.remove(&DestinationHost::new("a"), id).await.is_some());
        assert_eq!(store.len().await, 0);
    }
}
