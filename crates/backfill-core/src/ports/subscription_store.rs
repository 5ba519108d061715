//! SubscriptionStore port - source of truth for sync progress.
//!
//! Callers load a full `Subscription`, mutate their copy and save the whole
//! thing back. There are no field-level updates and no locking: two saves for
//! the same installation race and the last one wins. The worker pool's
//! per-installation limiter is what keeps that from happening.

use async_trait::async_trait;

use crate::domain::{DestinationHost, InstallationId, StoreError, Subscription};

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// `None` when the installation has no subscription (e.g. it was removed).
    async fn load(
        &self,
        destination_host: &DestinationHost,
        installation_id: InstallationId,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Persist the whole subscription, replacing what was stored.
    async fn save(&self, subscription: &Subscription) -> Result<(), StoreError>;
}
