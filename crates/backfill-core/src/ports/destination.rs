//! Destination port - notifications to the system we mirror into.

use async_trait::async_trait;

use crate::domain::{DestinationError, Installation};

#[async_trait]
pub trait Destination: Send + Sync {
    /// Tell the destination the initial backfill of `installation` is done.
    /// Must be idempotent; callers never retry it.
    async fn migration_complete(&self, installation: &Installation)
    -> Result<(), DestinationError>;
}
