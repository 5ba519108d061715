//! Test double for the destination port.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::domain::{DestinationError, Installation};
use crate::ports::Destination;

/// Counts notifications; can be told to fail them.
#[derive(Debug, Default)]
pub struct RecordingDestination {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let destination = Self::default();
        destination.failing.store(true, Ordering::SeqCst);
        destination
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Destination for RecordingDestination {
    async fn migration_complete(
        &self,
        installation: &Installation,
    ) -> Result<(), DestinationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DestinationError::new(format!(
                "destination {} unavailable",
                installation.destination_host
            )));
        }
        Ok(())
    }
}
