//! File-backed SubscriptionStore: one pretty-printed JSON document per
//! installation.
//!
//! Saves go through a temp file in the same directory followed by a rename,
//! so a crash mid-save leaves the previous document intact.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use ulid::Ulid;

use crate::domain::{DestinationHost, InstallationId, StoreError, Subscription};
use crate::ports::SubscriptionStore;

pub struct JsonFileSubscriptionStore {
    dir: PathBuf,
}

impl JsonFileSubscriptionStore {
    /// Use `dir` as the store root, creating it if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hosts are arbitrary URLs. The file name carries a fixed-length
    /// SHA-256 of the host so it stays portable whatever the host length.
    fn path_for(&self, destination_host: &DestinationHost, installation_id: InstallationId) -> PathBuf {
        let host_digest = hex::encode(Sha256::digest(destination_host.as_str().as_bytes()));
        self.dir
            .join(format!("{host_digest}-{installation_id}.json"))
    }
}

#[async_trait]
impl SubscriptionStore for JsonFileSubscriptionStore {
    async fn load(
        &self,
        destination_host: &DestinationHost,
        installation_id: InstallationId,
    ) -> Result<Option<Subscription>, StoreError> {
        let path = self.path_for(destination_host, installation_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save(&self, subscription: &Subscription) -> Result<(), StoreError> {
        let path = self.path_for(
            subscription.destination_host(),
            subscription.installation_id(),
        );
        let bytes = serde_json::to_vec_pretty(subscription)?;

        let tmp = path.with_extension(format!("json.{}.tmp", Ulid::new()));
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(err) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        tracing::trace!(path = %path.display(), bytes = bytes.len(), "subscription saved");
        Ok(())
    }
}
