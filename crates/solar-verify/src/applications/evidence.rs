use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::PrincipalId;

/// Durable reference to one stored evidence file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(pub String);

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure modes of the evidence store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("evidence store is out of capacity")]
    CapacityExceeded,
    #[error("evidence store io failure: {0}")]
    Io(String),
}

/// Adapter over the binary object store holding evidence photos.
///
/// `delete` exists solely for best-effort cleanup after a failed submission;
/// callers log its failures and never propagate them.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn store(
        &self,
        owner: &PrincipalId,
        label: &str,
        content: &[u8],
    ) -> Result<StorageKey, StorageError>;

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError>;
}
