//! Durable key-value storage for session material.
//!
//! Provides the [`KeyValueStore`] trait and implementations:
//! - [`FileStore`] - JSON file with 0600 permissions
//! - [`MemoryStore`] - In-memory (testing, ephemeral sessions)
//! - [`KeyringStore`] - System keyring (feature-gated)
//!
//! Values are opaque strings. The session layer decides which keys exist
//! (see [`crate::config::TOKEN_KEY`] and friends).

mod file;
mod memory;

#[cfg(feature = "keyring")]
mod keyring;

use std::sync::Arc;

use async_trait::async_trait;

pub use file::FileStore;
pub use memory::MemoryStore;

#[cfg(feature = "keyring")]
pub use self::keyring::KeyringStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{Error, Result};

/// Trait for key-value storage backends.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove several keys.
    async fn remove_all(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }

    /// Name of this storage backend.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Blanket impl for `Arc<T>`.
#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }
    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }
    async fn remove_all(&self, keys: &[&str]) -> Result<()> {
        (**self).remove_all(keys).await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the store selected by the configuration.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.backend {
        StorageBackend::File => Ok(Arc::new(FileStore::new(config.resolved_path()))),
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "keyring")]
        StorageBackend::Keyring => Ok(Arc::new(KeyringStore::new())),
        #[cfg(not(feature = "keyring"))]
        StorageBackend::Keyring => Err(Error::Config(
            "keyring storage requires the `keyring` feature".into(),
        )),
    }
}
