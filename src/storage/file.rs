//! File-based key-value storage with secure permissions.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::KeyValueStore;
use crate::error::{Error, Result};

/// File-based storage: one JSON object per file, written with 0600 permissions.
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    /// Create storage at the specified path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Create storage at the default path: `~/.config/pingworld/session.json`
    pub fn default_path() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Cannot determine config directory".into()))?;
        Ok(Self::new(config_dir.join("pingworld").join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::storage_io(&self.path, e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| Error::StorageSerialization(e.to_string()))
    }

    fn write_all(&self, data: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::storage_io(parent, e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(data)
            .map_err(|e| Error::StorageSerialization(e.to_string()))?;

        // Write to a temp file in the same directory, then atomically rename.
        let tmp_path = self.path.with_extension("tmp");
        // A leftover temp file would keep its old permissions.
        match std::fs::remove_file(&tmp_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::storage_io(&tmp_path, e.to_string())),
        }

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(0o600)
                .open(&tmp_path)
                .map_err(|e| Error::storage_io(&tmp_path, e.to_string()))?;
            file.write_all(content.as_bytes())
                .map_err(|e| Error::storage_io(&tmp_path, e.to_string()))?;
            file.sync_all()
                .map_err(|e| Error::storage_io(&tmp_path, e.to_string()))?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&tmp_path, &content)
                .map_err(|e| Error::storage_io(&tmp_path, e.to_string()))?;
        }

        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| Error::storage_io(&self.path, format!("atomic rename: {}", e)))?;

        debug!(path = %self.path.display(), keys = data.len(), "Session file written");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all()?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.read_all()?;
        data.insert(key.to_string(), value.to_string());
        self.write_all(&data)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.read_all()?;
        if data.remove(key).is_some() {
            self.write_all(&data)?;
        }
        Ok(())
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.read_all()?;
        let before = data.len();
        for key in keys {
            data.remove(*key);
        }
        if data.len() != before {
            self.write_all(&data)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}
