//! Credential persistence with an in-memory cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{FCM_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_KEY, USER_DATA_KEY};
use crate::error::{Error, Result};
use crate::models::User;
use crate::storage::KeyValueStore;

/// Bearer token plus the optional refresh token that renews it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

enum Cached {
    Unloaded,
    Loaded(Option<Credential>),
}

/// Reads and writes the credential under fixed storage keys.
///
/// The first read loads from the backing store. After that, reads come from
/// memory and every write goes to both.
///
/// Every [`purge`](Self::purge) starts a new epoch. A refresh that began in
/// an earlier epoch cannot write its result back.
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
    cache: RwLock<Cached>,
    epoch: AtomicU64,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(Cached::Unloaded),
            epoch: AtomicU64::new(0),
        }
    }

    /// Name of the backing store.
    pub fn backend(&self) -> &str {
        self.store.name()
    }

    /// The current credential, loading it from storage on first use.
    ///
    /// A storage read failure is logged and treated as "no credential". It
    /// is not cached, so the next call tries the store again.
    pub async fn current(&self) -> Option<Credential> {
        if let Cached::Loaded(credential) = &*self.cache.read().await {
            return credential.clone();
        }

        let mut cache = self.cache.write().await;
        if let Cached::Loaded(credential) = &*cache {
            return credential.clone();
        }

        match self.load().await {
            Ok(credential) => {
                debug!(
                    backend = self.store.name(),
                    found = credential.is_some(),
                    "Credential loaded from storage"
                );
                *cache = Cached::Loaded(credential.clone());
                credential
            }
            Err(e) => {
                warn!(backend = self.store.name(), error = %e, "Failed to load credential");
                None
            }
        }
    }

    /// The current bearer token.
    pub async fn token(&self) -> Option<String> {
        self.current().await.map(|c| c.token)
    }

    /// Number of purges so far.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Store a new token. A `None` refresh token keeps the stored one.
    ///
    /// The in-memory value is updated even if persisting fails, so the
    /// running process keeps a working session. The error is still returned.
    pub async fn save(&self, token: &str, refresh_token: Option<&str>) -> Result<Credential> {
        let saved = self.write_credential(None, token, refresh_token).await?;
        saved.ok_or_else(|| Error::Storage("credential write skipped".into()))
    }

    /// Like [`save`](Self::save), but only while `epoch` is still current.
    /// Returns `Ok(None)` when the session was purged in the meantime.
    pub async fn save_in_epoch(
        &self,
        epoch: u64,
        token: &str,
        refresh_token: Option<&str>,
    ) -> Result<Option<Credential>> {
        self.write_credential(Some(epoch), token, refresh_token).await
    }

    async fn write_credential(
        &self,
        epoch: Option<u64>,
        token: &str,
        refresh_token: Option<&str>,
    ) -> Result<Option<Credential>> {
        let previous_refresh = self.current().await.and_then(|c| c.refresh_token);

        // Held until the store is written, so a purge cannot interleave.
        let mut cache = self.cache.write().await;
        if epoch.is_some_and(|e| e != self.epoch()) {
            debug!("Session purged since the write was requested, discarding");
            return Ok(None);
        }
        let credential = Credential::new(
            token,
            refresh_token.map(str::to_string).or(previous_refresh),
        );
        *cache = Cached::Loaded(Some(credential.clone()));

        self.store.set(TOKEN_KEY, token).await?;
        if let Some(refresh) = refresh_token {
            self.store.set(REFRESH_TOKEN_KEY, refresh).await?;
        }
        debug!(
            backend = self.store.name(),
            refresh_updated = refresh_token.is_some(),
            "Credential saved"
        );
        Ok(Some(credential))
    }

    /// Remove the credential, cached profile and push token from memory and
    /// storage.
    ///
    /// Memory is cleared first, so the process is signed out even if the
    /// store reports an error.
    pub async fn purge(&self) -> Result<()> {
        self.purge_if(None).await.map(|_| ())
    }

    /// Purge only if no other purge happened since `epoch`. Returns whether
    /// this call purged.
    pub async fn purge_in_epoch(&self, epoch: u64) -> Result<bool> {
        self.purge_if(Some(epoch)).await
    }

    async fn purge_if(&self, epoch: Option<u64>) -> Result<bool> {
        let mut cache = self.cache.write().await;
        if epoch.is_some_and(|e| e != self.epoch()) {
            return Ok(false);
        }
        self.epoch.fetch_add(1, Ordering::AcqRel);
        *cache = Cached::Loaded(None);
        self.store
            .remove_all(&[TOKEN_KEY, REFRESH_TOKEN_KEY, USER_DATA_KEY, FCM_TOKEN_KEY])
            .await?;
        info!(backend = self.store.name(), "Stored credentials purged");
        Ok(true)
    }

    /// Forget the in-memory copy; the next read goes to storage.
    pub async fn invalidate(&self) {
        *self.cache.write().await = Cached::Unloaded;
    }

    /// Cache the signed-in user's profile.
    pub async fn save_user(&self, user: &User) -> Result<()> {
        let json = serde_json::to_string(user).map_err(|e| Error::StorageSerialization(e.to_string()))?;
        self.store.set(USER_DATA_KEY, &json).await
    }

    /// The cached profile, if any. A corrupt entry reads as `None`.
    pub async fn cached_user(&self) -> Option<User> {
        let json = match self.store.get(USER_DATA_KEY).await {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read cached user");
                return None;
            }
        };
        match serde_json::from_str(&json) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Ignoring corrupt cached user");
                None
            }
        }
    }

    /// The push token last uploaded to the backend.
    pub async fn fcm_token(&self) -> Option<String> {
        match self.store.get(FCM_TOKEN_KEY).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read stored push token");
                None
            }
        }
    }

    pub async fn save_fcm_token(&self, token: &str) -> Result<()> {
        self.store.set(FCM_TOKEN_KEY, token).await
    }

    async fn load(&self) -> Result<Option<Credential>> {
        let Some(token) = self.store.get(TOKEN_KEY).await? else {
            return Ok(None);
        };
        let refresh_token = self.store.get(REFRESH_TOKEN_KEY).await?;
        Ok(Some(Credential::new(token, refresh_token)))
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("backend", &self.store.name())
            .finish()
    }
}
