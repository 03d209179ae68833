//! Main client entry point.

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{AuthApi, HealthApi, LeaderboardApi, PingApi, StreakApi, UsersApi};
use crate::config::Config;
use crate::error::Result;
use crate::session::SessionManager;
use crate::storage::{self, KeyValueStore};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Ping World API client.
///
/// # Examples
///
/// ```rust,no_run
/// use pingworld_client::PingClient;
///
/// # async fn example() -> pingworld_client::Result<()> {
/// let client = PingClient::builder().build().await?;
///
/// if !client.session().is_authenticated().await {
///     client.auth().login("neo", "hunter2").await?;
/// }
///
/// client.ping().send().await?;
/// let streak = client.streak().me().await?;
/// println!("current streak: {}", streak.current);
/// # Ok(())
/// # }
/// ```
pub struct PingClient {
    session: Arc<SessionManager>,
    config: Config,
}

impl PingClient {
    /// Create a builder for configuring the client.
    pub fn builder() -> PingClientBuilder {
        PingClientBuilder::new()
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(&self.session)
    }

    pub fn users(&self) -> UsersApi<'_> {
        UsersApi::new(&self.session)
    }

    pub fn ping(&self) -> PingApi<'_> {
        PingApi::new(&self.session)
    }

    pub fn streak(&self) -> StreakApi<'_> {
        StreakApi::new(&self.session)
    }

    pub fn leaderboard(&self) -> LeaderboardApi<'_> {
        LeaderboardApi::new(&self.session)
    }

    pub fn health(&self) -> HealthApi<'_> {
        HealthApi::new(&self.session)
    }

    /// Get a reference to the session manager.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// A shared handle to the session manager, for use across tasks.
    pub fn session_handle(&self) -> Arc<SessionManager> {
        Arc::clone(&self.session)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for PingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PingClient")
            .field("base_url", &self.config.api.base_url)
            .field("session", &self.session)
            .finish()
    }
}

/// Builder for [`PingClient`].
pub struct PingClientBuilder {
    config: Option<Config>,
    base_url: Option<String>,
    storage: Option<Arc<dyn KeyValueStore>>,
    transport: Option<Arc<dyn HttpTransport>>,
    reqwest_client: Option<reqwest::Client>,
    validate_session: bool,
}

impl PingClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            base_url: None,
            storage: None,
            transport: None,
            reqwest_client: None,
            validate_session: false,
        }
    }

    /// Use a loaded configuration instead of the defaults.
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set a storage backend, ignoring the configured one.
    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set a transport, ignoring the HTTP settings.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set a custom reqwest client.
    pub fn reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.reqwest_client = Some(client);
        self
    }

    /// Check a restored session against the backend during [`build`](Self::build).
    /// A session the backend rejects is dropped; other failures keep it.
    pub fn validate_session(mut self, validate: bool) -> Self {
        self.validate_session = validate;
        self
    }

    /// Build the client and load any stored session.
    pub async fn build(self) -> Result<PingClient> {
        let mut config = self.config.unwrap_or_default();
        if let Some(url) = self.base_url {
            config.api.base_url = url;
        }
        config.validate()?;

        let storage = match self.storage {
            Some(storage) => storage,
            None => storage::from_config(&config.storage)?,
        };

        let transport: Arc<dyn HttpTransport> = match (self.transport, self.reqwest_client) {
            (Some(transport), _) => transport,
            (None, Some(client)) => Arc::new(ReqwestTransport::with_client(client, &config.api.base_url)),
            (None, None) => Arc::new(ReqwestTransport::new(&config.api)?),
        };

        let session = Arc::new(SessionManager::new(storage, transport));
        let restored = session.restore().await;
        if restored && self.validate_session {
            match UsersApi::new(&session).me().await {
                Ok(user) => info!(nickname = user.nickname.as_str(), "Stored session valid"),
                Err(e) if e.requires_reauth() => {
                    info!(error = %e, "Stored session rejected, signing out");
                    session.purge().await?;
                }
                Err(e) => warn!(error = %e, "Could not validate stored session"),
            }
        }

        info!(base_url = config.api.base_url.as_str(), "PingClient initialized");
        Ok(PingClient { session, config })
    }
}

impl Default for PingClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TOKEN_KEY;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_build_restores_stored_session() {
        let store = Arc::new(MemoryStore::with_entries([(TOKEN_KEY, "A")]));
        let client = PingClient::builder()
            .base_url("http://127.0.0.1:9")
            .storage(store)
            .build()
            .await
            .unwrap();

        assert!(client.session().is_authenticated().await);
        assert_eq!(client.config().api.base_url, "http://127.0.0.1:9");
    }

    #[tokio::test]
    async fn test_build_rejects_bad_base_url() {
        let result = PingClient::builder()
            .base_url("ftp://example.com")
            .storage(Arc::new(MemoryStore::new()))
            .build()
            .await;
        assert!(result.is_err());
    }
}
