//! Session lifecycle manager.
//!
//! Decorates requests with the stored bearer token, persists credentials
//! returned by login and signup, and recovers from an expired session with
//! one shared refresh and at most one retry per request.

use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::credentials::{Credential, CredentialStore};
use super::endpoints::AuthEndpoint;
use super::pending::PendingRequest;
use crate::config::REFRESH_PATH;
use crate::error::{Error, Result};
use crate::models::{AuthPayload, RefreshRequest};
use crate::storage::KeyValueStore;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};

type RefreshFuture = Shared<BoxFuture<'static, Option<String>>>;

struct InFlight {
    generation: u64,
    future: RefreshFuture,
}

#[derive(Default)]
struct RefreshState {
    next_generation: u64,
    in_flight: Option<InFlight>,
}

/// Empties the refresh slot when the refresh future finishes, panics, or is
/// dropped, whichever comes first.
struct ClearOnExit {
    state: Weak<Mutex<RefreshState>>,
    generation: u64,
}

impl Drop for ClearOnExit {
    fn drop(&mut self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let finished = {
            let mut state = state.lock();
            let current = state
                .in_flight
                .as_ref()
                .is_some_and(|in_flight| in_flight.generation == self.generation);
            if current { state.in_flight.take() } else { None }
        };
        // Dropped outside the lock.
        drop(finished);
    }
}

/// Owns the authenticated session of one client.
///
/// Thread-safe: share it behind an `Arc` across tasks. Construct one per
/// signed-in process, or one per test.
pub struct SessionManager {
    credentials: Arc<CredentialStore>,
    transport: Arc<dyn HttpTransport>,
    refresh: Arc<Mutex<RefreshState>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KeyValueStore>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials: Arc::new(CredentialStore::new(store)),
            transport,
            refresh: Arc::new(Mutex::new(RefreshState::default())),
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// The underlying transport, bypassing session handling.
    pub fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    /// Load the stored session, if any. Returns whether one exists.
    pub async fn restore(&self) -> bool {
        let restored = self.credentials.current().await.is_some();
        info!(
            backend = self.credentials.backend(),
            restored, "Session restore"
        );
        restored
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.credentials.current().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.credentials.current().await.is_some()
    }

    /// Clear all session material.
    pub async fn purge(&self) -> Result<()> {
        self.credentials.purge().await
    }

    /// Send a request with full session handling. Non-success statuses come
    /// back as [`Error::Api`] after any recovery attempt.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut pending = PendingRequest::new(request);
        self.decorate(&mut pending).await?;

        let response = self.transport.send(&pending.request).await?;
        if response.is_success() {
            self.on_response(&pending, &response).await;
            return Ok(response);
        }

        let error = Error::api(response.status, &response.body);
        self.on_error(pending, error).await
    }

    /// Attach the stored token unless the target is a login, signup or
    /// refresh endpoint. Without a stored token the request goes out bare.
    pub async fn decorate(&self, pending: &mut PendingRequest) -> Result<()> {
        let endpoint = AuthEndpoint::classify(pending.path());
        if endpoint.is_some_and(|e| !e.carries_credential()) {
            pending.request.clear_bearer();
            pending.sent_with = None;
            debug!(path = pending.path(), "Auth endpoint - not adding token");
            return Ok(());
        }

        match self.credentials.token().await {
            Some(token) => {
                pending.request.set_bearer(&token)?;
                pending.sent_with = Some(token);
                debug!(path = pending.path(), "Token added to request");
            }
            None => {
                pending.request.clear_bearer();
                pending.sent_with = None;
                debug!(path = pending.path(), "No token available for request");
            }
        }
        Ok(())
    }

    /// Persist credential material from a successful login or signup.
    pub async fn on_response(&self, pending: &PendingRequest, response: &ApiResponse) {
        let Some(endpoint) = AuthEndpoint::classify(pending.path()) else {
            return;
        };
        if !endpoint.issues_credential() || !response.is_success() {
            return;
        }

        let payload: AuthPayload = match response.data() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(path = pending.path(), error = %e, "Unreadable auth response");
                return;
            }
        };

        match payload.token() {
            Some(token) => {
                if let Err(e) = self.credentials.save(token, payload.refresh_token()).await {
                    warn!(error = %e, "Failed to persist credential");
                }
                info!(
                    ?endpoint,
                    has_refresh_token = payload.refresh_token().is_some(),
                    "Token saved after authentication"
                );
            }
            None => warn!(?endpoint, "No token found in auth response"),
        }

        if let Some(user) = &payload.user {
            if let Err(e) = self.credentials.save_user(user).await {
                warn!(error = %e, "Failed to cache user profile");
            }
        }
    }

    /// Recover from an expired session.
    ///
    /// Only a 401 from a protected endpoint that has not been retried is
    /// handled. Every other error is returned unchanged. If no credential
    /// can be obtained the original error is returned.
    pub async fn on_error(&self, mut pending: PendingRequest, error: Error) -> Result<ApiResponse> {
        if !error.is_unauthorized() || pending.retried {
            return Err(error);
        }
        if let Some(endpoint) = AuthEndpoint::classify(pending.path()) {
            debug!(?endpoint, "401 on auth endpoint - not a session expiry");
            return Err(error);
        }

        pending.retried = true;
        warn!(path = pending.path(), "401 on protected endpoint - refreshing session");

        let Some(token) = self.refreshed_token(pending.sent_with.clone()).await else {
            info!(path = pending.path(), "No credential after refresh, giving up");
            return Err(error);
        };

        pending.request.set_bearer(&token)?;
        pending.sent_with = Some(token);
        debug!(path = pending.path(), "Retrying request with new token");

        let response = self.transport.send(&pending.request).await?;
        if response.is_success() {
            self.on_response(&pending, &response).await;
            Ok(response)
        } else {
            Err(Error::api(response.status, &response.body))
        }
    }

    /// Refresh now, regardless of the current token's state.
    pub async fn force_refresh(&self) -> Result<String> {
        let current = self.credentials.token().await;
        if current.is_none() {
            return Err(Error::NotAuthenticated);
        }
        self.refreshed_token(current)
            .await
            .ok_or_else(|| Error::RefreshFailed("session could not be refreshed".into()))
    }

    /// Join the refresh in flight, or start one. `stale` is the token the
    /// failed request carried.
    async fn refreshed_token(&self, stale: Option<String>) -> Option<String> {
        let future = {
            let mut guard = self.refresh.lock();
            let state = &mut *guard;
            match &state.in_flight {
                Some(in_flight) => {
                    debug!(generation = in_flight.generation, "Joining in-flight refresh");
                    in_flight.future.clone()
                }
                None => {
                    state.next_generation += 1;
                    let generation = state.next_generation;
                    let clear = ClearOnExit {
                        state: Arc::downgrade(&self.refresh),
                        generation,
                    };
                    let future = refresh_session(
                        Arc::clone(&self.credentials),
                        Arc::clone(&self.transport),
                        stale,
                        clear,
                    )
                    .boxed()
                    .shared();
                    state.in_flight = Some(InFlight {
                        generation,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }
}

/// The body of one shared refresh. Resolves to the token every waiter
/// should retry with, or `None` after purging the session.
async fn refresh_session(
    credentials: Arc<CredentialStore>,
    transport: Arc<dyn HttpTransport>,
    stale: Option<String>,
    clear: ClearOnExit,
) -> Option<String> {
    let _clear = clear;

    let epoch = credentials.epoch();
    let current = credentials.current().await;
    if let Some(credential) = &current {
        if stale.as_deref() != Some(credential.token.as_str()) {
            debug!("Token already replaced by another request, skipping refresh");
            return Some(credential.token.clone());
        }
    }

    let outcome = match current.and_then(|c| c.refresh_token) {
        Some(refresh_token) => request_refresh(transport.as_ref(), &refresh_token).await,
        None => Err(Error::RefreshFailed("no refresh token available".into())),
    };

    match outcome {
        Ok((token, refresh_token)) => {
            match credentials
                .save_in_epoch(epoch, &token, refresh_token.as_deref())
                .await
            {
                Ok(None) => {
                    info!("Session ended during refresh, discarding new token");
                    return None;
                }
                Ok(Some(_)) => {}
                Err(e) => warn!(error = %e, "Failed to persist refreshed credential"),
            }
            info!(refresh_rotated = refresh_token.is_some(), "Access token refreshed");
            Some(token)
        }
        Err(e) => {
            warn!(error = %e, "Session refresh failed, clearing credentials");
            // A session started after a logout is not ours to clear.
            if let Err(e) = credentials.purge_in_epoch(epoch).await {
                warn!(error = %e, "Failed to purge stored credentials");
            }
            None
        }
    }
}

async fn request_refresh(
    transport: &dyn HttpTransport,
    refresh_token: &str,
) -> Result<(String, Option<String>)> {
    debug!("Calling refresh endpoint");
    let request = ApiRequest::post(REFRESH_PATH).json(&RefreshRequest { refresh_token })?;
    let response = transport.send(&request).await?;
    if !response.is_success() {
        return Err(Error::RefreshFailed(format!(
            "refresh endpoint returned {}",
            response.status
        )));
    }

    let payload: AuthPayload = response.data()?;
    let token = payload
        .token()
        .ok_or_else(|| Error::RefreshFailed("no token in refresh response".into()))?
        .to_string();
    Ok((token, payload.refresh_token().map(str::to_string)))
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("credentials", &self.credentials)
            .field("transport", &self.transport.name())
            .field("refresh_in_flight", &self.refresh.lock().in_flight.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LOGIN_PATH, LOGOUT_PATH, REFRESH_TOKEN_KEY, SIGNUP_PATH, TOKEN_KEY, USER_DATA_KEY};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::time::Duration;

    const ME: &str = "/api/v1/users/me";

    type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync;

    /// In-process transport answering from a closure and recording calls.
    struct ScriptedTransport {
        handler: Box<Handler>,
        refresh_delay: Duration,
        sent: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        fn new(handler: impl Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync + 'static) -> Self {
            Self {
                handler: Box::new(handler),
                refresh_delay: Duration::ZERO,
                sent: Mutex::new(Vec::new()),
            }
        }

        fn with_refresh_delay(mut self, delay: Duration) -> Self {
            self.refresh_delay = delay;
            self
        }

        fn calls(&self, path: &str) -> usize {
            self.sent.lock().iter().filter(|r| r.path == path).count()
        }

        fn sent(&self) -> Vec<ApiRequest> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
            self.sent.lock().push(request.clone());
            if request.path == REFRESH_PATH && !self.refresh_delay.is_zero() {
                tokio::time::sleep(self.refresh_delay).await;
            }
            (self.handler)(request)
        }
    }

    fn body_field<'a>(request: &'a ApiRequest, field: &str) -> Option<&'a str> {
        request.body.as_ref().and_then(|b| b.get(field)).and_then(|v| v.as_str())
    }

    /// `/users/me` accepts only `valid`; refresh rotates R1 -> B/R2 and R2 -> C/R3.
    fn backend(valid: &'static str) -> impl Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync {
        move |req| {
            if req.path == REFRESH_PATH {
                return Ok(match body_field(req, "refresh_token") {
                    Some("R1") => ApiResponse::new(200, r#"{"data":{"token":"B","refresh_token":"R2"}}"#),
                    Some("R2") => ApiResponse::new(200, r#"{"data":{"token":"C","refresh_token":"R3"}}"#),
                    _ => ApiResponse::new(401, "invalid refresh token"),
                });
            }
            if req.bearer() == Some(valid) {
                Ok(ApiResponse::new(200, r#"{"data":{"id":1,"nickname":"neo"}}"#))
            } else {
                Ok(ApiResponse::new(401, "token expired"))
            }
        }
    }

    fn session_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_entries([(TOKEN_KEY, "A"), (REFRESH_TOKEN_KEY, "R1")]))
    }

    fn manager(store: &Arc<MemoryStore>, transport: &Arc<ScriptedTransport>) -> SessionManager {
        SessionManager::new(store.clone(), transport.clone())
    }

    async fn stored(store: &MemoryStore, key: &str) -> Option<String> {
        store.get(key).await.unwrap()
    }

    #[tokio::test]
    async fn test_decorates_when_credential_present() {
        let store = session_store();
        let transport = Arc::new(ScriptedTransport::new(backend("A")));
        let session = manager(&store, &transport);

        session.execute(ApiRequest::get(ME)).await.unwrap();
        assert_eq!(transport.sent()[0].bearer(), Some("A"));
    }

    #[tokio::test]
    async fn test_no_decoration_without_credential() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new(backend("A")));
        let session = manager(&store, &transport);

        let mut stale = ApiRequest::get(ME);
        stale.set_bearer("left-over").unwrap();
        let err = session.execute(stale).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert!(transport.sent()[0].bearer().is_none());
        assert_eq!(transport.calls(REFRESH_PATH), 0);
    }

    #[tokio::test]
    async fn test_auth_endpoints_never_decorated() {
        let store = session_store();
        let transport = Arc::new(ScriptedTransport::new(|_| Ok(ApiResponse::new(200, "{}"))));
        let session = manager(&store, &transport);

        for path in [LOGIN_PATH, SIGNUP_PATH, REFRESH_PATH] {
            session.execute(ApiRequest::post(path)).await.unwrap();
        }
        session.execute(ApiRequest::post(LOGOUT_PATH)).await.unwrap();

        let sent = transport.sent();
        assert!(sent[..3].iter().all(|r| r.bearer().is_none()));
        assert_eq!(sent[3].bearer(), Some("A"));
    }

    #[tokio::test]
    async fn test_login_response_persists_credential() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new(|_| {
            Ok(ApiResponse::new(
                200,
                r#"{"data":{"token":"A","refresh_token":"R1","user":{"id":"7","nickname":"neo"}}}"#,
            ))
        }));
        let session = manager(&store, &transport);

        session.execute(ApiRequest::post(LOGIN_PATH)).await.unwrap();

        assert_eq!(stored(&store, TOKEN_KEY).await.as_deref(), Some("A"));
        assert_eq!(stored(&store, REFRESH_TOKEN_KEY).await.as_deref(), Some("R1"));
        assert!(stored(&store, USER_DATA_KEY).await.unwrap().contains("neo"));
        assert_eq!(session.credential().await.unwrap().token, "A");
    }

    #[tokio::test]
    async fn test_signup_without_token_leaves_storage_alone() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new(|_| Ok(ApiResponse::new(200, r#"{"data":{}}"#))));
        let session = manager(&store, &transport);

        session.execute(ApiRequest::post(SIGNUP_PATH)).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_refresh_and_retry_scenario() {
        let store = session_store();
        let transport = Arc::new(ScriptedTransport::new(backend("B")));
        let session = manager(&store, &transport);

        let response = session.execute(ApiRequest::get(ME)).await.unwrap();
        assert_eq!(response.status, 200);

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].bearer(), Some("A"));
        assert_eq!(sent[1].path, REFRESH_PATH);
        assert!(sent[1].bearer().is_none());
        assert_eq!(body_field(&sent[1], "refresh_token"), Some("R1"));
        assert_eq!(sent[2].bearer(), Some("B"));

        assert_eq!(stored(&store, TOKEN_KEY).await.as_deref(), Some("B"));
        assert_eq!(stored(&store, REFRESH_TOKEN_KEY).await.as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn test_concurrent_expiry_shares_one_refresh() {
        let store = session_store();
        let transport = Arc::new(
            ScriptedTransport::new(backend("B")).with_refresh_delay(Duration::from_millis(50)),
        );
        let session = manager(&store, &transport);

        let results =
            futures::future::join_all((0..8).map(|_| session.execute(ApiRequest::get(ME)))).await;

        assert!(results.iter().all(|r| r.as_ref().is_ok_and(|resp| resp.status == 200)));
        assert_eq!(transport.calls(REFRESH_PATH), 1);
        assert_eq!(transport.calls(ME), 16);
        assert_eq!(stored(&store, TOKEN_KEY).await.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_concurrent_expiry_with_failed_refresh() {
        let store = Arc::new(MemoryStore::with_entries([(TOKEN_KEY, "A"), (REFRESH_TOKEN_KEY, "revoked")]));
        let transport = Arc::new(
            ScriptedTransport::new(backend("B")).with_refresh_delay(Duration::from_millis(50)),
        );
        let session = manager(&store, &transport);

        let results =
            futures::future::join_all((0..8).map(|_| session.execute(ApiRequest::get(ME)))).await;

        for result in results {
            match result {
                Err(Error::Api { status, message }) => {
                    assert_eq!(status, 401);
                    assert_eq!(message, "token expired");
                }
                other => panic!("expected original 401, got {other:?}"),
            }
        }
        assert_eq!(transport.calls(REFRESH_PATH), 1);
        assert_eq!(transport.calls(ME), 8);
        assert!(store.is_empty().await);
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_request_retried_at_most_once() {
        let store = session_store();
        // No token is ever accepted.
        let transport = Arc::new(ScriptedTransport::new(backend("never")));
        let session = manager(&store, &transport);

        let err = session.execute(ApiRequest::get(ME)).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(transport.calls(ME), 2);
        assert_eq!(transport.calls(REFRESH_PATH), 1);
    }

    #[tokio::test]
    async fn test_refresh_slot_released_for_next_expiry() {
        let store = session_store();
        let transport = Arc::new(ScriptedTransport::new(backend("C")));
        let session = manager(&store, &transport);

        // A -> refresh -> B, which is rejected too.
        assert!(session.execute(ApiRequest::get(ME)).await.is_err());
        // B -> refresh -> C.
        let response = session.execute(ApiRequest::get(ME)).await.unwrap();
        assert_eq!(response.status, 200);

        assert_eq!(transport.calls(REFRESH_PATH), 2);
        assert_eq!(stored(&store, TOKEN_KEY).await.as_deref(), Some("C"));
        assert_eq!(stored(&store, REFRESH_TOKEN_KEY).await.as_deref(), Some("R3"));
    }

    #[tokio::test]
    async fn test_no_refresh_token_purges_without_calling_backend() {
        let store = Arc::new(MemoryStore::with_entries([(TOKEN_KEY, "A"), (USER_DATA_KEY, "{}")]));
        let transport = Arc::new(ScriptedTransport::new(backend("B")));
        let session = manager(&store, &transport);

        let err = session.execute(ApiRequest::get(ME)).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(transport.calls(REFRESH_PATH), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_refresh_transport_failure_purges() {
        let store = session_store();
        let transport = Arc::new(ScriptedTransport::new(|req| {
            if req.path == REFRESH_PATH {
                Err(Error::Timeout)
            } else {
                Ok(ApiResponse::new(401, "token expired"))
            }
        }));
        let session = manager(&store, &transport);

        let err = session.execute(ApiRequest::get(ME)).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_refresh_response_without_token_purges() {
        let store = session_store();
        let transport = Arc::new(ScriptedTransport::new(|req| {
            if req.path == REFRESH_PATH {
                Ok(ApiResponse::new(200, r#"{"data":{}}"#))
            } else {
                Ok(ApiResponse::new(401, "token expired"))
            }
        }));
        let session = manager(&store, &transport);

        assert!(session.execute(ApiRequest::get(ME)).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_login_401_surfaces_without_refresh() {
        let store = session_store();
        let transport = Arc::new(ScriptedTransport::new(|_| Ok(ApiResponse::new(401, "bad credentials"))));
        let session = manager(&store, &transport);

        let err = session.execute(ApiRequest::post(LOGIN_PATH)).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 401, ref message } if message == "bad credentials"));
        assert_eq!(transport.calls(REFRESH_PATH), 0);
        assert_eq!(stored(&store, TOKEN_KEY).await.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_network_failure_not_treated_as_expiry() {
        let store = session_store();
        let transport = Arc::new(ScriptedTransport::new(|_| Err(Error::Timeout)));
        let session = manager(&store, &transport);

        let err = session.execute(ApiRequest::get(ME)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(transport.calls(REFRESH_PATH), 0);
        assert_eq!(stored(&store, TOKEN_KEY).await.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_other_errors_pass_through() {
        let store = session_store();
        let transport = Arc::new(ScriptedTransport::new(|_| Ok(ApiResponse::new(500, "boom"))));
        let session = manager(&store, &transport);

        let err = session.execute(ApiRequest::get(ME)).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 500, .. }));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_request_reuses_replaced_token() {
        let store = session_store();
        let transport = Arc::new(ScriptedTransport::new(backend("B")));
        let session = manager(&store, &transport);

        let mut pending = PendingRequest::new(ApiRequest::get(ME));
        session.decorate(&mut pending).await.unwrap();
        // Another request refreshed in the meantime.
        session.credentials().save("B", Some("R2")).await.unwrap();

        let response = session.on_error(pending, Error::api(401, "token expired")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(transport.calls(REFRESH_PATH), 0);
        assert_eq!(transport.sent()[0].bearer(), Some("B"));
    }

    #[tokio::test]
    async fn test_retried_request_not_recovered_again() {
        let store = session_store();
        let transport = Arc::new(ScriptedTransport::new(backend("B")));
        let session = manager(&store, &transport);

        let mut pending = PendingRequest::new(ApiRequest::get(ME));
        pending.retried = true;
        let err = session.on_error(pending, Error::api(401, "")).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_force_refresh() {
        let store = session_store();
        let transport = Arc::new(ScriptedTransport::new(backend("B")));
        let session = manager(&store, &transport);

        assert_eq!(session.force_refresh().await.unwrap(), "B");
        assert_eq!(transport.calls(REFRESH_PATH), 1);

        session.purge().await.unwrap();
        assert!(matches!(session.force_refresh().await, Err(Error::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_purge_during_refresh_keeps_session_closed() {
        let store = session_store();
        let transport = Arc::new(
            ScriptedTransport::new(backend("B")).with_refresh_delay(Duration::from_millis(100)),
        );
        let session = manager(&store, &transport);

        let (result, purged) = tokio::join!(session.execute(ApiRequest::get(ME)), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            session.purge().await
        });

        purged.unwrap();
        assert!(result.unwrap_err().is_unauthorized());
        assert_eq!(transport.calls(REFRESH_PATH), 1);
        assert_eq!(transport.calls(ME), 1);
        assert!(store.is_empty().await);
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_failed_refresh_spares_newer_login() {
        let store = session_store();
        let transport = Arc::new(
            ScriptedTransport::new(|req| {
                Ok(match req.path.as_str() {
                    LOGIN_PATH => ApiResponse::new(200, r#"{"data":{"token":"L","refresh_token":"RL"}}"#),
                    _ => ApiResponse::new(401, "token expired"),
                })
            })
            .with_refresh_delay(Duration::from_millis(100)),
        );
        let session = manager(&store, &transport);

        let (result, relogin) = tokio::join!(session.execute(ApiRequest::get(ME)), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            session.purge().await.unwrap();
            session.execute(ApiRequest::post(LOGIN_PATH)).await
        });

        assert!(result.unwrap_err().is_unauthorized());
        relogin.unwrap();
        assert_eq!(stored(&store, TOKEN_KEY).await.as_deref(), Some("L"));
        assert_eq!(stored(&store, REFRESH_TOKEN_KEY).await.as_deref(), Some("RL"));
    }

    #[tokio::test]
    async fn test_restore() {
        let transport = Arc::new(ScriptedTransport::new(backend("A")));
        assert!(manager(&session_store(), &transport).restore().await);
        assert!(!manager(&Arc::new(MemoryStore::new()), &transport).restore().await);
    }
}
