//! Profile and account management.

use std::borrow::Cow;

use serde_json::json;
use tracing::{debug, info, warn};

use super::{fetch, path};
use crate::error::{Error, Result};
use crate::models::{ProfileUpdate, User};
use crate::session::SessionManager;
use crate::transport::ApiRequest;

pub struct UsersApi<'a> {
    session: &'a SessionManager,
}

impl<'a> UsersApi<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    /// The signed-in user. Refreshes the cached profile.
    pub async fn me(&self) -> Result<User> {
        let user: User = fetch(self.session, ApiRequest::get(path("/users/me"))).await?;
        if let Err(e) = self.session.credentials().save_user(&user).await {
            warn!(error = %e, "Failed to cache user profile");
        }
        Ok(user)
    }

    pub async fn get(&self, id: &str) -> Result<User> {
        let id = segment(id)?;
        fetch(self.session, ApiRequest::get(path(&format!("/users/{id}")))).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        if update.is_empty() {
            return Err(Error::InvalidRequest("profile update has no fields".into()));
        }
        let request = ApiRequest::put(path("/users/me")).json(update)?;
        let user: User = fetch(self.session, request).await?;
        if let Err(e) = self.session.credentials().save_user(&user).await {
            warn!(error = %e, "Failed to cache user profile");
        }
        Ok(user)
    }

    /// Register a push notification token for this device. Returns whether
    /// it was uploaded; the token last uploaded is not sent again.
    pub async fn add_fcm_token(&self, token: &str) -> Result<bool> {
        if token.is_empty() {
            return Err(Error::InvalidRequest("push token is empty".into()));
        }
        let credentials = self.session.credentials();
        if credentials.fcm_token().await.as_deref() == Some(token) {
            debug!("Push token unchanged, skipping upload");
            return Ok(false);
        }

        let request = ApiRequest::post(path("/users/me/fcm")).json(&json!({ "token": token }))?;
        self.session.execute(request).await?;
        if let Err(e) = credentials.save_fcm_token(token).await {
            warn!(error = %e, "Failed to remember uploaded push token");
        }
        info!("Push token registered");
        Ok(true)
    }

    /// Delete the account. Local credentials are purged whatever the
    /// backend answers; a backend failure is still returned.
    pub async fn delete_me(&self) -> Result<()> {
        let outcome = self.session.execute(ApiRequest::delete(path("/users/me"))).await;
        self.session.purge().await?;
        outcome?;
        info!("Account deleted");
        Ok(())
    }

    pub async fn report(&self, id: &str, message: &str) -> Result<()> {
        let id = segment(id)?;
        let request = ApiRequest::post(path(&format!("/users/{id}/report")))
            .json(&json!({ "message": message }))?;
        self.session.execute(request).await?;
        Ok(())
    }
}

/// A user id as one escaped path segment.
fn segment(id: &str) -> Result<Cow<'_, str>> {
    if id.is_empty() || id == "." || id == ".." {
        return Err(Error::InvalidRequest(format!("invalid user id '{id}'")));
    }
    Ok(urlencoding::encode(id))
}
