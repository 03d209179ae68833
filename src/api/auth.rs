//! Signup, login and logout.

use tracing::{info, warn};

use super::UsersApi;
use crate::config::{LOGIN_PATH, LOGOUT_PATH, SIGNUP_PATH};
use crate::error::{Error, Result};
use crate::models::{AuthPayload, AuthSession, LoginRequest, SignupRequest};
use crate::session::SessionManager;
use crate::transport::{ApiRequest, ApiResponse};

pub struct AuthApi<'a> {
    session: &'a SessionManager,
}

impl<'a> AuthApi<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    /// Create an account and sign in as it.
    pub async fn signup(
        &self,
        nickname: &str,
        password: &str,
        contacts: &str,
        country: Option<&str>,
    ) -> Result<AuthSession> {
        let body = SignupRequest {
            nickname,
            password,
            contacts,
            country,
        };
        let response = self
            .session
            .execute(ApiRequest::post(SIGNUP_PATH).json(&body)?)
            .await?;
        let session = self.establish(&response).await?;
        info!(nickname, "Signed up");
        Ok(session)
    }

    pub async fn login(&self, nickname: &str, password: &str) -> Result<AuthSession> {
        let body = LoginRequest { nickname, password };
        let response = self
            .session
            .execute(ApiRequest::post(LOGIN_PATH).json(&body)?)
            .await?;
        let session = self.establish(&response).await?;
        info!(nickname, "Logged in");
        Ok(session)
    }

    /// Close the session. Local credentials are purged even when the
    /// backend call fails; that failure is only logged.
    pub async fn logout(&self) -> Result<()> {
        let outcome = self.session.execute(ApiRequest::post(LOGOUT_PATH)).await;
        self.session.purge().await?;
        match outcome {
            Ok(_) => info!("Logged out"),
            Err(e) => warn!(error = %e, "Logout call failed, local session cleared"),
        }
        Ok(())
    }

    /// The session manager has already persisted the credential. Resolve
    /// the profile, asking the backend when the response embeds none.
    async fn establish(&self, response: &ApiResponse) -> Result<AuthSession> {
        if !self.session.is_authenticated().await {
            return Err(Error::NotAuthenticated);
        }

        let payload: AuthPayload = response.data().unwrap_or_default();
        let user = match payload.user {
            Some(user) => user,
            None => UsersApi::new(self.session).me().await?,
        };
        Ok(AuthSession { user })
    }
}
