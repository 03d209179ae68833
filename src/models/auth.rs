//! Authentication request and response bodies.

use serde::{Deserialize, Serialize};

use super::User;

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub nickname: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest<'a> {
    pub nickname: &'a str,
    pub password: &'a str,
    pub contacts: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Credential material returned by login, signup and refresh, inside the
/// `data` envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthPayload {
    #[serde(default, alias = "access_token")]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl AuthPayload {
    /// The bearer token, ignoring empty strings.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    /// The refresh token, ignoring empty strings.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Outcome of a successful login or signup.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
}
