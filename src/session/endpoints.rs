//! Classification of authentication endpoints.

use crate::config::{LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH, SIGNUP_PATH};

/// A backend route that establishes or destroys a session.
///
/// None of these go through expiry recovery: a 401 from login is a
/// "bad credentials" answer, not an expired session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEndpoint {
    Login,
    Signup,
    Refresh,
    Logout,
}

impl AuthEndpoint {
    /// Classify a request path. Query strings are ignored.
    pub fn classify(path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or(path);
        let path = path.trim_end_matches('/');
        if path.ends_with(suffix(LOGIN_PATH)) {
            Some(Self::Login)
        } else if path.ends_with(suffix(SIGNUP_PATH)) {
            Some(Self::Signup)
        } else if path.ends_with(suffix(REFRESH_PATH)) {
            Some(Self::Refresh)
        } else if path.ends_with(suffix(LOGOUT_PATH)) {
            Some(Self::Logout)
        } else {
            None
        }
    }

    /// Whether requests to this endpoint carry the stored credential.
    /// Logout does, so the backend can close the server-side session.
    pub fn carries_credential(self) -> bool {
        matches!(self, Self::Logout)
    }

    /// Whether a successful response may carry new credential material.
    pub fn issues_credential(self) -> bool {
        matches!(self, Self::Login | Self::Signup)
    }
}

/// `/auth/login` out of `/api/v1/auth/login`.
fn suffix(path: &'static str) -> &'static str {
    path.find("/auth/").map_or(path, |idx| &path[idx..])
}
