//! Typed wrappers over the Ping World REST API.
//!
//! Each group borrows the [`SessionManager`] so every call goes through
//! credential decoration and expiry recovery.
//!
//! ```text
//! /api/v1/auth/signup            POST   (no credential)
//! /api/v1/auth/login             POST   (no credential)
//! /api/v1/auth/logout            POST
//! /api/v1/users/me               GET PUT DELETE
//! /api/v1/users/me/fcm           POST
//! /api/v1/users/{id}             GET
//! /api/v1/users/{id}/report      POST
//! /api/v1/ping                   POST
//! /api/v1/ping/received          GET
//! /api/v1/streak/me              GET
//! /api/v1/leaderboard            GET
//! /health                        GET    (no credential)
//! ```

pub mod auth;
pub mod health;
pub mod leaderboard;
pub mod ping;
pub mod streak;
pub mod users;

pub use auth::AuthApi;
pub use health::{HealthApi, HealthStatus};
pub use leaderboard::LeaderboardApi;
pub use ping::PingApi;
pub use streak::StreakApi;
pub use users::UsersApi;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::API_PREFIX;
use crate::error::Result;
use crate::session::SessionManager;
use crate::transport::{ApiRequest, ApiResponse};

pub(crate) fn path(route: &str) -> String {
    format!("{API_PREFIX}{route}")
}

/// Send and decode the `data` envelope.
pub(crate) async fn fetch<T: DeserializeOwned>(
    session: &SessionManager,
    request: ApiRequest,
) -> Result<T> {
    session.execute(request).await?.data()
}

/// A list, sent either bare or wrapped in an object under a known key.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "pings", alias = "entries", alias = "leaderboard")]
        items: Vec<T>,
    },
}

pub(crate) fn list<T: DeserializeOwned>(response: &ApiResponse) -> Result<Vec<T>> {
    Ok(match response.data::<Listing<T>>()? {
        Listing::Bare(items) | Listing::Wrapped { items } => items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ping;

    #[test]
    fn test_path_prefix() {
        assert_eq!(path("/users/me"), "/api/v1/users/me");
    }

    #[test]
    fn test_list_shapes() {
        let bare = ApiResponse::new(200, r#"{"data":[{"id":1},{"id":2}]}"#);
        assert_eq!(list::<Ping>(&bare).unwrap().len(), 2);

        let wrapped = ApiResponse::new(200, r#"{"data":{"pings":[{"id":"p1"}],"total":1}}"#);
        let pings: Vec<Ping> = list(&wrapped).unwrap();
        assert_eq!(pings[0].id, "p1");

        let bad = ApiResponse::new(200, r#"{"data":{"nothing":true}}"#);
        assert!(list::<Ping>(&bad).is_err());
    }
}
