pub mod auth;
pub mod social;

pub use auth::{AuthPayload, AuthSession, LoginRequest, RefreshRequest, SignupRequest};
pub use social::{LeaderboardEntry, Ping, ProfileUpdate, Streak, User};
