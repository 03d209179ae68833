//! # pingworld-client
//!
//! Rust client for the Ping World social ping API.
//!
//! The core is [`SessionManager`]: it attaches the stored bearer token to
//! outgoing requests, persists the credential issued by login and signup,
//! and recovers from an expired token with a single shared refresh. Typed
//! endpoint wrappers sit on top of it behind [`PingClient`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pingworld_client::{Config, PingClient};
//!
//! # async fn example() -> pingworld_client::Result<()> {
//! let config = Config::load(std::path::Path::new("pingworld.toml"))?;
//! let client = PingClient::builder().config(config).build().await?;
//!
//! let session = client.auth().login("neo", "hunter2").await?;
//! println!("signed in as {}", session.user.nickname);
//!
//! for entry in client.leaderboard().top(None).await? {
//!     println!("{:>3} {}", entry.score, entry.nickname);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! - [`FileStore`](storage::FileStore) - JSON file with 0600 permissions (default)
//! - [`MemoryStore`](storage::MemoryStore) - process lifetime only
//! - `KeyringStore` - system keyring (requires the `keyring` feature)

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod storage;
pub mod transport;

pub use client::{PingClient, PingClientBuilder};
pub use config::Config;
pub use error::{Error, Result};
pub use models::{AuthSession, LeaderboardEntry, Ping, ProfileUpdate, Streak, User};
pub use session::{Credential, PendingRequest, SessionManager};
pub use storage::KeyValueStore;
pub use transport::{ApiRequest, ApiResponse, HttpTransport};
