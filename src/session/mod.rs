//! Session handling: credential storage, request decoration and expiry
//! recovery.

pub mod credentials;
pub mod endpoints;
pub mod manager;
pub mod pending;

pub use credentials::{Credential, CredentialStore};
pub use endpoints::AuthEndpoint;
pub use manager::SessionManager;
pub use pending::PendingRequest;
