//! HTTP transport layer.
//!
//! [`HttpTransport`] sends one [`ApiRequest`] and returns the
//! [`ApiResponse`], whatever its status. It only fails when no response
//! was received, so status handling stays in the session layer.

pub mod http;
pub mod request;

pub use http::ReqwestTransport;
pub use request::{ApiRequest, ApiResponse};

use async_trait::async_trait;

use crate::error::Result;

/// Sends requests to the Ping World API.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request and return the response for any HTTP status.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;

    /// Name of this transport, for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Blanket impl for `Arc<T>`.
#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for std::sync::Arc<T> {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        (**self).send(request).await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}
