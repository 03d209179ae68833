use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::session::SessionManager;
use crate::transport::ApiRequest;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

pub struct HealthApi<'a> {
    session: &'a SessionManager,
}

impl<'a> HealthApi<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    /// GET /health
    ///
    /// Liveness check. Sent without credentials and without session
    /// recovery. The body may be bare or inside the `data` envelope.
    pub async fn check(&self) -> Result<HealthStatus> {
        let response = self
            .session
            .transport()
            .send(&ApiRequest::get("/health"))
            .await?
            .error_for_status()?;
        let status = response
            .data::<HealthStatus>()
            .or_else(|_| response.json::<HealthStatus>())?;
        debug!(status = status.status.as_str(), "Health check");
        Ok(status)
    }
}
