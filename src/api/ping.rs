use super::{list, path};
use crate::config::DEFAULT_PINGS_PAGE_SIZE;
use crate::error::{Error, Result};
use crate::models::Ping;
use crate::session::SessionManager;
use crate::transport::ApiRequest;

pub struct PingApi<'a> {
    session: &'a SessionManager,
}

impl<'a> PingApi<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    /// Broadcast a ping.
    pub async fn send(&self) -> Result<()> {
        self.session.execute(ApiRequest::post(path("/ping"))).await?;
        Ok(())
    }

    /// Pings received by the signed-in user. Pages start at 1.
    pub async fn received(&self, page: Option<u32>, limit: Option<u32>) -> Result<Vec<Ping>> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_PINGS_PAGE_SIZE);
        if page == 0 || limit == 0 {
            return Err(Error::InvalidRequest("page and limit start at 1".into()));
        }

        let request = ApiRequest::get(path("/ping/received"))
            .query("page", page)
            .query("limit", limit);
        let response = self.session.execute(request).await?;
        list(&response)
    }
}
