use super::{list, path};
use crate::config::DEFAULT_LEADERBOARD_LIMIT;
use crate::error::{Error, Result};
use crate::models::LeaderboardEntry;
use crate::session::SessionManager;
use crate::transport::ApiRequest;

pub struct LeaderboardApi<'a> {
    session: &'a SessionManager,
}

impl<'a> LeaderboardApi<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    /// Top entries, best first.
    pub async fn top(&self, limit: Option<u32>) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
        if limit == 0 {
            return Err(Error::InvalidRequest("limit starts at 1".into()));
        }
        let request = ApiRequest::get(path("/leaderboard")).query("limit", limit);
        let response = self.session.execute(request).await?;
        list(&response)
    }
}
