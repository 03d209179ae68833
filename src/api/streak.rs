use super::{fetch, path};
use crate::error::Result;
use crate::models::Streak;
use crate::session::SessionManager;
use crate::transport::ApiRequest;

pub struct StreakApi<'a> {
    session: &'a SessionManager,
}

impl<'a> StreakApi<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    pub async fn me(&self) -> Result<Streak> {
        fetch(self.session, ApiRequest::get(path("/streak/me"))).await
    }
}
