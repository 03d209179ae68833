use crate::transport::ApiRequest;

/// A request in flight through the session manager.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub request: ApiRequest,
    /// Set once the request has been resubmitted after a 401.
    pub retried: bool,
    /// Token attached when the request was last sent.
    pub(crate) sent_with: Option<String>,
}

impl PendingRequest {
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            retried: false,
            sent_with: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.request.path
    }
}

impl From<ApiRequest> for PendingRequest {
    fn from(request: ApiRequest) -> Self {
        Self::new(request)
    }
}
