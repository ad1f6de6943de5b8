use std::fmt;
use tracing::Span;
use uuid::Uuid;

/// Per-request state threaded through every upstream call.
///
/// Carries the correlation id that tags log lines and is echoed back to the
/// caller in the `x-request-id` header.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Span covering all work done on behalf of this request.
    pub fn span(&self) -> Span {
        tracing::info_span!("release_notes", request_id = %self.request_id)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.request_id, f)
    }
}
