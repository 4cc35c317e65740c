//! Caller context
//!
//! Requests arrive already authenticated. The only capability the engine
//! checks is whether the caller may write.

use uuid::Uuid;

/// Per-request caller context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerContext {
    /// Correlates log lines of one request
    pub request_id: Uuid,
    pub can_write: bool,
}

impl CallerContext {
    pub fn new(can_write: bool) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            can_write,
        }
    }

    pub fn read_only() -> Self {
        Self::new(false)
    }

    pub fn writer() -> Self {
        Self::new(true)
    }

    /// Keep the request id assigned by the transport
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }
}
