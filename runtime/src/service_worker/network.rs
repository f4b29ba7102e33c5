//! Network Access
//!
//! The worker never talks to a socket directly; every fetch goes through a
//! [`Network`] implementation supplied by the host. A rejected fetch is the
//! only failure signal strategies look at. HTTP error statuses are ordinary
//! responses.

use async_trait::async_trait;

use super::fetch::{Request, Response};

/// A rejected fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// No connectivity
    #[error("network unreachable")]
    Offline,
    /// The fetch was attempted and failed
    #[error("fetch {url} failed: {reason}")]
    Failed { url: String, reason: String },
}

impl NetworkError {
    /// Failure for a specific request
    pub fn failed(request: &Request, reason: impl Into<String>) -> Self {
        Self::Failed {
            url: request.url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Host network access
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform a fetch. Resolves with any response the server sent and
    /// rejects only when no response was obtained.
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}
