//! Test Doubles
//!
//! A scripted [`Network`] for driving the worker without sockets. Responses
//! are keyed by URL path.

use hashbrown::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use spin::Mutex;

use super::fetch::{Request, Response};
use super::network::{Network, NetworkError};

/// Network whose responses are set up by the test
#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Response>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<Request>>,
    offline: AtomicBool,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for `path`. Unknown paths answer 404.
    pub fn respond(&self, path: &str, response: Response) {
        self.failing.lock().remove(path);
        self.routes.lock().insert(path.to_string(), response);
    }

    /// Reject fetches of `path`
    pub fn fail(&self, path: &str) {
        self.failing.lock().insert(path.to_string());
    }

    /// Reject every fetch
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn go_online(&self) {
        self.offline.store(false, Ordering::SeqCst);
    }

    /// Fetch attempts for `path`, including rejected ones
    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().get(path).copied().unwrap_or(0)
    }

    /// Total fetch attempts
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Every request seen, in order
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let path = request.path().to_string();
        *self.calls.lock().entry(path.clone()).or_insert(0) += 1;
        self.requests.lock().push(request.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Offline);
        }
        if self.failing.lock().contains(&path) {
            return Err(NetworkError::failed(request, "scripted failure"));
        }
        let response = self
            .routes
            .lock()
            .get(&path)
            .cloned()
            .unwrap_or_else(|| Response::new(404));
        Ok(response.with_url(request.url.as_str()))
    }
}
