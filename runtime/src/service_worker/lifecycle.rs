//! Service Worker Lifecycle Management
//!
//! State transitions plus the two one-shot lifecycle steps: precaching the
//! install manifest and purging caches from older versions on activation.

use url::Url;

use super::cache::CacheStorage;
use super::config::CacheNames;
use super::fetch::{Request, RequestMethod, Response};
use super::network::Network;
use super::{ServiceWorkerError, ServiceWorkerId, ServiceWorkerState};

/// Lifecycle event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Install event
    Install(ServiceWorkerId),
    /// Activate event
    Activate(ServiceWorkerId),
    /// State change
    StateChange(StateChangeEvent),
    /// Controller change
    ControllerChange(ServiceWorkerId),
}

/// State change event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChangeEvent {
    /// Worker ID
    pub worker_id: ServiceWorkerId,
    /// Old state
    pub old_state: ServiceWorkerState,
    /// New state
    pub new_state: ServiceWorkerState,
}

type Listener = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Lifecycle manager
#[derive(Default)]
pub struct LifecycleManager {
    /// Dispatched events, oldest first
    history: Vec<LifecycleEvent>,
    /// Event listeners
    listeners: Vec<Listener>,
}

impl LifecycleManager {
    /// Create new lifecycle manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Add event listener
    pub fn add_listener(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    /// Dispatch an event
    pub fn dispatch(&mut self, event: LifecycleEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
        self.history.push(event);
    }

    /// Events dispatched so far
    pub fn history(&self) -> &[LifecycleEvent] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Transition worker state
    pub fn transition(
        &mut self,
        worker_id: ServiceWorkerId,
        state: &mut ServiceWorkerState,
        new_state: ServiceWorkerState,
    ) -> Result<(), ServiceWorkerError> {
        let old_state = *state;
        if !is_valid_transition(old_state, new_state) {
            return Err(ServiceWorkerError::InvalidStateTransition {
                from: old_state,
                to: new_state,
            });
        }

        *state = new_state;
        log::debug!("[SW] Worker {} {:?} -> {:?}", worker_id.raw(), old_state, new_state);

        self.dispatch(LifecycleEvent::StateChange(StateChangeEvent {
            worker_id,
            old_state,
            new_state,
        }));

        match new_state {
            ServiceWorkerState::Installing => self.dispatch(LifecycleEvent::Install(worker_id)),
            ServiceWorkerState::Activating => self.dispatch(LifecycleEvent::Activate(worker_id)),
            _ => {}
        }

        Ok(())
    }

    /// Claim clients (take control of all pages in scope)
    pub fn claim(
        &mut self,
        worker_id: ServiceWorkerId,
        state: ServiceWorkerState,
    ) -> Result<(), ServiceWorkerError> {
        if !matches!(state, ServiceWorkerState::Activating | ServiceWorkerState::Activated) {
            return Err(ServiceWorkerError::NotActive);
        }
        self.dispatch(LifecycleEvent::ControllerChange(worker_id));
        Ok(())
    }
}

/// Check if a state transition is valid
fn is_valid_transition(from: ServiceWorkerState, to: ServiceWorkerState) -> bool {
    use ServiceWorkerState::*;

    matches!(
        (from, to),
        (Parsed, Installing)
            | (Installing, Installed)
            | (Installing, Redundant) // Install failed
            | (Installed, Activating)
            | (Activating, Activated)
            | (Activating, Redundant)
            | (Activated, Redundant) // Replaced by new worker
    )
}

/// Fetch every manifest URL, then store all of them in `cache_name`.
///
/// All-or-nothing: one rejected fetch or non-OK response fails the step and
/// nothing is written.
pub async fn precache(
    network: &dyn Network,
    storage: &CacheStorage,
    cache_name: &str,
    manifest: &[Url],
) -> Result<usize, ServiceWorkerError> {
    let mut fetched: Vec<(Request, Response)> = Vec::with_capacity(manifest.len());
    for url in manifest {
        let request = Request::new(RequestMethod::Get, url.clone());
        let response = network
            .fetch(&request)
            .await
            .map_err(|err| ServiceWorkerError::InstallFailed {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        if !response.ok() {
            return Err(ServiceWorkerError::InstallFailed {
                url: url.to_string(),
                reason: format!("status {}", response.status),
            });
        }
        fetched.push((request, response));
    }

    let count = fetched.len();
    storage.put_all(cache_name, fetched);
    Ok(count)
}

/// Delete every cache whose name is not in the current allow-list.
/// Deletions are independent; a failure is logged and the rest continue.
pub fn purge_stale_caches(storage: &CacheStorage, names: &CacheNames) -> Vec<String> {
    let mut deleted = Vec::new();
    for name in storage.keys() {
        if names.is_current(&name) {
            continue;
        }
        match storage.delete(&name) {
            Ok(true) => {
                log::info!("[SW] Deleting old cache: {}", name);
                deleted.push(name);
            }
            Ok(false) => {}
            Err(err) => log::warn!("[SW] Could not delete cache {}: {}", name, err),
        }
    }
    deleted
}
