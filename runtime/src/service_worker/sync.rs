//! Background Sync
//!
//! Sync registrations fired by the host, and the contact-form outbox that
//! the `contact-form` sync drains.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use spin::Mutex;
use url::Url;

use super::fetch::{Request, RequestMethod};
use super::network::Network;

/// Failed attempts before a tag is fired one final time
pub const MAX_SYNC_RETRIES: u32 = 3;

/// Background sync errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The worker has no handler for this tag
    #[error("no sync handler for tag '{0}'")]
    UnknownTag(String),
}

/// Where a sync tag stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Registered, waiting for the host to fire it
    #[default]
    Pending,
    /// Handed to the worker, outcome not reported yet
    Firing,
    /// Last attempt failed; fires again on the next opportunity
    Reregistering,
    /// Delivered; the tag is gone
    Success,
    /// Gave up; the tag is gone
    Failed,
}

/// One registered tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRegistration {
    tag: String,
    state: SyncState,
    failures: u32,
}

impl SyncRegistration {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// The next firing is the final one
    pub fn last_chance(&self) -> bool {
        self.failures >= MAX_SYNC_RETRIES
    }

    fn is_due(&self) -> bool {
        matches!(self.state, SyncState::Pending | SyncState::Reregistering)
    }

    fn start_firing(&mut self) -> SyncEvent {
        self.state = SyncState::Firing;
        SyncEvent {
            tag: self.tag.clone(),
            last_chance: self.last_chance(),
        }
    }
}

/// What the host hands the worker when a tag fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub tag: String,
    pub last_chance: bool,
}

/// Registered sync tags, in tag order
#[derive(Debug, Default)]
pub struct SyncManager {
    tags: BTreeMap<String, SyncRegistration>,
}

impl SyncManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tag`. Returns false when it was already registered.
    pub fn register(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.tags.contains_key(&tag) {
            return false;
        }
        log::debug!("[SW] Sync '{}' registered", tag);
        self.tags.insert(
            tag.clone(),
            SyncRegistration {
                tag,
                state: SyncState::Pending,
                failures: 0,
            },
        );
        true
    }

    pub fn get(&self, tag: &str) -> Option<&SyncRegistration> {
        self.tags.get(tag)
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags.keys().cloned().collect()
    }

    /// Fire `tag` alone. `None` when it is unknown or already firing.
    pub fn fire(&mut self, tag: &str) -> Option<SyncEvent> {
        self.tags
            .get_mut(tag)
            .filter(|r| r.is_due())
            .map(SyncRegistration::start_firing)
    }

    /// Fire every due tag
    pub fn fire_pending(&mut self) -> Vec<SyncEvent> {
        self.tags
            .values_mut()
            .filter(|r| r.is_due())
            .map(SyncRegistration::start_firing)
            .collect()
    }

    /// Report how a fired tag went. Finished tags are removed.
    pub fn complete(&mut self, tag: &str, delivered: bool) -> SyncState {
        let outcome = match self.tags.get_mut(tag) {
            None => return SyncState::Failed,
            Some(_) if delivered => SyncState::Success,
            Some(registration) if registration.last_chance() => {
                log::warn!("[SW] Sync '{}' failed on its last chance, dropping", tag);
                SyncState::Failed
            }
            Some(registration) => {
                registration.failures += 1;
                registration.state = SyncState::Reregistering;
                return SyncState::Reregistering;
            }
        };
        self.tags.remove(tag);
        outcome
    }
}

/// A contact-form submission queued while offline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedSubmission {
    pub id: u64,
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
struct OutboxState {
    items: VecDeque<QueuedSubmission>,
    next_id: u64,
}

/// FIFO queue of offline contact-form submissions. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct ContactOutbox {
    inner: Arc<Mutex<OutboxState>>,
}

impl ContactOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a submission, returning its id
    pub fn enqueue(&self, body: impl Into<Vec<u8>>, content_type: impl Into<String>) -> u64 {
        let mut state = self.inner.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.items.push_back(QueuedSubmission {
            id,
            body: body.into(),
            content_type: content_type.into(),
        });
        id
    }

    /// Snapshot of queued submissions, oldest first
    pub fn pending(&self) -> Vec<QueuedSubmission> {
        self.inner.lock().items.iter().cloned().collect()
    }

    pub fn remove(&self, id: u64) -> bool {
        let mut state = self.inner.lock();
        let before = state.items.len();
        state.items.retain(|s| s.id != id);
        state.items.len() != before
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of draining the outbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub delivered: usize,
    pub remaining: usize,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// POST every queued submission to `endpoint`; delivered ones leave the
/// queue, everything else stays for the next sync.
pub async fn drain_outbox(network: &dyn Network, outbox: &ContactOutbox, endpoint: &Url) -> SyncReport {
    let mut delivered = 0;
    for submission in outbox.pending() {
        let request = Request::new(RequestMethod::Post, endpoint.clone())
            .with_header("Content-Type", submission.content_type.clone())
            .with_body(submission.body.clone());
        match network.fetch(&request).await {
            Ok(response) if response.ok() => {
                outbox.remove(submission.id);
                delivered += 1;
            }
            Ok(response) => log::warn!(
                "[SW] Queued submission {} rejected with status {}",
                submission.id,
                response.status
            ),
            Err(err) => log::warn!("[SW] Queued submission {} not sent: {}", submission.id, err),
        }
    }
    SyncReport {
        delivered,
        remaining: outbox.len(),
    }
}
