//! Service Worker Module
//!
//! Offline caching for the ProWeb site: precaching on install, purging old
//! caches on activation, per-route caching strategies for fetches, periodic
//! cache trimming, page messages, background sync and push notifications.

mod cache;
mod config;
mod events;
mod fetch;
mod janitor;
mod lifecycle;
mod network;
mod registration;
mod router;
mod strategy;
mod sync;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::*;
pub use config::*;
pub use events::*;
pub use fetch::*;
pub use janitor::*;
pub use lifecycle::*;
pub use network::*;
pub use registration::*;
pub use router::*;
pub use strategy::*;
pub use sync::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use url::Url;

/// Service Worker global ID counter
static NEXT_SW_ID: AtomicU64 = AtomicU64::new(1);

/// Service Worker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceWorkerState {
    /// Initial state, being parsed
    #[default]
    Parsed,
    /// Installing (install event fired)
    Installing,
    /// Installed, waiting to activate
    Installed,
    /// Activating (activate event fired)
    Activating,
    /// Active and controlling pages
    Activated,
    /// Marked for removal
    Redundant,
}

/// Service Worker error types
#[derive(Debug, thiserror::Error)]
pub enum ServiceWorkerError {
    /// Registration failed
    #[error("registration failed: {0}")]
    RegistrationFailed(String),
    /// A different script already owns the scope
    #[error("scope {0} is already registered")]
    AlreadyRegistered(String),
    /// Not found
    #[error("no registration for scope {0}")]
    NotFound(String),
    /// Security error
    #[error("security error: {0}")]
    SecurityError(String),
    /// State transition invalid
    #[error("invalid state transition {from:?} -> {to:?}")]
    InvalidStateTransition {
        from: ServiceWorkerState,
        to: ServiceWorkerState,
    },
    /// A precache item could not be fetched
    #[error("install failed: precaching {url}: {reason}")]
    InstallFailed { url: String, reason: String },
    /// Operation needs an activating or active worker
    #[error("worker is not active")]
    NotActive,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Service Worker ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    /// Create a new unique ID
    pub fn new() -> Self {
        Self(NEXT_SW_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get raw value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ServiceWorkerId {
    fn default() -> Self {
        Self::new()
    }
}

/// What activation did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Caches deleted because they were not in the allow-list
    pub deleted: Vec<String>,
    /// Clients that switched to this worker
    pub claimed: usize,
}

/// A Service Worker instance
///
/// Owns the cache storage handle, the route table and the host-facing state
/// (clients, notifications, sync registrations). The host drives it:
/// `install`, then `activate`, then `handle_fetch` for every request.
///
/// Background revalidation and [`TokioScheduler`] run on the Tokio runtime
/// the worker is driven from. Driven from any other executor the worker
/// still answers every event, but skips background refreshes and cannot
/// start a Tokio-backed janitor.
pub struct ServiceWorker {
    id: ServiceWorkerId,
    config: WorkerConfig,
    state: ServiceWorkerState,
    skip_waiting: bool,
    lifecycle: LifecycleManager,
    router: RouteTable,
    ctx: StrategyContext,
    precache: Vec<Url>,
    sync_endpoint: Url,
    janitor: CacheJanitor,
    scheduler: Arc<dyn Scheduler>,
    janitor_handle: Option<ScheduleHandle>,
    clients: Clients,
    notifications: NotificationCenter,
    sync: SyncManager,
    outbox: ContactOutbox,
}

impl ServiceWorker {
    /// Create a worker with fresh cache storage
    pub fn new(
        config: WorkerConfig,
        network: Arc<dyn Network>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, ServiceWorkerError> {
        Self::with_storage(config, network, scheduler, CacheStorage::new())
    }

    /// Create a worker over existing cache storage, as a newer version
    /// finds the caches its predecessor left behind.
    pub fn with_storage(
        config: WorkerConfig,
        network: Arc<dyn Network>,
        scheduler: Arc<dyn Scheduler>,
        storage: CacheStorage,
    ) -> Result<Self, ServiceWorkerError> {
        config.validate()?;
        let names = config.cache_names();
        let precache = config
            .precache
            .iter()
            .map(|path| config.resolve(path))
            .collect::<Result<Vec<_>, _>>()?;
        let offline_page = config.resolve(&config.offline_page)?;
        let sync_endpoint = config.resolve(&config.sync.endpoint)?;
        let janitor = CacheJanitor::new(storage.clone(), &config.janitor);

        Ok(Self {
            id: ServiceWorkerId::new(),
            router: RouteTable::standard(config.routes.clone()),
            ctx: StrategyContext {
                network,
                storage,
                names,
                offline_page,
                background: BackgroundTasks::new(),
            },
            config,
            state: ServiceWorkerState::Parsed,
            skip_waiting: false,
            lifecycle: LifecycleManager::new(),
            precache,
            sync_endpoint,
            janitor,
            scheduler,
            janitor_handle: None,
            clients: Clients::new(),
            notifications: NotificationCenter::new(),
            sync: SyncManager::new(),
            outbox: ContactOutbox::new(),
        })
    }

    /// Get the worker ID
    pub fn id(&self) -> ServiceWorkerId {
        self.id
    }

    /// Get current state
    pub fn state(&self) -> ServiceWorkerState {
        self.state
    }

    /// Check if the worker is active
    pub fn is_active(&self) -> bool {
        self.state == ServiceWorkerState::Activated
    }

    /// Check if the worker is waiting
    pub fn is_waiting(&self) -> bool {
        self.state == ServiceWorkerState::Installed
    }

    /// Whether activation may follow install without waiting for old clients
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn cache_names(&self) -> &CacheNames {
        &self.ctx.names
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.ctx.storage
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut LifecycleManager {
        &mut self.lifecycle
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    pub fn clients_mut(&mut self) -> &mut Clients {
        &mut self.clients
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn sync_manager(&self) -> &SyncManager {
        &self.sync
    }

    /// Queue of contact-form submissions awaiting delivery
    pub fn outbox(&self) -> &ContactOutbox {
        &self.outbox
    }

    fn transition(&mut self, to: ServiceWorkerState) -> Result<(), ServiceWorkerError> {
        self.lifecycle.transition(self.id, &mut self.state, to)
    }

    /// Precache the install manifest into the static cache.
    ///
    /// Any failed item leaves the worker `Redundant` with nothing written.
    pub async fn install(&mut self) -> Result<usize, ServiceWorkerError> {
        self.transition(ServiceWorkerState::Installing)?;
        log::info!("[SW] Installing {}", self.ctx.names.base);

        let result = precache(
            self.ctx.network.as_ref(),
            &self.ctx.storage,
            &self.ctx.names.static_cache,
            &self.precache,
        )
        .await;

        match result {
            Ok(count) => {
                log::info!("[SW] Precached {} static assets", count);
                self.transition(ServiceWorkerState::Installed)?;
                self.skip_waiting = true;
                Ok(count)
            }
            Err(err) => {
                log::error!("[SW] Install failed: {}", err);
                self.transition(ServiceWorkerState::Redundant)?;
                Err(err)
            }
        }
    }

    /// Delete caches outside the allow-list, claim clients and start the
    /// janitor.
    pub fn activate(&mut self) -> Result<ActivationReport, ServiceWorkerError> {
        self.transition(ServiceWorkerState::Activating)?;
        log::info!("[SW] Activating {}", self.ctx.names.base);

        let deleted = purge_stale_caches(&self.ctx.storage, &self.ctx.names);
        self.lifecycle.claim(self.id, self.state)?;
        let claimed = self.clients.claim();
        self.transition(ServiceWorkerState::Activated)?;
        self.start_janitor();

        Ok(ActivationReport { deleted, claimed })
    }

    fn start_janitor(&mut self) {
        if let Some(previous) = self.janitor_handle.take() {
            previous.cancel();
        }
        let period = self.config.janitor.interval();
        match self.janitor.start(self.scheduler.as_ref(), period) {
            Ok(handle) => {
                self.janitor_handle = Some(handle);
                log::debug!("[SW] Cache janitor every {:?}", period);
            }
            Err(err) => log::warn!("[SW] Cache janitor not started: {}", err),
        }
    }

    /// Route a fetch. Never fails: strategy errors become the offline page
    /// (navigations) or a synthesized 503.
    pub async fn handle_fetch(&self, request: &Request) -> FetchOutcome {
        if !self.is_active() || !self.router.intercepts(&self.config.origin, request) {
            return FetchOutcome::Passthrough;
        }

        let (route, strategy) = self.router.classify(request);
        log::debug!(
            "[SW] {} {} -> {:?} ({})",
            request.method,
            request.url,
            route,
            strategy.name()
        );

        match execute(&self.ctx, strategy, request).await {
            Ok(response) => FetchOutcome::Responded(response),
            Err(err) => {
                log::warn!("[SW] {} failed for {}: {}", strategy.name(), request.url, err);
                FetchOutcome::Responded(self.fallback(request))
            }
        }
    }

    fn fallback(&self, request: &Request) -> Response {
        if request.is_navigation() {
            if let Some(page) = self.ctx.offline_page() {
                return page;
            }
        }
        Response::offline()
    }

    /// Handle a JSON message posted by a page
    pub fn handle_message(&mut self, data: &str) -> Result<MessageOutcome, MessageError> {
        match WorkerMessage::parse(data)? {
            WorkerMessage::SkipWaiting => {
                self.skip_waiting = true;
                if self.state == ServiceWorkerState::Installed {
                    Ok(MessageOutcome::Activated(self.activate()?))
                } else {
                    Ok(MessageOutcome::Ignored)
                }
            }
            WorkerMessage::PerformanceMark { name, value } => {
                match value {
                    Some(value) => log::info!("[SW] Performance mark {}: {}", name, value),
                    None => log::info!("[SW] Performance mark {}", name),
                }
                Ok(MessageOutcome::Logged)
            }
        }
    }

    /// Register a background sync for `tag`
    pub fn register_sync(&mut self, tag: &str) -> bool {
        self.sync.register(tag)
    }

    /// Queue a contact-form submission and register the sync that delivers it
    pub fn queue_submission(&mut self, body: impl Into<Vec<u8>>, content_type: &str) -> u64 {
        let id = self.outbox.enqueue(body, content_type);
        let tag = self.config.sync.tag.clone();
        self.sync.register(tag);
        id
    }

    /// Handle a sync event fired by the host
    pub async fn handle_sync(&mut self, tag: &str) -> Result<SyncReport, SyncError> {
        if tag != self.config.sync.tag {
            return Err(SyncError::UnknownTag(tag.to_string()));
        }
        self.sync.register(tag);
        let last_chance = self.sync.fire(tag).is_some_and(|event| event.last_chance);

        let report = drain_outbox(self.ctx.network.as_ref(), &self.outbox, &self.sync_endpoint).await;
        log::info!(
            "[SW] Sync {}: {} delivered, {} remaining",
            tag,
            report.delivered,
            report.remaining
        );
        if last_chance && !report.is_complete() {
            log::warn!(
                "[SW] Sync {} gave up; {} submissions stay queued until the next registration",
                tag,
                report.remaining
            );
        }
        self.sync.complete(tag, report.is_complete());
        Ok(report)
    }

    /// Show a notification for a push message
    pub fn handle_push(&mut self, event: &PushEvent) -> Notification {
        let payload = event.payload();
        let presentation = &self.config.notifications;
        let notification = Notification {
            id: 0,
            title: payload.title.unwrap_or_else(|| presentation.title.clone()),
            body: payload.body.unwrap_or_default(),
            icon: presentation.icon.clone(),
            badge: presentation.badge.clone(),
            actions: vec![
                NotificationAction {
                    action: "open".into(),
                    title: "Openen".into(),
                },
                NotificationAction {
                    action: "close".into(),
                    title: "Sluiten".into(),
                },
            ],
            url: payload.url.unwrap_or_else(|| "/".into()),
        };
        self.notifications.show(notification)
    }

    /// Close the clicked notification and open its URL unless the click was
    /// on the `close` action.
    pub fn handle_notification_click(&mut self, event: &NotificationClickEvent) -> ClickOutcome {
        let Some(notification) = self.notifications.close(event.notification_id()) else {
            return ClickOutcome::Unknown;
        };
        match event.action() {
            None | Some("open") => {
                let client = self.clients.open_window(&notification.url);
                ClickOutcome::Opened(client.url)
            }
            Some(_) => ClickOutcome::Closed,
        }
    }

    /// Run one janitor sweep now
    pub fn sweep_caches(&self) -> SweepReport {
        self.janitor.sweep()
    }

    /// Wait for detached revalidation tasks to finish
    pub async fn settle(&self) {
        self.ctx.background.settle().await;
    }

    /// Background tasks still running
    pub fn pending_background_tasks(&self) -> usize {
        self.ctx.background.pending()
    }

    /// Whether the periodic cache janitor is scheduled
    pub fn janitor_running(&self) -> bool {
        self.janitor_handle.as_ref().is_some_and(|h| !h.is_cancelled())
    }

    /// Stop the worker instance. The janitor stops with it; caches persist.
    pub fn terminate(&mut self) {
        if let Some(handle) = self.janitor_handle.take() {
            handle.cancel();
        }
        log::info!("[SW] Worker {} terminated", self.id.raw());
    }
}

impl Drop for ServiceWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.janitor_handle.take() {
            handle.cancel();
        }
    }
}
