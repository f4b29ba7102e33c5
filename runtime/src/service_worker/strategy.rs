//! Strategy Executors
//!
//! One async function per caching strategy. Each is a short sequence of
//! awaited network/cache steps with no retries: a rejected fetch falls
//! straight through to the documented fallback or is returned as an error.

use std::sync::Arc;

use spin::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use url::Url;

use super::cache::{CacheMatchOptions, CacheStorage};
use super::config::{CacheNames, CacheSlot};
use super::fetch::{Request, RequestMethod, Response};
use super::network::{Network, NetworkError};
use super::router::Strategy;

/// Strategy failure with no fallback left
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Detached work started by strategies (background revalidation).
///
/// Tasks log their own failures. [`BackgroundTasks::settle`] awaits every
/// task started so far.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a detached task on the current Tokio runtime and keep its
    /// handle. Returns false, dropping the task, when no runtime is entered.
    pub fn spawn<F>(&self, task: F) -> bool
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                log::warn!("[SW] Background task skipped: {}", err);
                return false;
            }
        };
        let handle = runtime.spawn(task);
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        true
    }

    /// Number of tasks that have not finished yet
    pub fn pending(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for all tracked tasks, including ones spawned while waiting.
    pub async fn settle(&self) {
        loop {
            let batch = std::mem::take(&mut *self.handles.lock());
            if batch.is_empty() {
                return;
            }
            for handle in batch {
                if let Err(err) = handle.await {
                    log::warn!("[SW] Background task ended abnormally: {}", err);
                }
            }
        }
    }
}

/// Everything a strategy needs
#[derive(Clone)]
pub struct StrategyContext {
    pub network: Arc<dyn Network>,
    pub storage: CacheStorage,
    pub names: CacheNames,
    /// Absolute URL of the offline fallback page
    pub offline_page: Url,
    pub background: BackgroundTasks,
}

impl StrategyContext {
    fn cache_name(&self, slot: CacheSlot) -> &str {
        self.names.name(slot)
    }

    /// The cached offline page, if precaching stored it
    pub fn offline_page(&self) -> Option<Response> {
        let request = Request::new(RequestMethod::Get, self.offline_page.clone());
        self.storage.match_any(&request, &CacheMatchOptions::default())
    }
}

/// Run `strategy` for `request`
pub async fn execute(
    ctx: &StrategyContext,
    strategy: Strategy,
    request: &Request,
) -> Result<Response, StrategyError> {
    match strategy {
        Strategy::NetworkFirstNoCache => network_first_no_cache(ctx, request).await,
        Strategy::CacheFirst(slot) => cache_first(ctx, slot, request).await,
        Strategy::StaleWhileRevalidate(slot) => stale_while_revalidate(ctx, slot, request).await,
        Strategy::NetworkFirst(slot) => network_first(ctx, slot, request).await,
        Strategy::NetworkOnly => network_only(ctx, request).await,
    }
}

/// HTML: always from the network and never stored. Stale documents would
/// carry outdated meta content.
pub async fn network_first_no_cache(
    ctx: &StrategyContext,
    request: &Request,
) -> Result<Response, StrategyError> {
    match ctx.network.fetch(request).await {
        Ok(response) => Ok(response),
        Err(err) if request.is_navigation() => match ctx.offline_page() {
            Some(page) => {
                log::warn!("[SW] Navigation to {} failed ({}), serving offline page", request.url, err);
                Ok(page)
            }
            None => Err(err.into()),
        },
        Err(err) => Err(err.into()),
    }
}

pub async fn cache_first(
    ctx: &StrategyContext,
    slot: CacheSlot,
    request: &Request,
) -> Result<Response, StrategyError> {
    let name = ctx.cache_name(slot);
    if let Some(cached) = ctx.storage.match_in(name, request) {
        log::trace!("[SW] Cache hit {} in {}", request.url, name);
        return Ok(cached);
    }

    let response = ctx.network.fetch(request).await?;
    if response.ok() {
        ctx.storage.put(name, request.clone(), response.clone());
    }
    Ok(response)
}

pub async fn stale_while_revalidate(
    ctx: &StrategyContext,
    slot: CacheSlot,
    request: &Request,
) -> Result<Response, StrategyError> {
    let name = ctx.cache_name(slot).to_string();
    let cached = ctx.storage.match_in(&name, request);
    let refresh = revalidate(
        Arc::clone(&ctx.network),
        ctx.storage.clone(),
        name,
        request.clone(),
    );

    match cached {
        Some(cached) => {
            let url = request.url.to_string();
            // Without a runtime the cached copy is served and stays as is.
            ctx.background.spawn(async move {
                if let Err(err) = refresh.await {
                    log::warn!("[SW] Background refresh of {} failed: {}", url, err);
                }
            });
            Ok(cached)
        }
        None => Ok(refresh.await?),
    }
}

/// Fetch and store a clone when the response is OK
async fn revalidate(
    network: Arc<dyn Network>,
    storage: CacheStorage,
    cache_name: String,
    request: Request,
) -> Result<Response, NetworkError> {
    let response = network.fetch(&request).await?;
    if response.ok() {
        storage.put(&cache_name, request, response.clone());
    }
    Ok(response)
}

pub async fn network_first(
    ctx: &StrategyContext,
    slot: CacheSlot,
    request: &Request,
) -> Result<Response, StrategyError> {
    match ctx.network.fetch(request).await {
        Ok(response) => {
            if response.ok() {
                ctx.storage
                    .put(ctx.cache_name(slot), request.clone(), response.clone());
            }
            Ok(response)
        }
        Err(err) => match ctx.storage.match_any(request, &CacheMatchOptions::default()) {
            Some(cached) => {
                log::warn!("[SW] Network failed for {} ({}), serving cached copy", request.url, err);
                Ok(cached)
            }
            None => Err(err.into()),
        },
    }
}

pub async fn network_only(ctx: &StrategyContext, request: &Request) -> Result<Response, StrategyError> {
    Ok(ctx.network.fetch(request).await?)
}
