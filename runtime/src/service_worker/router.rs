//! Request Router
//!
//! Classifies an intercepted request into exactly one route. The table is
//! an ordered list of `(predicate, route)` pairs; the first predicate that
//! matches wins, so the precedence is the order of [`RouteTable::standard`].

use super::config::{CacheSlot, RouteConfig};
use super::fetch::{Request, RequestMethod};
use url::Url;

/// Caching strategy chosen for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Network only, never stored; offline page on failure
    NetworkFirstNoCache,
    /// Cache hit wins; miss goes to the network and is stored
    CacheFirst(CacheSlot),
    /// Cached copy now, refreshed in the background
    StaleWhileRevalidate(CacheSlot),
    /// Network wins; cache is the fallback
    NetworkFirst(CacheSlot),
    /// Network only, no cache involvement
    NetworkOnly,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NetworkFirstNoCache => "network-first-no-cache",
            Self::CacheFirst(_) => "cache-first",
            Self::StaleWhileRevalidate(_) => "stale-while-revalidate",
            Self::NetworkFirst(_) => "network-first",
            Self::NetworkOnly => "network-only",
        }
    }

    /// Cache the strategy touches, if any
    pub fn slot(&self) -> Option<CacheSlot> {
        match self {
            Self::CacheFirst(slot) | Self::StaleWhileRevalidate(slot) | Self::NetworkFirst(slot) => {
                Some(*slot)
            }
            Self::NetworkFirstNoCache | Self::NetworkOnly => None,
        }
    }
}

/// Request bucket, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Document,
    StaticAsset,
    ThreeBundle,
    Api,
    FrameworkAsset,
    Fallback,
}

/// A route predicate
pub type RoutePredicate = fn(&RouteConfig, &Request) -> bool;

/// Navigation or document-destination request
pub fn is_document(_: &RouteConfig, request: &Request) -> bool {
    request.is_navigation()
}

/// Image extension or the PWA manifest
pub fn is_static_asset(config: &RouteConfig, request: &Request) -> bool {
    let path = request.path();
    if config.manifest_paths.iter().any(|p| p == path) {
        return true;
    }
    let lower = path.to_ascii_lowercase();
    config
        .static_extensions
        .iter()
        .any(|ext| lower.ends_with(ext.as_str()))
}

/// Build chunk whose file name carries a 3D-library or vendor-chunk marker
pub fn is_three_bundle(config: &RouteConfig, request: &Request) -> bool {
    let Some(rest) = request.path().strip_prefix(config.framework_prefix.as_str()) else {
        return false;
    };
    let file = rest.rsplit('/').next().unwrap_or(rest);
    config.three_markers.iter().any(|m| file.contains(m.as_str()))
}

pub fn is_api(config: &RouteConfig, request: &Request) -> bool {
    request.path().starts_with(config.api_prefix.as_str())
}

/// Framework-internal build asset
pub fn is_framework_asset(config: &RouteConfig, request: &Request) -> bool {
    request.path().starts_with(config.framework_prefix.as_str())
}

fn always(_: &RouteConfig, _: &Request) -> bool {
    true
}

/// Ordered routing table
pub struct RouteTable {
    config: RouteConfig,
    routes: Vec<(RoutePredicate, Route, Strategy)>,
}

impl RouteTable {
    /// The worker's routing table
    pub fn standard(config: RouteConfig) -> Self {
        Self {
            config,
            routes: vec![
                (is_document as RoutePredicate, Route::Document, Strategy::NetworkFirstNoCache),
                (is_static_asset as RoutePredicate, Route::StaticAsset, Strategy::CacheFirst(CacheSlot::Static)),
                (
                    is_three_bundle as RoutePredicate,
                    Route::ThreeBundle,
                    Strategy::StaleWhileRevalidate(CacheSlot::Three),
                ),
                (is_api as RoutePredicate, Route::Api, Strategy::NetworkFirst(CacheSlot::Dynamic)),
                (
                    is_framework_asset as RoutePredicate,
                    Route::FrameworkAsset,
                    Strategy::StaleWhileRevalidate(CacheSlot::Dynamic),
                ),
                (always as RoutePredicate, Route::Fallback, Strategy::NetworkOnly),
            ],
        }
    }

    /// Whether the worker intercepts this request at all: same-origin GETs only.
    pub fn intercepts(&self, origin: &Url, request: &Request) -> bool {
        request.method == RequestMethod::Get && request.is_same_origin(origin)
    }

    /// First matching route and its strategy
    pub fn classify(&self, request: &Request) -> (Route, Strategy) {
        self.routes
            .iter()
            .find(|(predicate, _, _)| predicate(&self.config, request))
            .map(|(_, route, strategy)| (*route, *strategy))
            .unwrap_or((Route::Fallback, Strategy::NetworkOnly))
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }
}
