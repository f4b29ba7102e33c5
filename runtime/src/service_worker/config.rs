//! Worker Configuration
//!
//! Everything that used to be a module-level constant of the worker script:
//! versioned cache names, the precache manifest, routing patterns, janitor
//! limits and the background-sync endpoint. Loaded from JSON; every field
//! has a default so partial documents are accepted.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON could not be parsed
    #[error("invalid worker config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A field holds an unusable value
    #[error("invalid worker config: {0}")]
    Invalid(String),
    /// A path could not be resolved against the origin
    #[error("cannot resolve '{path}' against origin: {source}")]
    Resolve {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

/// Logical cache a strategy reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSlot {
    /// Precached shell and static assets
    Static,
    /// API responses and framework chunks
    Dynamic,
    /// 3D library / vendor bundles
    Three,
}

/// Versioned cache names derived from product and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    /// `{product}-{version}`, the worker's version tag
    pub base: String,
    pub static_cache: String,
    pub dynamic: String,
    pub three: String,
}

impl CacheNames {
    pub fn new(product: &str, version: &str) -> Self {
        Self {
            base: format!("{}-{}", product, version),
            static_cache: format!("{}-static-{}", product, version),
            dynamic: format!("{}-dynamic-{}", product, version),
            three: format!("{}-three-{}", product, version),
        }
    }

    /// Cache name for a slot
    pub fn name(&self, slot: CacheSlot) -> &str {
        match slot {
            CacheSlot::Static => &self.static_cache,
            CacheSlot::Dynamic => &self.dynamic,
            CacheSlot::Three => &self.three,
        }
    }

    /// Names that survive activation.
    pub fn allow_list(&self) -> [&str; 3] {
        [&self.static_cache, &self.dynamic, &self.three]
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.allow_list().contains(&name)
    }
}

/// URL patterns used by the router
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Path extensions served cache-first (lowercase, with dot)
    pub static_extensions: Vec<String>,
    /// Exact paths served cache-first (the PWA manifest)
    pub manifest_paths: Vec<String>,
    /// Path substrings marking 3D-library / vendor chunks
    pub three_markers: Vec<String>,
    pub api_prefix: String,
    /// Framework build output prefix
    pub framework_prefix: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            static_extensions: [
                ".png", ".jpg", ".jpeg", ".gif", ".webp", ".avif", ".svg", ".ico",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            manifest_paths: vec!["/manifest.json".into(), "/manifest.webmanifest".into()],
            three_markers: vec!["three".into(), "vendors".into()],
            api_prefix: "/api/".into(),
            framework_prefix: "/_next/static/".into(),
        }
    }
}

/// Cache janitor limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
    /// Sweep period in seconds
    pub interval_secs: u64,
    /// A cache above this many entries gets trimmed
    pub max_entries: usize,
    /// Entries kept after trimming
    pub trim_to: usize,
}

impl JanitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 24 * 60 * 60,
            max_entries: 100,
            trim_to: 50,
        }
    }
}

/// Background sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Sync tag that drains the contact-form outbox
    pub tag: String,
    /// Endpoint queued submissions are POSTed to
    pub endpoint: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tag: "contact-form".into(),
            endpoint: "/api/contact".into(),
        }
    }
}

/// Push notification presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub title: String,
    pub icon: String,
    pub badge: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: "ProWeb Studio".into(),
            icon: "/assets/logo/logo-proweb-icon.svg".into(),
            badge: "/icons/favicon-32.png".into(),
        }
    }
}

/// Origin the site is served from
pub const DEFAULT_ORIGIN: &str = "https://prowebstudio.nl/";

/// Service worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Product prefix of every cache name
    pub product: String,
    /// Version suffix; bumping it invalidates all caches on activation
    pub version: String,
    /// Origin the worker controls
    pub origin: Url,
    /// Paths fetched and cached at install time
    pub precache: Vec<String>,
    /// Fallback document for failed navigations
    pub offline_page: String,
    pub routes: RouteConfig,
    pub janitor: JanitorConfig,
    pub sync: SyncConfig,
    pub notifications: NotificationConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            product: "proweb".into(),
            version: "v1".into(),
            // Literal covered by test_default_origin_parses; `Default` cannot fail.
            origin: Url::parse(DEFAULT_ORIGIN).expect("DEFAULT_ORIGIN is a valid URL"),
            precache: vec![
                "/manifest.json".into(),
                "/assets/logo/logo-proweb-lockup.svg".into(),
                "/assets/logo/logo-proweb-icon.svg".into(),
                "/offline.html".into(),
            ],
            offline_page: "/offline.html".into(),
            routes: RouteConfig::default(),
            janitor: JanitorConfig::default(),
            sync: SyncConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the worker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.product.trim().is_empty() {
            return Err(ConfigError::Invalid("product must not be empty".into()));
        }
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid("version must not be empty".into()));
        }
        if self.janitor.interval_secs == 0 {
            return Err(ConfigError::Invalid("janitor interval must be positive".into()));
        }
        if self.janitor.trim_to > self.janitor.max_entries {
            return Err(ConfigError::Invalid(format!(
                "janitor trim_to ({}) exceeds max_entries ({})",
                self.janitor.trim_to, self.janitor.max_entries
            )));
        }
        if !self.precache.iter().any(|p| p == &self.offline_page) {
            return Err(ConfigError::Invalid(format!(
                "offline page {} is not precached",
                self.offline_page
            )));
        }
        for path in self.precache.iter().chain([&self.sync.endpoint]) {
            self.resolve(path)?;
        }
        Ok(())
    }

    pub fn cache_names(&self) -> CacheNames {
        CacheNames::new(&self.product, &self.version)
    }

    /// Resolve a site path against the origin
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        self.origin.join(path).map_err(|source| ConfigError::Resolve {
            path: path.to_string(),
            source,
        })
    }
}
