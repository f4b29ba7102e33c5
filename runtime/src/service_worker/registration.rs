//! Service Worker Registration
//!
//! The page-side gate deciding whether the worker gets registered at all,
//! and the container that tracks registrations by scope.

use std::collections::BTreeMap;

use url::Url;

use super::ServiceWorkerError;

/// Script served at the site root
pub const DEFAULT_SCRIPT_URL: &str = "/sw.js";

/// Service Worker scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope(String);

impl Scope {
    /// Create a new scope
    pub fn new(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self(path)
    }

    /// Get the path
    pub fn path(&self) -> &str {
        &self.0
    }

    /// Check if a path is within this scope
    pub fn contains(&self, path: &str) -> bool {
        path.starts_with(&self.0)
    }
}

/// Update via cache mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateViaCache {
    /// Import scripts cached, main script not
    #[default]
    Imports,
    /// All scripts cached
    All,
    /// Always revalidate against the network
    None,
}

/// Registration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOptions {
    pub scope: String,
    pub update_via_cache: UpdateViaCache,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            scope: "/".into(),
            update_via_cache: UpdateViaCache::None,
        }
    }
}

/// What the registering page knows about itself
#[derive(Debug, Clone)]
pub struct PageEnvironment {
    /// Whether the host exposes service workers at all
    pub supports_service_worker: bool,
    /// Production build
    pub production: bool,
    /// URL of the registering page
    pub page_url: Url,
}

impl PageEnvironment {
    /// A production page with service-worker support
    pub fn production(page_url: Url) -> Self {
        Self {
            supports_service_worker: true,
            production: true,
            page_url,
        }
    }

    pub fn is_localhost(&self) -> bool {
        matches!(self.page_url.host_str(), Some("localhost" | "127.0.0.1"))
    }

    pub fn is_secure(&self) -> bool {
        self.page_url.scheme() == "https"
    }
}

/// Why registration was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No service-worker support in the host
    Unsupported,
    /// Page not served over HTTPS
    InsecureContext,
}

/// Outcome of the registration gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationDecision {
    /// Do nothing
    Skip(SkipReason),
    /// Development or local page: remove leftover registrations, register nothing
    UnregisterExisting,
    /// Register the worker
    Register {
        script_url: String,
        options: RegistrationOptions,
    },
}

/// Decides whether a page registers the worker
#[derive(Debug, Clone)]
pub struct RegistrationPolicy {
    script_url: String,
    options: RegistrationOptions,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SCRIPT_URL, RegistrationOptions::default())
    }
}

impl RegistrationPolicy {
    pub fn new(script_url: impl Into<String>, options: RegistrationOptions) -> Self {
        Self {
            script_url: script_url.into(),
            options,
        }
    }

    pub fn evaluate(&self, env: &PageEnvironment) -> RegistrationDecision {
        if !env.supports_service_worker {
            log::debug!("[SW] Registration skipped: no browser support");
            return RegistrationDecision::Skip(SkipReason::Unsupported);
        }
        if !env.production || env.is_localhost() {
            return RegistrationDecision::UnregisterExisting;
        }
        if !env.is_secure() {
            log::debug!("[SW] Registration skipped: not HTTPS");
            return RegistrationDecision::Skip(SkipReason::InsecureContext);
        }
        RegistrationDecision::Register {
            script_url: self.script_url.clone(),
            options: self.options.clone(),
        }
    }
}

/// A service worker registration: one script bound to one scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceWorkerRegistration {
    scope: Scope,
    script_url: String,
    update_via_cache: UpdateViaCache,
}

impl ServiceWorkerRegistration {
    pub fn new(scope: Scope, script_url: impl Into<String>, update_via_cache: UpdateViaCache) -> Self {
        Self {
            scope,
            script_url: script_url.into(),
            update_via_cache,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn script_url(&self) -> &str {
        &self.script_url
    }

    /// Whether the browser's HTTP cache may answer update checks
    pub fn update_via_cache(&self) -> UpdateViaCache {
        self.update_via_cache
    }
}

/// Service Worker Container
///
/// Manages the registrations of one origin.
#[derive(Debug)]
pub struct ServiceWorkerContainer {
    origin: Url,
    registrations: BTreeMap<Scope, ServiceWorkerRegistration>,
}

impl ServiceWorkerContainer {
    /// Create a new container
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            registrations: BTreeMap::new(),
        }
    }

    /// Get the origin
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Register a script for `options.scope`.
    ///
    /// Registering the same script again returns the existing registration;
    /// a different script on an occupied scope is refused.
    pub fn register(
        &mut self,
        script_url: &str,
        options: &RegistrationOptions,
    ) -> Result<&ServiceWorkerRegistration, ServiceWorkerError> {
        let resolved = self
            .origin
            .join(script_url)
            .map_err(|err| ServiceWorkerError::RegistrationFailed(err.to_string()))?;
        if resolved.origin() != self.origin.origin() {
            return Err(ServiceWorkerError::SecurityError(format!(
                "script {} is not same-origin",
                resolved
            )));
        }

        let scope = Scope::new(options.scope.clone());
        let same_script = self
            .registrations
            .get(&scope)
            .map(|existing| existing.script_url() == script_url);
        match same_script {
            Some(true) => {}
            Some(false) => {
                return Err(ServiceWorkerError::AlreadyRegistered(scope.path().to_string()));
            }
            None => {
                let registration =
                    ServiceWorkerRegistration::new(scope.clone(), script_url, options.update_via_cache);
                log::info!("[SW] Registered {} for scope {}", script_url, scope.path());
                self.registrations.insert(scope.clone(), registration);
            }
        }

        self.registrations
            .get(&scope)
            .ok_or_else(|| ServiceWorkerError::NotFound(scope.path().to_string()))
    }

    /// Get registration for a scope
    pub fn get_registration(&self, scope: &Scope) -> Option<&ServiceWorkerRegistration> {
        self.registrations.get(scope)
    }

    /// Get all registrations
    pub fn get_registrations(&self) -> impl Iterator<Item = &ServiceWorkerRegistration> {
        self.registrations.values()
    }

    /// Unregister a scope
    pub fn unregister(&mut self, scope: &Scope) -> Result<(), ServiceWorkerError> {
        match self.registrations.remove(scope) {
            Some(registration) => {
                log::info!("[SW] Unregistered {}", registration.script_url());
                Ok(())
            }
            None => Err(ServiceWorkerError::NotFound(scope.path().to_string())),
        }
    }

    /// Unregister everything. Returns how many were removed.
    pub fn unregister_all(&mut self) -> usize {
        let count = self.registrations.len();
        self.registrations.clear();
        if count > 0 {
            log::info!("[SW] Unregistered {} stale registrations", count);
        }
        count
    }

    /// Find the registration with the longest scope containing `path`
    pub fn match_registration(&self, path: &str) -> Option<&ServiceWorkerRegistration> {
        self.registrations
            .iter()
            .filter(|(scope, _)| scope.contains(path))
            .max_by_key(|(scope, _)| scope.path().len())
            .map(|(_, reg)| reg)
    }

    /// Carry out a gate decision. Returns the scope registered, if any.
    pub fn apply(&mut self, decision: &RegistrationDecision) -> Result<Option<Scope>, ServiceWorkerError> {
        match decision {
            RegistrationDecision::Skip(_) => Ok(None),
            RegistrationDecision::UnregisterExisting => {
                self.unregister_all();
                Ok(None)
            }
            RegistrationDecision::Register { script_url, options } => {
                let registration = self.register(script_url, options)?;
                Ok(Some(registration.scope().clone()))
            }
        }
    }
}
