//! Test fixtures and data factories
//!
//! A scripted copy of the ProWeb site and helpers that build workers over it.

use std::sync::Arc;

use proweb_runtime::service_worker::testing::ScriptedNetwork;
use proweb_runtime::service_worker::{
    CacheStorage, ManualScheduler, Request, Response, ServiceWorker, WorkerConfig,
};

/// Origin every fixture page lives on
pub const ORIGIN: &str = "https://prowebstudio.nl";

/// Site content served by the scripted network
pub struct SiteFixtures;

impl SiteFixtures {
    /// Home page document
    pub fn home_page() -> String {
        String::from(
            r#"<!DOCTYPE html>
<html lang="nl">
<head><title>ProWeb Studio</title></head>
<body><h1>Websites die werken</h1></body>
</html>"#,
        )
    }

    /// Offline fallback document
    pub fn offline_page() -> String {
        String::from(
            r#"<!DOCTYPE html>
<html lang="nl">
<head><title>Offline | ProWeb Studio</title></head>
<body><h1>Je bent offline</h1></body>
</html>"#,
        )
    }

    pub fn manifest() -> String {
        String::from(r#"{"name":"ProWeb Studio","short_name":"ProWeb","start_url":"/"}"#)
    }

    /// Absolute URL for a site path
    pub fn url(path: &str) -> String {
        format!("{}{}", ORIGIN, path)
    }

    /// GET request for a site path
    pub fn get(path: &str) -> Request {
        Request::get(&Self::url(path)).expect("fixture URL parses")
    }

    /// Navigation request for a site path
    pub fn navigate(path: &str) -> Request {
        Request::navigate(&Self::url(path)).expect("fixture URL parses")
    }

    /// A network serving the precache manifest, the home page, a 3D chunk
    /// and a JSON API.
    pub fn network() -> Arc<ScriptedNetwork> {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(
            "/manifest.json",
            Response::new(200)
                .with_header("Content-Type", "application/manifest+json")
                .with_body(Self::manifest()),
        );
        for logo in [
            "/assets/logo/logo-proweb-lockup.svg",
            "/assets/logo/logo-proweb-icon.svg",
        ] {
            network.respond(
                logo,
                Response::new(200)
                    .with_header("Content-Type", "image/svg+xml")
                    .with_body("<svg/>"),
            );
        }
        network.respond(
            "/offline.html",
            Response::new(200)
                .with_header("Content-Type", "text/html")
                .with_body(Self::offline_page()),
        );
        network.respond(
            "/",
            Response::new(200)
                .with_header("Content-Type", "text/html")
                .with_body(Self::home_page()),
        );
        network.respond(
            "/_next/static/chunks/three-4f2a.js",
            Response::new(200).with_body("/* three v1 */"),
        );
        network.respond(
            "/api/projects",
            Response::new(200)
                .with_header("Content-Type", "application/json")
                .with_body(r#"[{"slug":"webshop"}]"#),
        );
        network
    }

    /// A worker over fresh storage with a manual janitor clock
    pub fn worker(network: Arc<ScriptedNetwork>, scheduler: Arc<ManualScheduler>) -> ServiceWorker {
        Self::worker_with(WorkerConfig::default(), network, scheduler, CacheStorage::new())
    }

    pub fn worker_with(
        config: WorkerConfig,
        network: Arc<ScriptedNetwork>,
        scheduler: Arc<ManualScheduler>,
        storage: CacheStorage,
    ) -> ServiceWorker {
        ServiceWorker::with_storage(config, network, scheduler, storage).expect("fixture config is valid")
    }
}
