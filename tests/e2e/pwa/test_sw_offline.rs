//! E2E Test: Offline Capability
//!
//! Drives an installed and activated worker through the request mix of a
//! real visit, then cuts the network:
//! 1. Navigations go to the network and are never cached
//! 2. Static assets are served from cache once fetched
//! 3. 3D bundles are served stale and refreshed in the background
//! 4. API calls fall back to the last good response, else a 503

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proweb_e2e_tests::SiteFixtures;
    use proweb_runtime::service_worker::testing::ScriptedNetwork;
    use proweb_runtime::service_worker::{FetchOutcome, ManualScheduler, Response, ServiceWorker};

    async fn activated(network: &Arc<ScriptedNetwork>) -> ServiceWorker {
        let mut sw = SiteFixtures::worker(Arc::clone(network), Arc::new(ManualScheduler::new()));
        sw.install().await.unwrap();
        sw.activate().unwrap();
        sw
    }

    fn respond(outcome: FetchOutcome) -> Response {
        outcome.into_response().expect("worker answered")
    }

    #[tokio::test]
    async fn test_navigation_uses_network_and_leaves_caches_alone() {
        let network = SiteFixtures::network();
        let sw = activated(&network).await;
        let static_before = sw.storage().entry_count("proweb-static-v1").unwrap();
        let dynamic_before = sw.storage().entry_count("proweb-dynamic-v1").unwrap_or(0);

        let response = respond(sw.handle_fetch(&SiteFixtures::navigate("/")).await);
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), SiteFixtures::home_page());

        assert_eq!(sw.storage().entry_count("proweb-static-v1").unwrap(), static_before);
        assert_eq!(sw.storage().entry_count("proweb-dynamic-v1").unwrap_or(0), dynamic_before);
        assert!(sw.storage().match_in("proweb-static-v1", &SiteFixtures::get("/")).is_none());
    }

    #[tokio::test]
    async fn test_navigation_is_fresh_on_every_visit() {
        let network = SiteFixtures::network();
        let sw = activated(&network).await;
        sw.handle_fetch(&SiteFixtures::navigate("/")).await;

        network.respond("/", Response::new(200).with_body("<h1>Nieuwe homepage</h1>"));
        let response = respond(sw.handle_fetch(&SiteFixtures::navigate("/")).await);
        assert_eq!(response.text(), "<h1>Nieuwe homepage</h1>");
        assert_eq!(network.calls("/"), 2);
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_offline_page() {
        let network = SiteFixtures::network();
        let sw = activated(&network).await;
        network.go_offline();

        let response = respond(sw.handle_fetch(&SiteFixtures::navigate("/portfolio")).await);
        assert_eq!(response.text(), SiteFixtures::offline_page());
    }

    #[tokio::test]
    async fn test_static_asset_survives_network_loss() {
        let network = SiteFixtures::network();
        network.respond("/assets/logo.svg", Response::new(200).with_body("<svg id=\"logo\"/>"));
        let sw = activated(&network).await;

        let first = respond(sw.handle_fetch(&SiteFixtures::get("/assets/logo.svg")).await);
        assert_eq!(first.status, 200);

        network.fail("/assets/logo.svg");
        let second = respond(sw.handle_fetch(&SiteFixtures::get("/assets/logo.svg")).await);
        assert_eq!(second.status, 200);
        assert_eq!(second.text(), "<svg id=\"logo\"/>");
        assert_eq!(network.calls("/assets/logo.svg"), 1);
    }

    #[tokio::test]
    async fn test_precached_manifest_served_without_network() {
        let network = SiteFixtures::network();
        let sw = activated(&network).await;
        let installs = network.calls("/manifest.json");

        network.go_offline();
        let response = respond(sw.handle_fetch(&SiteFixtures::get("/manifest.json")).await);
        assert_eq!(response.text(), SiteFixtures::manifest());
        assert_eq!(network.calls("/manifest.json"), installs);
    }

    #[tokio::test]
    async fn test_three_bundle_stale_while_revalidate() {
        let network = SiteFixtures::network();
        let sw = activated(&network).await;
        let chunk = "/_next/static/chunks/three-4f2a.js";

        // Empty cache: the first call waits for the network.
        let first = respond(sw.handle_fetch(&SiteFixtures::get(chunk)).await);
        assert_eq!(first.text(), "/* three v1 */");
        assert_eq!(network.calls(chunk), 1);
        assert!(sw.storage().match_in("proweb-three-v1", &SiteFixtures::get(chunk)).is_some());

        // Cache hit: served stale while the refresh runs detached.
        network.respond(chunk, Response::new(200).with_body("/* three v2 */"));
        let second = respond(sw.handle_fetch(&SiteFixtures::get(chunk)).await);
        assert_eq!(second.text(), "/* three v1 */");

        sw.settle().await;
        assert_eq!(network.calls(chunk), 2);
        let third = respond(sw.handle_fetch(&SiteFixtures::get(chunk)).await);
        assert_eq!(third.text(), "/* three v2 */");
    }

    #[tokio::test]
    async fn test_failed_background_refresh_keeps_cached_copy() {
        let network = SiteFixtures::network();
        let sw = activated(&network).await;
        let chunk = "/_next/static/chunks/three-4f2a.js";
        sw.handle_fetch(&SiteFixtures::get(chunk)).await;

        network.go_offline();
        let stale = respond(sw.handle_fetch(&SiteFixtures::get(chunk)).await);
        assert_eq!(stale.text(), "/* three v1 */");
        sw.settle().await;

        let again = respond(sw.handle_fetch(&SiteFixtures::get(chunk)).await);
        assert_eq!(again.text(), "/* three v1 */");
    }

    #[tokio::test]
    async fn test_api_falls_back_to_last_good_response() {
        let network = SiteFixtures::network();
        network.respond("/api/contact", Response::new(200).with_body(r#"{"open":true}"#));
        let sw = activated(&network).await;

        let live = respond(sw.handle_fetch(&SiteFixtures::get("/api/contact")).await);
        assert_eq!(live.text(), r#"{"open":true}"#);

        network.fail("/api/contact");
        let cached = respond(sw.handle_fetch(&SiteFixtures::get("/api/contact")).await);
        assert_eq!(cached.status, 200);
        assert_eq!(cached.text(), r#"{"open":true}"#);
    }

    #[tokio::test]
    async fn test_api_without_cached_copy_is_offline_503() {
        let network = SiteFixtures::network();
        network.fail("/api/contact");
        let sw = activated(&network).await;

        let response = respond(sw.handle_fetch(&SiteFixtures::get("/api/contact")).await);
        assert_eq!(response.status, 503);
        assert_eq!(response.text(), "Offline");
    }

    #[tokio::test]
    async fn test_api_error_status_is_not_cached() {
        let network = SiteFixtures::network();
        network.respond("/api/projects", Response::new(500));
        let sw = activated(&network).await;

        let response = respond(sw.handle_fetch(&SiteFixtures::get("/api/projects")).await);
        assert_eq!(response.status, 500);
        assert!(sw
            .storage()
            .match_in("proweb-dynamic-v1", &SiteFixtures::get("/api/projects"))
            .is_none());
    }
}
