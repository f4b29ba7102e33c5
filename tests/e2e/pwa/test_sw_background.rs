//! E2E Test: Background Sync and Push
//!
//! Tests the worker's non-fetch events:
//! 1. Contact form submitted offline is queued
//! 2. Sync while still offline keeps it queued
//! 3. Sync after reconnecting delivers it
//! 4. Push shows a notification; clicking it opens its URL

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proweb_e2e_tests::SiteFixtures;
    use proweb_runtime::service_worker::{
        ClickOutcome, ManualScheduler, NotificationClickEvent, PushEvent, RequestMethod, Response,
        SyncError, SyncState,
    };

    #[tokio::test]
    async fn test_offline_contact_form_delivered_on_reconnect() {
        let network = SiteFixtures::network();
        network.respond("/api/contact", Response::new(201));
        let mut sw = SiteFixtures::worker(Arc::clone(&network), Arc::new(ManualScheduler::new()));
        sw.install().await.unwrap();
        sw.activate().unwrap();

        network.go_offline();
        sw.queue_submission(
            r#"{"naam":"Anna","email":"anna@example.nl","bericht":"Offerte webshop"}"#,
            "application/json",
        );
        sw.queue_submission(r#"{"naam":"Bram"}"#, "application/json");

        let report = sw.handle_sync("contact-form").await.unwrap();
        assert_eq!((report.delivered, report.remaining), (0, 2));
        assert_eq!(
            sw.sync_manager().get("contact-form").map(|r| r.state()),
            Some(SyncState::Reregistering)
        );

        network.go_online();
        let report = sw.handle_sync("contact-form").await.unwrap();
        assert_eq!((report.delivered, report.remaining), (2, 0));
        assert!(sw.outbox().is_empty());
        assert!(sw.sync_manager().get("contact-form").is_none());

        let posts: Vec<_> = network
            .requests()
            .into_iter()
            .filter(|r| r.method == RequestMethod::Post)
            .collect();
        assert_eq!(posts.len(), 4);
        assert!(posts.iter().all(|r| r.path() == "/api/contact"));
    }

    #[tokio::test]
    async fn test_unknown_sync_tag_rejected() {
        let mut sw = SiteFixtures::worker(SiteFixtures::network(), Arc::new(ManualScheduler::new()));
        assert_eq!(
            sw.handle_sync("newsletter").await.unwrap_err(),
            SyncError::UnknownTag("newsletter".into())
        );
    }

    #[test]
    fn test_push_notification_opens_embedded_url() {
        let mut sw = SiteFixtures::worker(SiteFixtures::network(), Arc::new(ManualScheduler::new()));
        let shown = sw.handle_push(&PushEvent::from_text(
            r#"{"title":"Nieuw in het portfolio","body":"Bekijk de webshop","url":"/portfolio/webshop"}"#,
        ));
        assert_eq!(shown.title, "Nieuw in het portfolio");
        assert_eq!(shown.icon, "/assets/logo/logo-proweb-icon.svg");
        let actions: Vec<&str> = shown.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, vec!["open", "close"]);

        let click = NotificationClickEvent::new(shown.id).with_action("open");
        assert_eq!(
            sw.handle_notification_click(&click),
            ClickOutcome::Opened("/portfolio/webshop".into())
        );
        assert_eq!(sw.clients().match_all(false)[0].url, "/portfolio/webshop");
    }

    #[test]
    fn test_plain_text_push_defaults_to_home() {
        let mut sw = SiteFixtures::worker(SiteFixtures::network(), Arc::new(ManualScheduler::new()));
        let shown = sw.handle_push(&PushEvent::from_text("Er staat een nieuw artikel online"));
        assert_eq!(shown.body, "Er staat een nieuw artikel online");
        assert_eq!(shown.title, "ProWeb Studio");

        let outcome = sw.handle_notification_click(&NotificationClickEvent::new(shown.id));
        assert_eq!(outcome, ClickOutcome::Opened("/".into()));
    }
}
