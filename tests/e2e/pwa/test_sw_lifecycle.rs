//! E2E Test: Worker Lifecycle
//!
//! Tests version upgrades end to end:
//! 1. v1 installs, activates and fills its caches
//! 2. v2 installs over the same storage
//! 3. v2 activates and removes every v1 cache
//! 4. A failed install leaves the running version untouched

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proweb_e2e_tests::SiteFixtures;
    use proweb_runtime::service_worker::{
        CacheStorage, LifecycleEvent, ManualScheduler, MessageOutcome, ServiceWorkerError,
        ServiceWorkerState, WorkerConfig,
    };

    fn config(version: &str) -> WorkerConfig {
        WorkerConfig {
            version: version.into(),
            ..WorkerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_activation_deletes_only_stale_cache() {
        let storage = CacheStorage::new();
        storage.open("proweb-dynamic-v1");
        storage.open("proweb-three-v1");
        storage.open("proweb-three-v0");

        let mut sw = SiteFixtures::worker_with(
            config("v1"),
            SiteFixtures::network(),
            Arc::new(ManualScheduler::new()),
            storage.clone(),
        );
        sw.install().await.unwrap();
        let report = sw.activate().unwrap();

        assert_eq!(report.deleted, vec!["proweb-three-v0".to_string()]);
        assert!(storage.has("proweb-dynamic-v1"));
        assert!(storage.has("proweb-three-v1"));
        assert!(storage.has("proweb-static-v1"));
    }

    #[tokio::test]
    async fn test_version_upgrade_replaces_caches() {
        let network = SiteFixtures::network();
        let storage = CacheStorage::new();

        let mut v1 = SiteFixtures::worker_with(
            config("v1"),
            Arc::clone(&network),
            Arc::new(ManualScheduler::new()),
            storage.clone(),
        );
        v1.install().await.unwrap();
        v1.activate().unwrap();
        v1.handle_fetch(&SiteFixtures::get("/api/projects")).await;
        v1.handle_fetch(&SiteFixtures::get("/_next/static/chunks/three-4f2a.js"))
            .await;
        v1.terminate();

        let mut v2 = SiteFixtures::worker_with(
            config("v2"),
            Arc::clone(&network),
            Arc::new(ManualScheduler::new()),
            storage.clone(),
        );
        v2.install().await.unwrap();
        assert!(v2.is_waiting());
        let report = v2.activate().unwrap();

        assert_eq!(
            report.deleted,
            vec![
                "proweb-dynamic-v1".to_string(),
                "proweb-static-v1".to_string(),
                "proweb-three-v1".to_string(),
            ]
        );
        assert_eq!(storage.keys(), vec!["proweb-static-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_version() {
        let network = SiteFixtures::network();
        let storage = CacheStorage::new();

        let mut v1 = SiteFixtures::worker_with(
            config("v1"),
            Arc::clone(&network),
            Arc::new(ManualScheduler::new()),
            storage.clone(),
        );
        v1.install().await.unwrap();
        v1.activate().unwrap();

        network.fail("/offline.html");
        let mut v2 = SiteFixtures::worker_with(
            config("v2"),
            Arc::clone(&network),
            Arc::new(ManualScheduler::new()),
            storage.clone(),
        );
        let err = v2.install().await.unwrap_err();
        assert!(matches!(err, ServiceWorkerError::InstallFailed { .. }));
        assert_eq!(v2.state(), ServiceWorkerState::Redundant);
        assert!(!storage.has("proweb-static-v2"));
        assert_eq!(storage.entry_count("proweb-static-v1"), Ok(4));
        assert!(v1.is_active());
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates_waiting_worker() {
        let mut sw = SiteFixtures::worker(SiteFixtures::network(), Arc::new(ManualScheduler::new()));
        sw.clients_mut().add(SiteFixtures::url("/"));
        sw.install().await.unwrap();

        match sw.handle_message(r#"{"type":"SKIP_WAITING"}"#).unwrap() {
            MessageOutcome::Activated(report) => assert_eq!(report.claimed, 1),
            other => panic!("expected activation, got {:?}", other),
        }
        assert!(sw.is_active());
        assert_eq!(
            sw.handle_message(r#"{"type":"SKIP_WAITING"}"#).unwrap(),
            MessageOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn test_lifecycle_events_in_order() {
        let mut sw = SiteFixtures::worker(SiteFixtures::network(), Arc::new(ManualScheduler::new()));
        sw.install().await.unwrap();
        sw.activate().unwrap();

        let milestones: Vec<&LifecycleEvent> = sw
            .lifecycle()
            .history()
            .iter()
            .filter(|e| !matches!(e, LifecycleEvent::StateChange(_)))
            .collect();
        let id = sw.id();
        assert_eq!(
            milestones,
            vec![
                &LifecycleEvent::Install(id),
                &LifecycleEvent::Activate(id),
                &LifecycleEvent::ControllerChange(id),
            ]
        );
    }
}
