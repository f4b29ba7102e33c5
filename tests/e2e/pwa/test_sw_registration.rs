//! E2E Test: Registration Gate
//!
//! Tests which pages end up registering the worker:
//! 1. Production HTTPS page registers `/sw.js` at `/`
//! 2. Development and localhost pages clear stale registrations
//! 3. Insecure or unsupported pages do nothing

#[cfg(test)]
mod tests {
    use proweb_e2e_tests::ORIGIN;
    use proweb_runtime::service_worker::{
        PageEnvironment, RegistrationDecision, RegistrationPolicy, Scope, ServiceWorkerContainer,
        SkipReason, UpdateViaCache,
    };
    use url::Url;

    fn page(url: &str) -> PageEnvironment {
        PageEnvironment::production(Url::parse(url).unwrap())
    }

    fn container() -> ServiceWorkerContainer {
        ServiceWorkerContainer::new(Url::parse(ORIGIN).unwrap())
    }

    #[test]
    fn test_production_visit_registers_once() {
        let policy = RegistrationPolicy::default();
        let mut container = container();

        for path in ["/", "/diensten", "/contact"] {
            let decision = policy.evaluate(&page(&format!("{}{}", ORIGIN, path)));
            assert_eq!(container.apply(&decision).unwrap(), Some(Scope::new("/")));
        }

        let registrations: Vec<_> = container.get_registrations().collect();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].script_url(), "/sw.js");
        assert_eq!(registrations[0].update_via_cache(), UpdateViaCache::None);
        assert!(container.match_registration("/blog/pwa").is_some());
    }

    #[test]
    fn test_local_development_clears_registrations() {
        let policy = RegistrationPolicy::default();
        let mut container = container();
        container
            .apply(&policy.evaluate(&page("https://prowebstudio.nl/")))
            .unwrap();

        let local = policy.evaluate(&page("http://localhost:3000/"));
        assert_eq!(local, RegistrationDecision::UnregisterExisting);
        assert_eq!(container.apply(&local).unwrap(), None);
        assert_eq!(container.get_registrations().count(), 0);
    }

    #[test]
    fn test_insecure_and_unsupported_pages_skip() {
        let policy = RegistrationPolicy::default();
        let mut container = container();

        let insecure = policy.evaluate(&page("http://prowebstudio.nl/"));
        assert_eq!(insecure, RegistrationDecision::Skip(SkipReason::InsecureContext));

        let mut old_browser = page("https://prowebstudio.nl/");
        old_browser.supports_service_worker = false;
        let unsupported = policy.evaluate(&old_browser);
        assert_eq!(unsupported, RegistrationDecision::Skip(SkipReason::Unsupported));

        assert_eq!(container.apply(&insecure).unwrap(), None);
        assert_eq!(container.apply(&unsupported).unwrap(), None);
        assert_eq!(container.get_registrations().count(), 0);
    }
}
