//! ProWeb End-to-End Scenarios
//!
//! Drives a complete `ServiceWorker` through install, activation and request
//! handling against a scripted network. Shared site content and worker
//! builders live in [`fixtures`]; the scenarios themselves are the `pwa/`
//! test targets.

pub mod fixtures;

pub use fixtures::{SiteFixtures, ORIGIN};
