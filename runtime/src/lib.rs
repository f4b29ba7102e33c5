//! ProWeb Offline Runtime
//!
//! This crate provides the service worker behind the ProWeb Studio progressive
//! web app: it precaches the application shell, intercepts same-origin GET
//! requests and answers them through per-route caching strategies so the site
//! keeps working with a flaky or absent network.
//!
//! The worker is host-driven. The host owns the event loop and the network;
//! it hands the worker a [`Network`](service_worker::Network) implementation
//! and a [`Scheduler`](service_worker::Scheduler), then calls `install`,
//! `activate` and `handle_fetch` as the browser would dispatch events.
//!
//! # Architecture
//!
//! - `service_worker::config`: `WorkerConfig` (cache names, precache manifest, route patterns, limits)
//! - `service_worker::fetch` / `network`: request/response model and the `Network` seam
//! - `service_worker::cache`: insertion-ordered named caches (`CacheStorage`)
//! - `service_worker::lifecycle`: state machine, precache on install, purge on activate
//! - `service_worker::router`: ordered predicate table choosing a strategy per request
//! - `service_worker::strategy`: network-first, cache-first, stale-while-revalidate, network-only
//! - `service_worker::janitor`: periodic FIFO trimming of oversized caches
//! - `service_worker::events`: page messages, push notifications, clients
//! - `service_worker::sync`: background sync and the contact-form outbox
//! - `service_worker::registration`: page-side registration gate and container
//!
//! Logging goes through the `log` facade; no logger is installed here.

pub mod service_worker;

pub use service_worker::{
    ConfigError, FetchOutcome, Request, Response, ServiceWorker, ServiceWorkerError,
    ServiceWorkerState, WorkerConfig,
};
