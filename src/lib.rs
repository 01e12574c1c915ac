//! chukcha — a distributed, append-only message queue.
//!
//! Producers append newline-delimited records to a category's log on any
//! instance; each instance replicates its own chunks to every peer through
//! a watchable key/value coordinator, and consumers pull chunks through a
//! simple HTTP protocol, acking sealed chunks once fully drained.
#![warn(missing_docs)]

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod framing;
pub mod metrics;
pub mod replication;
pub mod store;

pub use client::{ProcessOutcome, PullClient};
pub use config::Config;
pub use error::{Error, Result};

/// Crate version, as set by Cargo.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name, as set by Cargo.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize process-wide tracing and the Prometheus metrics registry.
/// Call once at process startup, before serving any requests.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("initializing {} v{}", NAME, VERSION);
    metrics::init();
}
