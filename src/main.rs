//! chukcha server binary: parses CLI flags into a `Config`, brings up the
//! local chunk-store registry, the in-process replication coordinator and
//! replicator task, and serves the wire protocol over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use chukcha::api::{create_app, AppState};
use chukcha::config::{split_endpoints, Config};
use chukcha::replication::{InMemoryKv, ReplicationHook, ReplicationState, Replicator};
use chukcha::store::StoreRegistry;

/// A single chukcha instance: local chunked log plus peer replication.
#[derive(Parser, Debug)]
#[command(name = "chukcha-server", version, about = "Distributed append-only message queue")]
struct Cli {
    /// This instance's name; embedded in every chunk file it owns.
    #[arg(long = "instance-name")]
    instance_name: String,

    /// Cluster name; scopes all coordinator keys.
    #[arg(long, default_value = "default")]
    cluster: String,

    /// Root directory holding one subdirectory per category.
    #[arg(long)]
    dirname: PathBuf,

    /// Address this instance's HTTP server binds to and advertises to peers.
    #[arg(long)]
    listen: SocketAddr,

    /// Comma-separated bootstrap peer addresses for the coordinator.
    #[arg(long, default_value = "")]
    etcd: String,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config::default();
        config.instance_name = self.instance_name;
        config.cluster = self.cluster;
        config.dirname = self.dirname;
        config.listen = self.listen;
        config.etcd_endpoints = split_endpoints(&self.etcd);
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chukcha::init();

    let mut config = Cli::parse().into_config();
    config.apply_env_overrides().context("applying environment overrides")?;
    config.validate().context("validating configuration")?;

    info!(
        instance = %config.instance_name,
        cluster = %config.cluster,
        dirname = %config.dirname.display(),
        listen = %config.listen,
        "starting chukcha instance"
    );

    let kv = InMemoryKv::new();
    let replication_state = Arc::new(ReplicationState::new(config.cluster.clone(), kv));
    replication_state
        .register_peer(&config.instance_name, &config.listen.to_string())
        .await
        .context("registering this instance as a peer")?;

    let hook = Arc::new(ReplicationHook::new(config.instance_name.clone(), replication_state.clone()));
    let registry = Arc::new(StoreRegistry::new(
        config.dirname.clone(),
        config.instance_name.clone(),
        hook,
        config.tuning.max_chunk_size,
        config.tuning.read_block_size,
        config.tuning.fd_cache_capacity,
    ));

    let replicator = Arc::new(
        Replicator::new(
            config.instance_name.clone(),
            replication_state.clone(),
            registry.clone(),
            config.tuning.http_timeout,
            config.tuning.replication_batch_size,
            config.tuning.poll_interval,
            config.tuning.retry_timeout,
        )
        .context("building replicator")?,
    );
    let replicator_handle = tokio::spawn(replicator.run());

    let state = AppState {
        instance_name: config.instance_name.clone(),
        registry,
        replication_state,
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding listen address {}", config.listen))?;

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = signal::ctrl_c().await;
            })
            .await
    });

    tokio::select! {
        result = server => {
            result.context("HTTP server task panicked")?.context("HTTP server failed")?;
        }
        _ = replicator_handle => {
            warn!("replicator task terminated unexpectedly");
        }
    }

    info!("shutdown complete");
    Ok(())
}
