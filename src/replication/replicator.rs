//! Downloads chunks enqueued for this instance from their owning peer.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::replication::state::{ReplicationState, ReplicationTask};
use crate::store::{ChunkInfo, StoreRegistry};

/// Runs one long-lived download loop per instance, fanning out one task
/// per in-flight chunk.
pub struct Replicator {
    instance_name: String,
    state: Arc<ReplicationState>,
    registry: Arc<StoreRegistry>,
    http: reqwest::Client,
    replication_batch_size: usize,
    poll_interval: Duration,
    retry_timeout: Duration,
}

impl Replicator {
    /// Build a replicator for `instance_name`, pulling from `state`'s task
    /// queue into `registry`'s local stores.
    pub fn new(
        instance_name: String,
        state: Arc<ReplicationState>,
        registry: Arc<StoreRegistry>,
        http_timeout: Duration,
        replication_batch_size: usize,
        poll_interval: Duration,
        retry_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| Error::transient(format!("failed to build replication http client: {e}")))?;

        Ok(Self {
            instance_name,
            state,
            registry,
            http,
            replication_batch_size,
            poll_interval,
            retry_timeout,
        })
    }

    /// Consume the task queue forever, spawning one download per task so
    /// a slow owner cannot block catch-up from a different owner.
    pub async fn run(self: Arc<Self>) {
        let mut tasks = self.state.watch(&self.instance_name);
        while let Some(task) = tasks.next().await {
            let this = self.clone();
            tokio::spawn(async move {
                this.handle_task(task).await;
            });
        }
    }

    #[instrument(skip(self), fields(instance = %self.instance_name, category = %task.category, chunk = %task.file_name, owner = %task.owner))]
    async fn handle_task(&self, task: ReplicationTask) {
        match self.download_chunk(&task).await {
            Ok(()) => {
                if let Err(e) = self
                    .state
                    .dequeue(&self.instance_name, &task.category, &task.file_name)
                    .await
                {
                    warn!(error = %e, "failed to dequeue completed replication task");
                }
            }
            Err(e) if e.is_terminal_not_found() => {
                warn!(error = %e, "abandoning replication task, chunk no longer exists upstream");
                if let Err(e) = self
                    .state
                    .dequeue(&self.instance_name, &task.category, &task.file_name)
                    .await
                {
                    warn!(error = %e, "failed to dequeue abandoned replication task");
                }
            }
            Err(e) => {
                warn!(error = %e, "replication task failed, it remains queued for retry");
            }
        }
    }

    /// Download `task.owner`'s chunk until it has been fully copied and
    /// the owner reports it complete.
    async fn download_chunk(&self, task: &ReplicationTask) -> Result<()> {
        let addr = self.state.resolve(&task.owner).await?;
        let store = self.registry.get(&task.category).await?;

        loop {
            let local_size = store.stat(&task.file_name).await?.unwrap_or(0);

            let remote = match self.remote_chunk_info(&addr, &task.category, &task.file_name).await {
                Ok(Some(info)) => info,
                Ok(None) => {
                    info!("chunk already removed upstream; nothing to replicate");
                    return Ok(());
                }
                Err(e) if e.is_retryable() => {
                    tokio::time::sleep(self.retry_timeout).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if local_size >= remote.size {
                if remote.complete {
                    return Ok(());
                }
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            match self
                .download_part(&addr, &task.category, &task.file_name, local_size)
                .await
            {
                Ok(bytes) if bytes.is_empty() => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Ok(bytes) => {
                    store.write_direct(&task.file_name, &bytes).await?;
                }
                Err(e) if e.is_retryable() => {
                    tokio::time::sleep(self.retry_timeout).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn remote_chunk_info(&self, addr: &str, category: &str, file_name: &str) -> Result<Option<ChunkInfo>> {
        let url = format!("http://{addr}/listChunks");
        let resp = self
            .http
            .get(&url)
            .query(&[("category", category)])
            .send()
            .await
            .map_err(|e| Error::transient(format!("listChunks request to {addr} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::transient(format!("listChunks on {addr} returned {}", resp.status())));
        }

        let chunks: Vec<ChunkInfo> = resp
            .json()
            .await
            .map_err(|e| Error::transient(format!("malformed listChunks response from {addr}: {e}")))?;

        Ok(chunks.into_iter().find(|c| c.name == file_name))
    }

    async fn download_part(&self, addr: &str, category: &str, file_name: &str, off: u64) -> Result<Vec<u8>> {
        let url = format!("http://{addr}/read");
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("category", category.to_string()),
                ("chunk", file_name.to_string()),
                ("off", off.to_string()),
                ("maxSize", self.replication_batch_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::transient(format!("read request to {addr} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::transient(format!("read on {addr} returned {}", resp.status())));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::transient(format!("failed reading body from {addr}: {e}")))?;
        Ok(bytes.to_vec())
    }
}
