//! Typed surface over a `KvStore`, scoping every key under the cluster
//! name and translating to/from the peer-registry and replication-queue
//! key layouts.

use std::sync::Arc;

use futures::StreamExt;

use crate::error::{Error, Result};
use crate::replication::kv::KvStore;

/// `{instanceName, listenAddr}` pair registered by each node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Instance name.
    pub name: String,
    /// Address peers should dial to read this instance's chunks.
    pub listen_addr: String,
}

/// A pending download: `target` owes a copy of `owner`'s
/// `category/file_name` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationTask {
    /// Instance that produced the chunk.
    pub owner: String,
    /// Category the chunk belongs to.
    pub category: String,
    /// Chunk file name.
    pub file_name: String,
}

/// Scopes every coordinator key under `<cluster>/` and exposes the
/// peer-registry / replication-queue operations the rest of the crate
/// needs.
pub struct ReplicationState {
    cluster: String,
    kv: Arc<dyn KvStore>,
}

impl ReplicationState {
    /// Wrap `kv`, scoping all keys under `cluster`.
    pub fn new(cluster: String, kv: Arc<dyn KvStore>) -> Self {
        Self { cluster, kv }
    }

    fn peer_key(&self, name: &str) -> String {
        format!("{}/peers/{name}", self.cluster)
    }

    fn peers_prefix(&self) -> String {
        format!("{}/peers/", self.cluster)
    }

    fn task_key(&self, target: &str, category: &str, file_name: &str) -> String {
        format!("{}/replication/{target}/{category}/{file_name}", self.cluster)
    }

    fn tasks_prefix(&self, target: &str) -> String {
        format!("{}/replication/{target}/", self.cluster)
    }

    /// Register this instance's listen address so peers can discover it.
    pub async fn register_peer(&self, name: &str, listen_addr: &str) -> Result<()> {
        self.kv.put(&self.peer_key(name), listen_addr).await
    }

    /// List every registered peer.
    pub async fn list_peers(&self) -> Result<Vec<Peer>> {
        let prefix = self.peers_prefix();
        let entries = self.kv.get_prefix(&prefix).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(&prefix)?.to_string();
                Some(Peer { name, listen_addr: value })
            })
            .collect())
    }

    /// Enqueue a download of `owner`'s `category/file_name` chunk for
    /// `target`.
    pub async fn enqueue(&self, target: &str, owner: &str, category: &str, file_name: &str) -> Result<()> {
        let key = self.task_key(target, category, file_name);
        self.kv.put(&key, owner).await
    }

    /// Mark a task as complete or abandoned.
    pub async fn dequeue(&self, target: &str, category: &str, file_name: &str) -> Result<()> {
        let key = self.task_key(target, category, file_name);
        self.kv.delete(&key).await
    }

    /// Stream of `ReplicationTask`s owed to `target`: an initial snapshot
    /// of everything currently enqueued, followed by subsequent
    /// enqueues. Deletions (ack/dequeue echoes) are filtered out.
    pub fn watch(&self, target: &str) -> std::pin::Pin<Box<dyn futures::Stream<Item = ReplicationTask> + Send>> {
        let prefix = self.tasks_prefix(target);
        let stream = self.kv.watch(&prefix).filter_map(move |event| {
            let prefix = prefix.clone();
            async move {
                if event.value.is_empty() {
                    return None;
                }
                let rest = event.key.strip_prefix(&prefix)?;
                let mut parts = rest.splitn(2, '/');
                let category = parts.next()?.to_string();
                let file_name = parts.next()?.to_string();
                Some(ReplicationTask { owner: event.value, category, file_name })
            }
        });
        Box::pin(stream)
    }

    /// Resolve `name`'s advertised listen address.
    pub async fn resolve(&self, name: &str) -> Result<String> {
        self.list_peers()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.listen_addr)
            .ok_or_else(|| Error::not_found(format!("no registered peer named {name:?}")))
    }
}
