//! In-process coordinator satisfying the key/value contract the rest of
//! the replication layer is written against: last-writer-wins puts and
//! at-least-once watch delivery across reconnects.
//!
//! A real deployment could swap this for an etcd-backed client without
//! touching `ReplicationState`, since everything here is expressed
//! against the `KvStore` trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use flume::Sender;
use parking_lot::Mutex;
use tokio_stream::Stream;

use crate::error::Result;

/// A single change delivered by `KvStore::watch`. Deletions carry an
/// empty `value`; subscribers ignore those.
#[derive(Debug, Clone)]
pub struct KvEvent {
    /// Full key, including the watched prefix.
    pub key: String,
    /// New value, or empty on deletion.
    pub value: String,
}

/// Minimal key/value coordinator contract used by `ReplicationState`.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Upsert `key` to `value`.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Return every `(key, value)` pair whose key starts with `prefix`.
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    /// Remove `key`, if present. Not an error if absent.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Subscribe to every change under `prefix`. The returned stream first
    /// yields a snapshot of all currently-matching keys, then subsequent
    /// puts/deletes as they happen — so a subscriber that reconnects never
    /// misses work that was enqueued while it was away.
    fn watch(&self, prefix: &str) -> std::pin::Pin<Box<dyn Stream<Item = KvEvent> + Send>>;
}

struct Watcher {
    prefix: String,
    tx: Sender<KvEvent>,
}

/// In-memory `KvStore` backed by an ordered map and a fan-out of per-watch
/// channels.
#[derive(Default)]
pub struct InMemoryKv {
    inner: Mutex<InMemoryKvInner>,
}

#[derive(Default)]
struct InMemoryKvInner {
    entries: BTreeMap<String, String>,
    watchers: Vec<Watcher>,
}

impl InMemoryKv {
    /// Create an empty coordinator.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn notify(inner: &mut InMemoryKvInner, key: &str, value: &str) {
        inner.watchers.retain(|w| {
            if !key.starts_with(&w.prefix) {
                return true;
            }
            w.tx
                .send(KvEvent { key: key.to_string(), value: value.to_string() })
                .is_ok()
        });
    }
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.entries.insert(key.to_string(), value.to_string());
        Self::notify(&mut inner, key, value);
        Ok(())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let inner = self.inner.lock();
        Ok(inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.entries.remove(key);
        Self::notify(&mut inner, key, "");
        Ok(())
    }

    fn watch(&self, prefix: &str) -> std::pin::Pin<Box<dyn Stream<Item = KvEvent> + Send>> {
        let (tx, rx) = flume::unbounded();
        let snapshot: Vec<KvEvent> = {
            let mut inner = self.inner.lock();
            let snapshot = inner
                .entries
                .range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| KvEvent { key: k.clone(), value: v.clone() })
                .collect();
            inner.watchers.push(Watcher { prefix: prefix.to_string(), tx });
            snapshot
        };

        let live = rx.into_stream();
        Box::pin(futures::stream::iter(snapshot).chain(live))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn watch_emits_snapshot_then_live_events() {
        let kv = InMemoryKv::new();
        kv.put("replication/moscow/numbers/a", "leningrad").await.unwrap();

        let mut stream = kv.watch("replication/moscow/");
        let first = stream.next().await.unwrap();
        assert_eq!(first.key, "replication/moscow/numbers/a");

        kv.put("replication/moscow/numbers/b", "leningrad").await.unwrap();
        let second = stream.next().await.unwrap();
        assert_eq!(second.key, "replication/moscow/numbers/b");
    }

    #[tokio::test]
    async fn delete_notifies_watchers_with_empty_value() {
        let kv = InMemoryKv::new();
        kv.put("peers/moscow", "127.0.0.1:9000").await.unwrap();
        let mut stream = kv.watch("peers/");
        let _snapshot = stream.next().await.unwrap();

        kv.delete("peers/moscow").await.unwrap();
        let deleted = stream.next().await.unwrap();
        assert_eq!(deleted.key, "peers/moscow");
        assert!(deleted.value.is_empty());
    }

    #[tokio::test]
    async fn get_prefix_only_returns_matching_keys() {
        let kv = InMemoryKv::new();
        kv.put("peers/moscow", "a").await.unwrap();
        kv.put("peers/leningrad", "b").await.unwrap();
        kv.put("replication/moscow/x", "c").await.unwrap();

        let peers = kv.get_prefix("peers/").await.unwrap();
        assert_eq!(peers.len(), 2);
    }
}
