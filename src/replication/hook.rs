//! Wires chunk creation to the replication queue: every new chunk is
//! offered to every known peer before the first byte is written to it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::replication::state::ReplicationState;
use crate::store::ChunkCreationHook;

/// `ChunkCreationHook` that enqueues a download task per peer.
pub struct ReplicationHook {
    instance_name: String,
    state: Arc<ReplicationState>,
}

impl ReplicationHook {
    /// Build a hook that enqueues tasks for every peer registered under
    /// `state`, on behalf of `instance_name`.
    pub fn new(instance_name: String, state: Arc<ReplicationState>) -> Self {
        Self { instance_name, state }
    }
}

#[async_trait]
impl ChunkCreationHook for ReplicationHook {
    async fn before_creating_chunk(&self, category: &str, file_name: &str) -> Result<()> {
        let peers = self.state.list_peers().await?;
        for peer in peers {
            if peer.name == self.instance_name {
                continue;
            }
            self.state
                .enqueue(&peer.name, &self.instance_name, category, file_name)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication::kv::InMemoryKv;

    #[tokio::test]
    async fn enqueues_for_every_peer_except_self() {
        let kv = InMemoryKv::new();
        let state = Arc::new(ReplicationState::new("cluster1".to_string(), kv));
        state.register_peer("moscow", "10.0.0.1:9000").await.unwrap();
        state.register_peer("leningrad", "10.0.0.2:9000").await.unwrap();
        state.register_peer("kiev", "10.0.0.3:9000").await.unwrap();

        let hook = ReplicationHook::new("moscow".to_string(), state.clone());
        hook.before_creating_chunk("numbers", "moscow-chunk000000001").await.unwrap();

        use futures::StreamExt;
        let mut leningrad_tasks = state.watch("leningrad");
        let task = leningrad_tasks.next().await.unwrap();
        assert_eq!(task.owner, "moscow");

        let mut moscow_tasks = state.watch("moscow");
        let none = tokio::time::timeout(std::time::Duration::from_millis(50), moscow_tasks.next()).await;
        assert!(none.is_err(), "a node must never enqueue a task for itself");
    }
}
