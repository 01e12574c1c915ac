//! Cross-instance replication: a coordinator-backed task queue, a hook
//! that enqueues work as chunks are created, and the worker that drains
//! it.

mod hook;
mod kv;
mod replicator;
mod state;

pub use hook::ReplicationHook;
pub use kv::{InMemoryKv, KvEvent, KvStore};
pub use replicator::Replicator;
pub use state::{Peer, ReplicationState, ReplicationTask};
