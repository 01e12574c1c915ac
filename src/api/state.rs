//! Shared state handed to every HTTP handler.

use std::sync::Arc;

use crate::replication::ReplicationState;
use crate::store::StoreRegistry;

/// Everything a request handler needs: the local chunk stores and the
/// replication coordinator, plus this instance's own identity for
/// diagnostics.
#[derive(Clone)]
pub struct AppState {
    /// This instance's name, as embedded in chunk file names.
    pub instance_name: String,
    /// Local category stores.
    pub registry: Arc<StoreRegistry>,
    /// Peer registry / replication task queue.
    pub replication_state: Arc<ReplicationState>,
}
