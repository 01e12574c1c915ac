//! Translates the four wire-protocol verbs into `StoreRegistry` calls.
//! Holds no state of its own beyond the registry it wraps.

use std::sync::Arc;

use crate::error::Result;
use crate::store::{ChunkInfo, StoreRegistry};

/// Thin facade over a `StoreRegistry` matching the wire protocol 1:1.
pub struct Adapter {
    registry: Arc<StoreRegistry>,
}

impl Adapter {
    /// Wrap `registry`.
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self { registry }
    }

    /// Append a whole record to `category`'s current chunk.
    pub async fn write(&self, category: &str, bytes: &[u8]) -> Result<()> {
        self.registry.get(category).await?.append(bytes).await
    }

    /// Read up to `max_size` bytes of `chunk` starting at `off`.
    pub async fn read(&self, category: &str, chunk: &str, off: u64, max_size: usize) -> Result<Vec<u8>> {
        self.registry.get(category).await?.read(chunk, off, max_size).await
    }

    /// List every chunk in `category`.
    pub async fn list_chunks(&self, category: &str) -> Result<Vec<ChunkInfo>> {
        self.registry.get(category).await?.list_chunks().await
    }

    /// Ack (delete) a sealed chunk.
    pub async fn ack(&self, category: &str, chunk: &str, size: u64) -> Result<()> {
        self.registry.get(category).await?.ack(chunk, size).await
    }
}
