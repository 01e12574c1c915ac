//! Lazily creates and caches one `ChunkStore` per category.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::Result;
use crate::store::{ChunkCreationHook, ChunkStore};

/// Maps category name -> `ChunkStore`, creating stores on first use.
pub struct StoreRegistry {
    dir: PathBuf,
    instance_name: String,
    hook: Arc<dyn ChunkCreationHook>,
    max_chunk_size: u64,
    read_block_size: usize,
    fd_cache_capacity: usize,
    stores: DashMap<String, Arc<ChunkStore>>,
}

impl StoreRegistry {
    /// Create a registry rooted at `dir`, where `dir/<category>/` holds
    /// that category's chunk files.
    pub fn new(
        dir: PathBuf,
        instance_name: String,
        hook: Arc<dyn ChunkCreationHook>,
        max_chunk_size: u64,
        read_block_size: usize,
        fd_cache_capacity: usize,
    ) -> Self {
        Self {
            dir,
            instance_name,
            hook,
            max_chunk_size,
            read_block_size,
            fd_cache_capacity,
            stores: DashMap::new(),
        }
    }

    /// Get or open the store for `category`.
    pub async fn get(&self, category: &str) -> Result<Arc<ChunkStore>> {
        crate::store::validate_category(category)?;

        if let Some(store) = self.stores.get(category) {
            return Ok(store.clone());
        }

        let store = Arc::new(
            ChunkStore::open(
                self.dir.join(category),
                category.to_string(),
                self.instance_name.clone(),
                self.hook.clone(),
                self.max_chunk_size,
                self.read_block_size,
                self.fd_cache_capacity,
            )
            .await?,
        );

        // Another task may have raced us to open the same category; keep
        // whichever entry landed first so callers never observe two
        // `ChunkStore`s for one category.
        let entry = self.stores.entry(category.to_string()).or_insert(store);
        Ok(entry.clone())
    }

    /// Names of every category opened so far.
    pub fn categories(&self) -> Vec<String> {
        self.stores.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NoopHook;

    #[tokio::test]
    async fn get_is_idempotent_per_category() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(
            dir.path().to_path_buf(),
            "moscow".to_string(),
            Arc::new(NoopHook),
            1024,
            1024,
            4,
        );

        let a = registry.get("numbers").await.unwrap();
        let b = registry.get("numbers").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.categories(), vec!["numbers".to_string()]);
    }

    #[tokio::test]
    async fn rejects_invalid_category() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(
            dir.path().to_path_buf(),
            "moscow".to_string(),
            Arc::new(NoopHook),
            1024,
            1024,
            4,
        );
        assert!(registry.get("../escape").await.is_err());
    }
}
