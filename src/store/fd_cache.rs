//! Bounded cache of read-only file descriptors for `ChunkStore::read`.
//!
//! The original store grows this cache without bound; the spec calls a
//! bounded LRU "advised but not required". We bound it so a category with
//! many historical chunks does not exhaust descriptor limits.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::fs::File;
use tokio::sync::Mutex as AsyncMutex;

struct Entry {
    file: Arc<AsyncMutex<File>>,
    last_used: u64,
}

/// LRU-bounded map of chunk name -> open read-only file handle.
///
/// Guarded by its own lock, independent of `ChunkStore`'s write mutex, so
/// readers never contend with writers over descriptor bookkeeping.
pub struct FdCache {
    capacity: usize,
    entries: AsyncMutex<HashMap<String, Entry>>,
    clock: std::sync::atomic::AtomicU64,
}

impl FdCache {
    /// Create a cache holding at most `capacity` open descriptors.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: AsyncMutex::new(HashMap::new()),
            clock: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    /// Return a cached handle for `chunk`, opening and inserting one via
    /// `open` on a miss.
    pub async fn get_or_open<F, Fut>(&self, chunk: &str, open: F) -> std::io::Result<Arc<AsyncMutex<File>>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = std::io::Result<File>>,
    {
        let now = self.tick();
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(chunk) {
            entry.last_used = now;
            return Ok(entry.file.clone());
        }

        let file = Arc::new(AsyncMutex::new(open().await?));

        if entries.len() >= self.capacity {
            if let Some(victim) = entries.iter().min_by_key(|(_, e)| e.last_used).map(|(k, _)| k.clone()) {
                entries.remove(&victim);
            }
        }
        entries.insert(chunk.to_string(), Entry { file: file.clone(), last_used: now });
        Ok(file)
    }

    /// Evict a cached handle, e.g. after the chunk is acked/removed.
    pub async fn evict(&self, chunk: &str) {
        self.entries.lock().await.remove(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn evicts_least_recently_used_past_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FdCache::new(2);

        let mut paths = Vec::new();
        for name in ["a", "b", "c"] {
            let path = dir.path().join(name);
            let mut f = tokio::fs::File::create(&path).await.unwrap();
            f.write_all(b"hi\n").await.unwrap();
            paths.push(path);
        }

        cache.get_or_open("a", || File::open(paths[0].clone())).await.unwrap();
        cache.get_or_open("b", || File::open(paths[1].clone())).await.unwrap();
        // Touch "a" again so "b" becomes the least recently used.
        cache.get_or_open("a", || File::open(paths[0].clone())).await.unwrap();
        cache.get_or_open("c", || File::open(paths[2].clone())).await.unwrap();

        let entries = cache.entries.lock().await;
        assert_eq!(entries.len(), 2);
        assert!(entries.contains_key("a"));
        assert!(entries.contains_key("c"));
        assert!(!entries.contains_key("b"));
    }

    #[tokio::test]
    async fn evict_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a");
        tokio::fs::File::create(&path).await.unwrap();
        let cache = FdCache::new(4);
        cache.get_or_open("a", || File::open(path.clone())).await.unwrap();
        cache.evict("a").await;
        assert_eq!(cache.entries.lock().await.len(), 0);
    }
}
