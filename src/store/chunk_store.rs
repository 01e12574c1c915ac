//! The on-disk chunked append log for one category, owned by one instance.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::framing::{truncate_at_last_newline, Framed};
use crate::store::fd_cache::FdCache;
use crate::store::{validate_chunk_name, ChunkInfo};

/// Extension point invoked before a new chunk file is created locally.
///
/// The replication hook implementation enqueues a download task for every
/// peer; returning an error aborts chunk creation, which keeps the
/// invariant that every local chunk has been offered to all known peers'
/// queues before any bytes are written to it.
#[async_trait]
pub trait ChunkCreationHook: Send + Sync {
    /// Called with the category and the file name about to be created.
    async fn before_creating_chunk(&self, category: &str, file_name: &str) -> Result<()>;
}

/// A hook that does nothing; useful for replicas and tests that only ever
/// call `write_direct`/`read`.
pub struct NoopHook;

#[async_trait]
impl ChunkCreationHook for NoopHook {
    async fn before_creating_chunk(&self, _category: &str, _file_name: &str) -> Result<()> {
        Ok(())
    }
}

struct WriteState {
    current_name: Option<String>,
    current_size: u64,
    next_index: u64,
    current_file: Option<File>,
}

/// Append-only chunked log for a single `(category, instance)` pair.
pub struct ChunkStore {
    dir: PathBuf,
    category: String,
    instance_name: String,
    hook: Arc<dyn ChunkCreationHook>,
    max_chunk_size: u64,
    read_block_size: usize,
    write_state: AsyncMutex<WriteState>,
    fd_cache: FdCache,
}

fn chunk_file_name(instance: &str, index: u64) -> String {
    format!("{instance}-chunk{index:09}")
}

/// Parse `<instance>-chunk<digits>`, returning the index if `name` belongs
/// to `instance`.
fn parse_index_for_instance(name: &str, instance: &str) -> Option<u64> {
    let prefix = format!("{instance}-chunk");
    name.strip_prefix(&prefix)?.parse().ok()
}

impl ChunkStore {
    /// Open (creating if needed) the chunk store directory for `category`
    /// and scan it for this instance's existing chunks to determine the
    /// next chunk index.
    pub async fn open(
        dir: PathBuf,
        category: String,
        instance_name: String,
        hook: Arc<dyn ChunkCreationHook>,
        max_chunk_size: u64,
        read_block_size: usize,
        fd_cache_capacity: usize,
    ) -> Result<Self> {
        fs::create_dir_all(&dir).await?;

        let mut max_index = 0u64;
        let mut read_dir = fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(idx) = parse_index_for_instance(name, &instance_name) {
                max_index = max_index.max(idx);
            }
        }

        debug!(category = %category, instance = %instance_name, next_index = max_index + 1, "opened chunk store");

        Ok(Self {
            dir,
            category,
            instance_name,
            hook,
            max_chunk_size,
            read_block_size,
            write_state: AsyncMutex::new(WriteState {
                current_name: None,
                current_size: 0,
                next_index: max_index + 1,
                current_file: None,
            }),
            fd_cache: FdCache::new(fd_cache_capacity),
        })
    }

    fn path_for(&self, chunk: &str) -> PathBuf {
        self.dir.join(chunk)
    }

    /// Append whole records to the category's current chunk, rolling over
    /// to a new chunk first if the write would exceed the size threshold.
    pub async fn append(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Err(Error::invalid_input("append requires a non-empty record"));
        }

        let mut state = self.write_state.lock().await;

        let needs_rollover = match &state.current_name {
            None => true,
            Some(_) => state.current_size + bytes.len() as u64 > self.max_chunk_size,
        };

        if needs_rollover {
            let next_name = chunk_file_name(&self.instance_name, state.next_index);
            self.hook.before_creating_chunk(&self.category, &next_name).await?;

            let path = self.path_for(&next_name);
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
                .map_err(|e| {
                    if e.kind() == std::io::ErrorKind::AlreadyExists {
                        Error::conflict(format!("chunk {next_name} already exists"))
                    } else {
                        Error::Io(e)
                    }
                })?;

            info!(category = %self.category, chunk = %next_name, "rolled over to new chunk");

            state.current_name = Some(next_name);
            state.current_size = 0;
            state.next_index += 1;
            state.current_file = Some(file);
        }

        let file = state
            .current_file
            .as_mut()
            .expect("current_file is set whenever current_name is set");
        file.write_all(bytes).await?;
        state.current_size += bytes.len() as u64;

        Ok(())
    }

    /// Read up to `max_size` bytes starting at `off`, truncated to end at
    /// the last newline within that window. Returns an empty vector if the
    /// window holds no whole record yet (the caller should retry with a
    /// larger `max_size` or wait for more data), never a partial record,
    /// and never more than `max_size` bytes.
    pub async fn read(&self, chunk: &str, off: u64, max_size: usize) -> Result<Vec<u8>> {
        validate_chunk_name(chunk)?;
        if max_size == 0 {
            return Ok(Vec::new());
        }

        let path = self.path_for(chunk);
        fs::metadata(&path)
            .await
            .map_err(|_| Error::not_found(format!("stat {chunk:?}")))?;

        let handle = self
            .fd_cache
            .get_or_open(chunk, || File::open(path.clone()))
            .await
            .map_err(|_| Error::not_found(format!("stat {chunk:?}")))?;

        let mut file = handle.lock().await;
        file.seek(SeekFrom::Start(off)).await?;

        let block_len = self.read_block_size.min(max_size);
        let mut buf = vec![0u8; block_len];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok(Vec::new());
        }
        buf.truncate(n);

        match truncate_at_last_newline(&buf) {
            Framed::Ok { head, .. } => Ok(head.to_vec()),
            Framed::NoNewline => Ok(Vec::new()),
        }
    }

    /// Append bytes verbatim to a (possibly remote-owned) chunk, creating
    /// it if absent. Used only by the replicator to reconstruct remote
    /// chunks; never rolls over and never consults the creation hook.
    pub async fn write_direct(&self, chunk: &str, bytes: &[u8]) -> Result<()> {
        validate_chunk_name(chunk)?;
        let path = self.path_for(chunk);
        let mut file = OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(bytes).await?;
        Ok(())
    }

    /// Current on-disk size of `chunk`, or `None` if it does not exist.
    pub async fn stat(&self, chunk: &str) -> Result<Option<u64>> {
        validate_chunk_name(chunk)?;
        let path = self.path_for(chunk);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// List every chunk file in the category directory, including those
    /// owned by other instances. A chunk is `complete` unless it is this
    /// instance's current write target.
    pub async fn list_chunks(&self) -> Result<Vec<ChunkInfo>> {
        let state = self.write_state.lock().await;
        let current_name = state.current_name.clone();
        drop(state);

        let mut out = Vec::new();
        let mut read_dir = fs::read_dir(&self.dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            out.push(ChunkInfo {
                name: name.to_string(),
                size: meta.len(),
                complete: Some(name) != current_name.as_deref(),
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    /// Delete an acked chunk. Rejects acking the current incomplete chunk.
    pub async fn ack(&self, chunk: &str, _size: u64) -> Result<()> {
        validate_chunk_name(chunk)?;

        let state = self.write_state.lock().await;
        if state.current_name.as_deref() == Some(chunk) {
            return Err(Error::conflict(format!("cannot ack current chunk {chunk:?}")));
        }
        drop(state);

        let path = self.path_for(chunk);
        fs::metadata(&path)
            .await
            .map_err(|_| Error::not_found(format!("stat {chunk:?}")))?;
        fs::remove_file(&path).await?;
        self.fd_cache.evict(chunk).await;

        debug!(category = %self.category, chunk = %chunk, "acked chunk");
        Ok(())
    }

    /// This store's category name.
    pub fn category(&self) -> &str {
        &self.category
    }
}
