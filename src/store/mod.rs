//! On-disk chunked append log.
//!
//! `ChunkStore` owns one category's sequence of chunk files for this
//! instance; `StoreRegistry` lazily maps category names to stores.

mod chunk_store;
mod fd_cache;
mod registry;

pub use chunk_store::{ChunkCreationHook, ChunkStore, NoopHook};
pub use registry::StoreRegistry;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Directory entry for a single chunk, as returned by `list_chunks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    /// Chunk file name, `<instance>-chunk<zero-padded-index>`.
    pub name: String,
    /// Current size on disk, in bytes.
    pub size: u64,
    /// True iff this chunk is no longer the write target of its owner.
    pub complete: bool,
}

/// Validate a category name: non-empty, no path separators, no `.`
/// (which rules out `.` and `..` traversal as a side effect).
pub fn validate_category(category: &str) -> Result<()> {
    if category.is_empty() {
        return Err(Error::invalid_input("category name must not be empty"));
    }
    if category.contains('/') || category.contains('\\') || category.contains('.') {
        return Err(Error::invalid_input(format!(
            "category name {category:?} must not contain '/', '\\\\' or '.'"
        )));
    }
    Ok(())
}

/// Validate that a chunk name contains no path separators, so it cannot
/// be used to escape the category directory via `read`/`ack`.
pub fn validate_chunk_name(chunk: &str) -> Result<()> {
    if chunk.is_empty() {
        return Err(Error::invalid_input("chunk name must not be empty"));
    }
    if chunk.contains('/') || chunk.contains('\\') || chunk.contains("..") {
        return Err(Error::invalid_input(format!("unsafe chunk name {chunk:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_unsafe_categories() {
        assert!(validate_category("").is_err());
        assert!(validate_category("a/b").is_err());
        assert!(validate_category("..").is_err());
        assert!(validate_category("a.b").is_err());
        assert!(validate_category("numbers").is_ok());
    }

    #[test]
    fn rejects_unsafe_chunk_names() {
        assert!(validate_chunk_name("").is_err());
        assert!(validate_chunk_name("../../etc/passwd").is_err());
        assert!(validate_chunk_name("moscow-chunk000000001").is_ok());
    }
}
