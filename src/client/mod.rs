//! Pull-based consumer client: holds a `{chunk, offset}` cursor over one
//! category and advances it against whichever replica answers fastest.

use std::time::Duration;

use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::ChunkInfo;

/// Outcome of one `PullClient::process` call.
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A non-empty record batch was delivered to the callback.
    Delivered,
    /// No new data is available right now; the category is empty or the
    /// current chunk hasn't grown past the cursor.
    Eof,
    /// Nothing was delivered but the caller should call `process` again
    /// immediately (the window held no whole record, or a chunk was just
    /// acked and a new one needs to be selected).
    Retry,
}

/// Consumes one category by pulling from a fixed set of server addresses.
pub struct PullClient {
    addrs: Vec<String>,
    category: String,
    http: reqwest::Client,
    cur_chunk: Option<ChunkInfo>,
    off: u64,
}

impl PullClient {
    /// Build a client over `category`, reading from any of `addrs`.
    pub fn new(addrs: Vec<String>, category: String, http_timeout: Duration) -> Result<Self> {
        if addrs.is_empty() {
            return Err(Error::invalid_input("PullClient requires at least one server address"));
        }
        let http = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| Error::transient(format!("failed to build pull client http client: {e}")))?;

        Ok(Self { addrs, category, http, cur_chunk: None, off: 0 })
    }

    fn pick_addr(&self) -> &str {
        self.addrs
            .choose(&mut rand::thread_rng())
            .expect("addrs is non-empty by construction")
    }

    async fn list_chunks(&self, addr: &str) -> Result<Vec<ChunkInfo>> {
        let url = format!("http://{addr}/listChunks");
        let resp = self
            .http
            .get(&url)
            .query(&[("category", &self.category)])
            .send()
            .await
            .map_err(|e| Error::transient(format!("listChunks request to {addr} failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::transient(format!("listChunks on {addr} returned {}", resp.status())));
        }
        resp.json()
            .await
            .map_err(|e| Error::transient(format!("malformed listChunks response from {addr}: {e}")))
    }

    async fn read(&self, addr: &str, chunk: &str, off: u64, max_size: usize) -> Result<Vec<u8>> {
        let url = format!("http://{addr}/read");
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("category", self.category.clone()),
                ("chunk", chunk.to_string()),
                ("off", off.to_string()),
                ("maxSize", max_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::transient(format!("read request to {addr} failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::transient(format!("read on {addr} returned {}", resp.status())));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::transient(format!("failed reading body from {addr}: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn ack(&self, addr: &str, chunk: &str, size: u64) -> Result<()> {
        let url = format!("http://{addr}/ack");
        let resp = self
            .http
            .get(&url)
            .query(&[("category", self.category.clone()), ("chunk", chunk.to_string()), ("size", size.to_string())])
            .send()
            .await
            .map_err(|e| Error::transient(format!("ack request to {addr} failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::transient(format!("ack on {addr} returned {}", resp.status())));
        }
        Ok(())
    }

    /// Select the next chunk to read: the first complete one, falling
    /// back to the first chunk listed, so completed chunks are always
    /// preferred and can eventually be acked.
    fn select(chunks: Vec<ChunkInfo>) -> Option<ChunkInfo> {
        if chunks.is_empty() {
            return None;
        }
        chunks
            .iter()
            .find(|c| c.complete)
            .cloned()
            .or_else(|| chunks.into_iter().next())
    }

    /// Drive one unit of consumption: list/select a chunk if needed, read
    /// the next window, and hand any bytes to `handle`. `off` only
    /// advances if `handle` succeeds, so a failing callback causes the
    /// same bytes to be redelivered on the next call.
    pub async fn process<F, Fut>(&mut self, buf_size: usize, mut handle: F) -> Result<ProcessOutcome>
    where
        F: FnMut(Vec<u8>) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let addr = self.pick_addr().to_string();

        if self.cur_chunk.is_none() {
            let chunks = self.list_chunks(&addr).await?;
            self.cur_chunk = match Self::select(chunks) {
                Some(c) => Some(c),
                None => return Ok(ProcessOutcome::Eof),
            };
            self.off = 0;
        }

        let chunk = self.cur_chunk.clone().expect("just ensured cur_chunk is Some");
        let body = self.read(&addr, &chunk.name, self.off, buf_size).await?;

        if !body.is_empty() {
            let len = body.len() as u64;
            handle(body).await?;
            self.off += len;
            return Ok(ProcessOutcome::Delivered);
        }

        // Empty response: re-list to get a fresh view of this chunk's
        // completeness/size before deciding what it means.
        let refreshed = self
            .list_chunks(&addr)
            .await?
            .into_iter()
            .find(|c| c.name == chunk.name);

        let Some(refreshed) = refreshed else {
            // The chunk vanished (acked by someone else racing us); drop
            // the cursor and let the next call pick a fresh target.
            self.cur_chunk = None;
            self.off = 0;
            return Ok(ProcessOutcome::Retry);
        };

        if !refreshed.complete {
            self.cur_chunk = Some(refreshed.clone());
            return if self.off < refreshed.size {
                // The window held no whole record yet; the caller is
                // expected to retry, possibly with a larger buffer.
                Ok(ProcessOutcome::Retry)
            } else {
                Ok(ProcessOutcome::Eof)
            };
        }

        if self.off < refreshed.size {
            // Sealed but not fully drained: the window held no whole
            // record yet. Keep the cursor and let the caller retry with
            // a larger buffer rather than acking data we never delivered.
            self.cur_chunk = Some(refreshed);
            return Ok(ProcessOutcome::Retry);
        }

        // Complete and fully drained: ack it and reset the cursor.
        debug!(chunk = %chunk.name, off = self.off, "acking fully consumed chunk");
        self.ack(&addr, &chunk.name, self.off).await?;
        self.cur_chunk = None;
        self.off = 0;
        Ok(ProcessOutcome::Retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_prefers_complete_chunk() {
        let chunks = vec![
            ChunkInfo { name: "a".into(), size: 10, complete: false },
            ChunkInfo { name: "b".into(), size: 20, complete: true },
        ];
        let selected = PullClient::select(chunks).unwrap();
        assert_eq!(selected.name, "b");
    }

    #[test]
    fn select_falls_back_to_first_when_none_complete() {
        let chunks = vec![
            ChunkInfo { name: "a".into(), size: 10, complete: false },
            ChunkInfo { name: "b".into(), size: 20, complete: false },
        ];
        let selected = PullClient::select(chunks).unwrap();
        assert_eq!(selected.name, "a");
    }

    #[test]
    fn select_on_empty_list_is_none() {
        assert!(PullClient::select(Vec::new()).is_none());
    }

    #[test]
    fn rejects_empty_addr_list() {
        assert!(PullClient::new(Vec::new(), "numbers".to_string(), Duration::from_secs(1)).is_err());
    }
}
