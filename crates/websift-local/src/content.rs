//! Fetch → normalize → paginate.
//!
//! Nothing is retained between calls: every request re-fetches and re-normalizes the page,
//! then cuts the requested window. Static pages therefore paginate consistently, but a page
//! whose content changes between fetches (dynamic or personalized markup) can shift under a
//! cursor obtained earlier.

use crate::{normalize, paginate};
use std::sync::Arc;
use std::time::Duration;
use websift_core::{FetchBackend, FetchError, FetchRequest, FetchResult};

pub struct ContentFetcher {
    backend: Arc<dyn FetchBackend>,
    chunk_size: usize,
    timeout: Duration,
}

impl ContentFetcher {
    pub fn new(backend: Arc<dyn FetchBackend>, chunk_size: usize, timeout: Duration) -> Self {
        Self {
            backend,
            chunk_size: chunk_size.max(1),
            timeout,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fetch `url` and return the window starting at `offset` characters.
    pub async fn fetch_page(&self, url: &str, offset: i64) -> Result<FetchResult, FetchError> {
        let mut req = FetchRequest::new(url);
        req.timeout_ms = Some(self.timeout.as_millis() as u64);
        let resp = self.backend.fetch(&req).await?;
        if resp.truncated {
            tracing::warn!(url, bytes = resp.bytes.len(), "body capped; document is partial");
        }
        let full = normalize::normalize_body(&resp.bytes, resp.content_type.as_deref())?;
        let out = paginate::page(&full, offset, self.chunk_size);
        tracing::debug!(
            url,
            offset = out.offset,
            content_length = out.content_length,
            total_length = out.total_length,
            "page window served"
        );
        Ok(out)
    }
}
