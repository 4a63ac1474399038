use std::time::Duration;
use websift_core::{FetchBackend, FetchError, FetchRequest, FetchResponse};

pub mod config;
pub mod content;
pub mod normalize;
pub mod paginate;
pub mod search;
pub mod shellout;
pub mod stt;
pub mod youtube;

pub use config::Config;

/// reqwest-backed [`FetchBackend`]: one shared client, no cache.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: u64,
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e.to_string())
    } else {
        FetchError::Unreachable(e.to_string())
    }
}

impl HttpFetcher {
    pub fn new(cfg: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(Duration::from_secs(10).min(cfg.fetch_timeout()))
            .timeout(cfg.fetch_timeout())
            .build()
            .map_err(|e| FetchError::Unreachable(format!("http client init failed: {e}")))?;
        Ok(Self {
            client,
            max_body_bytes: cfg.max_body_bytes,
        })
    }
}

#[async_trait::async_trait]
impl FetchBackend for HttpFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let mut rb = self.client.get(&req.url);
        if let Some(t) = req.timeout() {
            rb = rb.timeout(t);
        }

        let mut resp = rb.send().await.map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Unreachable(format!("HTTP {status} for {}", req.url)));
        }
        let final_url = resp.url().to_string();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let max_bytes = self.max_body_bytes as usize;
        let mut bytes: Vec<u8> = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = resp.chunk().await.map_err(classify)? {
            let room = max_bytes.saturating_sub(bytes.len());
            if chunk.len() > room {
                bytes.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        if truncated {
            tracing::debug!(url = %req.url, max_bytes, "response body capped");
        }

        Ok(FetchResponse {
            url: req.url.clone(),
            final_url,
            status: status.as_u16(),
            content_type,
            bytes,
            truncated,
        })
    }
}
