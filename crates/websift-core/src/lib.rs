use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Failure kinds of a single page fetch.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("could not access the page: {0}")]
    Unreachable(String),
    #[error("could not parse the page: {0}")]
    ParseFailed(String),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to fetch/transcribe YouTube content: {0}")]
    Transcription(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Overrides the backend's default timeout when set.
    pub timeout_ms: Option<u64>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> std::result::Result<FetchResponse, FetchError>;
}

/// One window over a normalized document.
///
/// Lengths and offsets count characters (Unicode scalar values), not bytes.
/// `next_offset` is always populated: it equals `offset + content_length`, which is
/// `total_length` once the end of the document has been reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    pub content: String,
    pub content_length: usize,
    pub is_truncated: bool,
    pub offset: usize,
    pub next_offset: Option<usize>,
    pub total_length: usize,
    pub success: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    /// Backend engine filter (e.g. `youtube`); empty means backend default.
    pub engines: Vec<String>,
    /// Backend category filter (e.g. `videos`); empty means backend default.
    pub categories: Vec<String>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            max_results: Some(max_results),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: Option<String>,
    pub score: Option<f64>,
    pub category: Option<String>,
    pub author: Option<String>,
}

/// Media length as reported by the backend: seconds, or a display string like `"3:32"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaLength {
    Seconds(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSearchResult {
    pub title: String,
    pub url: String,
    pub content: Option<String>,
    pub published_date: Option<String>,
    pub duration: Option<MediaLength>,
    pub author: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// 1-based position in backend order.
    pub rank: usize,
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub category: Option<String>,
    pub author: Option<String>,
}

/// Compact overview of a general search: short snippets instead of full result bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub query: String,
    pub total_results: usize,
    pub top_results: Vec<SummaryEntry>,
}

/// Search backend seam. Implementations own their raw wire format and only hand out the
/// typed projections below; result order is the backend's relevance order.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search_general(&self, q: &SearchQuery) -> Result<Vec<SearchResult>>;
    async fn search_videos(&self, q: &SearchQuery) -> Result<Vec<VideoSearchResult>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YoutubeTranscript {
    pub video_id: String,
    pub transcript: String,
    pub transcript_length: usize,
    pub success: bool,
}

/// Where video audio comes from (yt-dlp in production).
#[async_trait::async_trait]
pub trait AudioSource: Send + Sync {
    /// Resolve a bare id or any supported URL shape to a canonical video id.
    async fn resolve_id(&self, input: &str) -> Result<String>;
    /// Download the audio track of `video_id` into `dir`, returning the file written.
    async fn download_audio(&self, video_id: &str, dir: &Path) -> Result<PathBuf>;
}

#[async_trait::async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<String>;
}
