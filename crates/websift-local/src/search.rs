use crate::config::Config;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::{Duration, Instant};
use websift_core::{
    Error, MediaLength, Result, SearchBackend, SearchQuery, SearchResult, SearchSummary,
    SummaryEntry, VideoSearchResult,
};

/// Characters of result content kept in a summary snippet.
pub const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct SearxngClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl SearxngClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("websift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Request(format!("http client init failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: Self::endpoint_search_for(&cfg.searxng_host),
            timeout: cfg.search_timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn endpoint_search_for(host: &str) -> String {
        // Accept either a base URL (…/), or a full /search endpoint.
        let mut base = host.trim().trim_end_matches('/').to_string();
        if !base.ends_with("/search") {
            base.push_str("/search");
        }
        base
    }

    async fn raw_search(&self, q: &SearchQuery) -> Result<RawSearxngResponse> {
        let t0 = Instant::now();
        let mut req = self
            .client
            .get(&self.endpoint)
            .query(&[("q", q.query.as_str()), ("format", "json")]);
        if !q.engines.is_empty() {
            req = req.query(&[("engines", q.engines.join(","))]);
        }
        if !q.categories.is_empty() {
            req = req.query(&[("categories", q.categories.join(","))]);
        }
        let resp = req.timeout(self.timeout).send().await.map_err(|e| {
            tracing::warn!(endpoint = %self.endpoint, error = %e, "searxng request failed");
            Error::Request(e.to_string())
        })?;
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(endpoint = %self.endpoint, %status, "searxng returned an error status");
            return Err(Error::Request(format!("searxng search HTTP {status}")));
        }
        let body = resp.text().await.map_err(|e| Error::Request(e.to_string()))?;
        let parsed: RawSearxngResponse =
            serde_json::from_str(&body).map_err(|e| Error::Parse(e.to_string()))?;

        if !parsed.unresponsive_engines.is_empty() {
            tracing::debug!(engines = ?parsed.unresponsive_engines, "searxng reported unresponsive engines");
        }
        tracing::debug!(
            query = %q.query,
            results = parsed.results.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "searxng search done"
        );
        Ok(parsed)
    }
}

fn max_from(q: &SearchQuery) -> usize {
    q.max_results.unwrap_or(10)
}

#[async_trait::async_trait]
impl SearchBackend for SearxngClient {
    fn name(&self) -> &'static str {
        "searxng"
    }

    async fn search_general(&self, q: &SearchQuery) -> Result<Vec<SearchResult>> {
        let raw = self.raw_search(q).await?;
        Ok(raw
            .results
            .into_iter()
            .take(max_from(q))
            .map(RawResult::into_general)
            .collect())
    }

    async fn search_videos(&self, q: &SearchQuery) -> Result<Vec<VideoSearchResult>> {
        let mut q = q.clone();
        q.engines = vec!["youtube".to_string()];
        q.categories = vec!["videos".to_string()];
        let raw = self.raw_search(&q).await?;
        Ok(raw
            .results
            .into_iter()
            .take(max_from(&q))
            .map(RawResult::into_video)
            .collect())
    }
}

/// First [`SNIPPET_CHARS`] characters of `content`, with `...` appended when cut.
pub fn snippet(content: Option<&str>) -> String {
    let Some(s) = content else {
        return String::new();
    };
    if s.chars().count() > SNIPPET_CHARS {
        let mut out: String = s.chars().take(SNIPPET_CHARS).collect();
        out.push_str("...");
        out
    } else {
        s.to_string()
    }
}

pub fn summarize(query: &str, results: &[SearchResult]) -> SearchSummary {
    SearchSummary {
        query: query.to_string(),
        total_results: results.len(),
        top_results: results
            .iter()
            .enumerate()
            .map(|(i, r)| SummaryEntry {
                rank: i + 1,
                title: r.title.clone(),
                url: r.url.clone(),
                snippet: snippet(r.content.as_deref()),
                category: r.category.clone(),
                author: r.author.clone(),
            })
            .collect(),
    }
}

// Raw wire shape. Everything except `results` is optional and wrongly-typed scalars become
// `None`; the typed projections above are all callers ever see.

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        _ => None,
    })
}

fn lenient_length<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<MediaLength>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().map(MediaLength::Seconds),
        Value::String(s) if !s.trim().is_empty() => Some(MediaLength::Text(s)),
        _ => None,
    })
}

fn lenient_vec<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<Value>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(v) => v,
        _ => Vec::new(),
    })
}

// Auxiliary arrays are absorbed for schema tolerance; only `results` is projected.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct RawSearxngResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    query: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    number_of_results: Option<f64>,
    results: Vec<RawResult>,
    #[serde(default, deserialize_with = "lenient_vec")]
    answers: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_vec")]
    corrections: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_vec")]
    infoboxes: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_vec")]
    suggestions: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_vec")]
    unresponsive_engines: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawResult {
    #[serde(default, deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    content: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    author: Option<String>,
    #[serde(default, rename = "publishedDate", deserialize_with = "lenient_string")]
    published_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_length")]
    length: Option<MediaLength>,
    #[serde(default, deserialize_with = "lenient_length")]
    duration: Option<MediaLength>,
    #[serde(default, deserialize_with = "lenient_string")]
    img_src: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    thumbnail: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

impl RawResult {
    fn into_general(self) -> SearchResult {
        SearchResult {
            title: self.title.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
            content: self.content,
            score: self.score,
            category: self.category,
            author: self.author,
        }
    }

    fn into_video(self) -> VideoSearchResult {
        VideoSearchResult {
            title: self.title.unwrap_or_default(),
            url: self.url.unwrap_or_default(),
            content: self.content,
            published_date: self.published_date,
            duration: self.length.or(self.duration),
            author: self.author,
            thumbnail: non_empty(self.img_src).or_else(|| non_empty(self.thumbnail)),
        }
    }
}
