use rmcp::{
    handler::server::router::tool::ToolRouter as RmcpToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use websift_core::{FetchBackend, SearchBackend, SearchQuery};
use websift_local::content::ContentFetcher;
use websift_local::stt::OpenAiStt;
use websift_local::youtube::{YoutubeTranscriber, YtDlp};
use websift_local::{search, Config, HttpFetcher};

pub(crate) const SCHEMA_VERSION: u64 = 1;
pub(crate) const MAX_QUERY_CHARS: usize = 500;

mod envelope;
use envelope::*;

fn tool_result(payload: serde_json::Value) -> CallToolResult {
    // Structured content for machine consumers, plus the same JSON as text for clients that
    // only read `content[0].text`.
    let mut r = CallToolResult::structured(payload.clone());
    r.content = vec![Content::text(payload.to_string())];
    r
}

fn ok_result(kind: &str, t0: Instant, mut payload: serde_json::Value) -> CallToolResult {
    payload["ok"] = serde_json::json!(true);
    add_envelope_fields(&mut payload, kind, t0.elapsed().as_millis());
    tool_result(payload)
}

fn err_result(
    kind: &str,
    t0: Instant,
    code: ErrorCode,
    message: impl ToString,
    mut payload: serde_json::Value,
) -> CallToolResult {
    payload["ok"] = serde_json::json!(false);
    payload["error"] = error_obj(code, message, code.hint());
    add_envelope_fields(&mut payload, kind, t0.elapsed().as_millis());
    tool_result(payload)
}

fn validate_query(q: Option<&str>) -> Result<String, String> {
    let q = q.unwrap_or("").trim();
    if q.is_empty() {
        return Err("query must be non-empty".to_string());
    }
    let n = q.chars().count();
    if n > MAX_QUERY_CHARS {
        return Err(format!(
            "query is {n} characters; the limit is {MAX_QUERY_CHARS}"
        ));
    }
    Ok(q.to_string())
}

fn validate_url(u: Option<&str>) -> Result<String, String> {
    let u = u.unwrap_or("").trim();
    if u.is_empty() {
        return Err("url must be non-empty".to_string());
    }
    let parsed = url::Url::parse(u).map_err(|e| format!("url is not absolute: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("unsupported url scheme: {}", parsed.scheme()));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err("url has no host".to_string());
    }
    Ok(u.to_string())
}

/// `None` → `default`; anything else clamped into `[1, max]`.
fn clamp_count(requested: Option<i64>, default: usize, max: usize) -> usize {
    match requested {
        None => default,
        Some(n) => usize::try_from(n.max(1)).unwrap_or(max).min(max),
    }
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
pub(crate) struct SearchArgs {
    /// Search query (1-500 characters).
    #[serde(default)]
    pub(crate) query: Option<String>,
    /// Number of results. Out-of-range values are clamped to the tool's ceiling (or 1).
    #[serde(default)]
    pub(crate) max_results: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
pub(crate) struct FetchContentArgs {
    /// Absolute http(s) URL of the page.
    #[serde(default)]
    pub(crate) url: Option<String>,
    /// Character offset to start from (default 0). Pass the previous call's `next_offset`
    /// to continue.
    #[serde(default)]
    pub(crate) offset: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
pub(crate) struct YoutubeArgs {
    /// YouTube URL (watch, youtu.be, shorts, embed) or bare 11-character video id.
    #[serde(default)]
    pub(crate) video: Option<String>,
}

#[derive(Clone)]
pub(crate) struct WebsiftMcp {
    tool_router: RmcpToolRouter<Self>,
    config: Arc<Config>,
    content: Arc<ContentFetcher>,
    search: Arc<dyn SearchBackend>,
    youtube: Arc<YoutubeTranscriber>,
}

#[tool_router]
impl WebsiftMcp {
    pub(crate) fn from_config(config: Config) -> anyhow::Result<Self> {
        let fetcher: Arc<dyn FetchBackend> = Arc::new(HttpFetcher::new(&config)?);
        let content = ContentFetcher::new(fetcher, config.chunk_size, config.fetch_timeout());
        let searxng = search::SearxngClient::new(&config)?;
        let stt = OpenAiStt::new(&config.stt)?;
        let youtube = YoutubeTranscriber::new(
            Arc::new(YtDlp::new(&config.youtube)),
            Arc::new(stt),
            config.youtube.max_concurrency,
        );
        Ok(Self::with_parts(
            config,
            Arc::new(content),
            Arc::new(searxng),
            Arc::new(youtube),
        ))
    }

    pub(crate) fn with_parts(
        config: Config,
        content: Arc<ContentFetcher>,
        search: Arc<dyn SearchBackend>,
        youtube: Arc<YoutubeTranscriber>,
    ) -> Self {
        Self {
            tool_router: Self::tool_router(),
            config: Arc::new(config),
            content,
            search,
            youtube,
        }
    }

    #[tool(
        description = "Search the web via SearXNG. Returns up to max_results (1-25, default 10) results with title, url, content and score, in backend relevance order."
    )]
    async fn search(
        &self,
        params: Parameters<Option<SearchArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let kind = "search";
        let t0 = Instant::now();
        let args = params.0.unwrap_or_default();
        let query = match validate_query(args.query.as_deref()) {
            Ok(q) => q,
            Err(m) => {
                return Ok(err_result(kind, t0, ErrorCode::InvalidParams, m, serde_json::json!({})))
            }
        };
        let limits = &self.config.limits;
        let max_results = clamp_count(
            args.max_results,
            limits.default_general_results,
            limits.max_general_results,
        );
        let request = serde_json::json!({ "query": query, "max_results": max_results });

        match self
            .search
            .search_general(&SearchQuery::new(query.clone(), max_results))
            .await
        {
            Ok(rs) => {
                let results: Vec<serde_json::Value> = rs
                    .into_iter()
                    .map(|r| {
                        serde_json::json!({
                            "title": r.title,
                            "url": r.url,
                            "content": r.content.unwrap_or_default(),
                            "score": r.score.unwrap_or(0.0),
                        })
                    })
                    .collect();
                Ok(ok_result(
                    kind,
                    t0,
                    serde_json::json!({
                        "query": query,
                        "backend": self.search.name(),
                        "count": results.len(),
                        "results": results,
                        "request": request,
                    }),
                ))
            }
            Err(e) => {
                tracing::warn!(kind, error = %e, "search failed");
                Ok(err_result(
                    kind,
                    t0,
                    ErrorCode::for_error(&e),
                    e,
                    serde_json::json!({ "request": request }),
                ))
            }
        }
    }

    #[tool(
        description = "Search for videos (YouTube engine, videos category). Returns up to max_results (1-20, default 10) with url, title, author, content, length, published_date and thumbnail."
    )]
    async fn search_videos(
        &self,
        params: Parameters<Option<SearchArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let kind = "search_videos";
        let t0 = Instant::now();
        let args = params.0.unwrap_or_default();
        let query = match validate_query(args.query.as_deref()) {
            Ok(q) => q,
            Err(m) => {
                return Ok(err_result(kind, t0, ErrorCode::InvalidParams, m, serde_json::json!({})))
            }
        };
        let limits = &self.config.limits;
        let max_results = clamp_count(
            args.max_results,
            limits.default_video_results,
            limits.max_video_results,
        );
        let request = serde_json::json!({ "query": query, "max_results": max_results });

        match self
            .search
            .search_videos(&SearchQuery::new(query.clone(), max_results))
            .await
        {
            Ok(vs) => {
                let results: Vec<serde_json::Value> = vs
                    .into_iter()
                    .map(|v| {
                        serde_json::json!({
                            "url": v.url,
                            "title": v.title,
                            "author": v.author,
                            "content": v.content,
                            "length": v.duration,
                            "published_date": v.published_date,
                            "thumbnail": v.thumbnail,
                        })
                    })
                    .collect();
                Ok(ok_result(
                    kind,
                    t0,
                    serde_json::json!({
                        "query": query,
                        "count": results.len(),
                        "results": results,
                        "request": request,
                    }),
                ))
            }
            Err(e) => {
                tracing::warn!(kind, error = %e, "video search failed");
                Ok(err_result(
                    kind,
                    t0,
                    ErrorCode::for_error(&e),
                    e,
                    serde_json::json!({ "request": request }),
                ))
            }
        }
    }

    #[tool(
        description = "Fetch a web page and return its readable text in windows of a fixed number of characters. Start at offset 0; while is_truncated is true, call again with offset=next_offset. Every call re-fetches the page, so pages that change between calls may shift under the cursor."
    )]
    async fn fetch_content(
        &self,
        params: Parameters<Option<FetchContentArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let kind = "fetch_content";
        let t0 = Instant::now();
        let args = params.0.unwrap_or_default();
        let offset = args.offset.unwrap_or(0);
        let url = match validate_url(args.url.as_deref()) {
            Ok(u) => u,
            Err(m) => {
                return Ok(err_result(
                    kind,
                    t0,
                    ErrorCode::InvalidParams,
                    m,
                    serde_json::json!({ "url": args.url, "success": false }),
                ))
            }
        };

        match self.content.fetch_page(&url, offset).await {
            Ok(page) => {
                let mut payload = serde_json::to_value(&page)
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                payload["url"] = serde_json::json!(url);
                payload["chunk_size"] = serde_json::json!(self.content.chunk_size());
                Ok(ok_result(kind, t0, payload))
            }
            Err(e) => {
                tracing::warn!(kind, url = %url, error = %e, "fetch failed");
                Ok(err_result(
                    kind,
                    t0,
                    ErrorCode::for_fetch_error(&e),
                    e,
                    serde_json::json!({ "url": url, "offset": offset, "success": false }),
                ))
            }
        }
    }

    #[tool(
        description = "Search and return a compact overview: rank, title, url, a 200-character snippet, category and author for up to max_results (1-15, default 5) results."
    )]
    async fn search_summary(
        &self,
        params: Parameters<Option<SearchArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let kind = "search_summary";
        let t0 = Instant::now();
        let args = params.0.unwrap_or_default();
        let query = match validate_query(args.query.as_deref()) {
            Ok(q) => q,
            Err(m) => {
                return Ok(err_result(kind, t0, ErrorCode::InvalidParams, m, serde_json::json!({})))
            }
        };
        let limits = &self.config.limits;
        let max_results = clamp_count(
            args.max_results,
            limits.default_summary_results,
            limits.max_summary_results,
        );

        match self
            .search
            .search_general(&SearchQuery::new(query.clone(), max_results))
            .await
        {
            Ok(rs) => {
                let summary = search::summarize(&query, &rs);
                let payload = serde_json::to_value(&summary)
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                Ok(ok_result(kind, t0, payload))
            }
            Err(e) => {
                tracing::warn!(kind, error = %e, "search failed");
                Ok(err_result(
                    kind,
                    t0,
                    ErrorCode::for_error(&e),
                    e,
                    serde_json::json!({ "query": query }),
                ))
            }
        }
    }

    #[tool(
        description = "Transcribe a YouTube video: downloads the audio with yt-dlp and runs speech-to-text. Accepts a watch/youtu.be/shorts/embed URL or a bare video id. Slow; calls are queued when several run at once."
    )]
    async fn fetch_youtube_content(
        &self,
        params: Parameters<Option<YoutubeArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let kind = "fetch_youtube_content";
        let t0 = Instant::now();
        let args = params.0.unwrap_or_default();
        let video = args.video.unwrap_or_default();
        if video.trim().is_empty() {
            return Ok(err_result(
                kind,
                t0,
                ErrorCode::InvalidParams,
                "video must be non-empty",
                serde_json::json!({ "success": false }),
            ));
        }

        match self.youtube.transcribe(&video).await {
            Ok(t) => {
                let payload = serde_json::to_value(&t)
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                Ok(ok_result(kind, t0, payload))
            }
            Err(e) => Ok(err_result(
                kind,
                t0,
                ErrorCode::for_error(&e),
                e,
                serde_json::json!({ "video": video, "success": false }),
            )),
        }
    }
}

#[tool_handler]
impl rmcp::ServerHandler for WebsiftMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Web search (SearXNG), paginated page text, and YouTube transcripts. Every tool returns one JSON object with ok/kind/schema_version; failures carry error.code and error.hint."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "websift".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

pub(crate) async fn serve_stdio(svc: WebsiftMcp) -> anyhow::Result<()> {
    tracing::info!("serving MCP over stdio");
    let running = svc.serve(stdio()).await?;
    // Keep the stdio server alive until the client closes.
    running.waiting().await?;
    Ok(())
}

pub(crate) async fn serve_http(svc: WebsiftMcp, host: &str, port: u16) -> anyhow::Result<()> {
    use rmcp::transport::streamable_http_server::{
        session::local::LocalSessionManager, tower::StreamableHttpService,
    };
    use rmcp::transport::StreamableHttpServerConfig;

    let service = StreamableHttpService::new(
        move || Ok(svc.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );
    let router = axum::Router::new().nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {host}:{port}: {e}"))?;
    tracing::info!(addr = %listener.local_addr()?, "serving MCP over streamable HTTP at /mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}
