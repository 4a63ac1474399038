//! Process-wide configuration, read once at startup.
//!
//! Every knob comes from the environment; empty values count as unset. The resulting
//! [`Config`] is immutable and is handed to each component by reference.

use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_SEARXNG_HOST: &str = "http://localhost:8080";
pub const DEFAULT_CHUNK_SIZE: usize = 30_000;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const DEFAULT_STT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_STT_MODEL: &str = "whisper-1";

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env(key)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env(key)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Result-count ceilings and defaults per tool.
#[derive(Debug, Clone, Serialize)]
pub struct Limits {
    pub max_general_results: usize,
    pub max_video_results: usize,
    pub max_summary_results: usize,
    pub default_general_results: usize,
    pub default_video_results: usize,
    pub default_summary_results: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_general_results: 25,
            max_video_results: 20,
            max_summary_results: 15,
            default_general_results: 10,
            default_video_results: 10,
            default_summary_results: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SttConfig {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct YoutubeConfig {
    pub ytdlp_bin: String,
    pub timeout_ms: u64,
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub searxng_host: String,
    pub search_timeout_ms: u64,
    pub fetch_timeout_ms: u64,
    pub chunk_size: usize,
    pub max_body_bytes: u64,
    pub user_agent: String,
    pub limits: Limits,
    pub stt: SttConfig,
    pub youtube: YoutubeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            searxng_host: DEFAULT_SEARXNG_HOST.to_string(),
            search_timeout_ms: 10_000,
            fetch_timeout_ms: 30_000,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_body_bytes: 10 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            limits: Limits::default(),
            stt: SttConfig {
                base_url: DEFAULT_STT_BASE_URL.to_string(),
                model: DEFAULT_STT_MODEL.to_string(),
                api_key: None,
                timeout_ms: 300_000,
            },
            youtube: YoutubeConfig {
                ytdlp_bin: "yt-dlp".to_string(),
                timeout_ms: 600_000,
                max_concurrency: 2,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            searxng_host: env("WEBSIFT_SEARXNG_HOST")
                .or_else(|| env("SEARXNG_HOST"))
                .unwrap_or(d.searxng_host),
            search_timeout_ms: env_u64("WEBSIFT_SEARCH_TIMEOUT_MS", d.search_timeout_ms)
                .clamp(100, 120_000),
            fetch_timeout_ms: env_u64("WEBSIFT_FETCH_TIMEOUT_MS", d.fetch_timeout_ms)
                .clamp(100, 300_000),
            // A zero chunk would never advance the cursor.
            chunk_size: env_usize("WEBSIFT_CHUNK_SIZE", d.chunk_size).max(1),
            max_body_bytes: env_u64("WEBSIFT_MAX_BODY_BYTES", d.max_body_bytes).max(1024),
            user_agent: env("WEBSIFT_USER_AGENT").unwrap_or(d.user_agent),
            limits: d.limits,
            stt: SttConfig {
                base_url: env("WEBSIFT_STT_BASE_URL").unwrap_or(d.stt.base_url),
                model: env("WEBSIFT_STT_MODEL").unwrap_or(d.stt.model),
                api_key: env("WEBSIFT_STT_API_KEY").or_else(|| env("OPENAI_API_KEY")),
                timeout_ms: env_u64("WEBSIFT_STT_TIMEOUT_MS", d.stt.timeout_ms),
            },
            youtube: YoutubeConfig {
                ytdlp_bin: env("WEBSIFT_YTDLP_BIN").unwrap_or(d.youtube.ytdlp_bin),
                timeout_ms: env_u64("WEBSIFT_YOUTUBE_TIMEOUT_MS", d.youtube.timeout_ms),
                max_concurrency: env_usize(
                    "WEBSIFT_YOUTUBE_CONCURRENCY",
                    d.youtube.max_concurrency,
                )
                .clamp(1, 16),
            },
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }
}

/// Apply `KEY=VALUE` lines from `path` to the process environment.
///
/// Blank lines and `#` comments are skipped. Variables already present in the environment
/// are never overridden. Returns how many variables were set.
pub fn load_env_file(path: &std::path::Path) -> std::io::Result<usize> {
    let txt = std::fs::read_to_string(path)?;
    let mut applied = 0usize;
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
            applied += 1;
        }
    }
    Ok(applied)
}
