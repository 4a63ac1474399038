//! YouTube transcripts: resolve id → download audio (yt-dlp) → speech-to-text.
//!
//! All intermediate files live in one temporary directory per call, removed on every exit
//! path. Transcriptions are rate-limited by a semaphore so long downloads cannot crowd out
//! search and fetch traffic.

use crate::config::YoutubeConfig;
use crate::shellout;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use websift_core::{AudioSource, Error, Result, SpeechToText, YoutubeTranscript};

pub fn is_youtube_host(host: &str) -> bool {
    let h = host.to_ascii_lowercase();
    h == "youtube.com"
        || h == "www.youtube.com"
        || h == "m.youtube.com"
        || h == "youtu.be"
        || h == "youtube-nocookie.com"
        || h.ends_with(".youtube.com")
        || h.ends_with(".youtube-nocookie.com")
}

/// `[A-Za-z0-9_-]{11}`
pub fn looks_like_video_id(s: &str) -> bool {
    s.len() == 11
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub fn youtube_video_id(u: &url::Url) -> Option<String> {
    let host = u.host_str()?;
    if !is_youtube_host(host) {
        return None;
    }

    // youtu.be/<id>
    if host.eq_ignore_ascii_case("youtu.be") {
        let seg = u.path_segments()?.next()?.trim();
        return looks_like_video_id(seg).then(|| seg.to_string());
    }

    // youtube.com/watch?v=<id>
    if u.path().starts_with("/watch") {
        return u
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| looks_like_video_id(v));
    }

    // youtube.com/{short,shorts,embed,live,v}/<id>
    let mut segs = u.path_segments()?;
    let a = segs.next().unwrap_or("");
    let b = segs.next().unwrap_or("").trim();
    if matches!(a, "short" | "shorts" | "embed" | "live" | "v") && looks_like_video_id(b) {
        return Some(b.to_string());
    }
    None
}

/// Resolve without shelling out: a bare id, or a recognized YouTube URL (scheme optional).
pub fn local_video_id(input: &str) -> Option<String> {
    let s = input.trim();
    if looks_like_video_id(s) {
        return Some(s.to_string());
    }
    let parsed = url::Url::parse(s)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| url::Url::parse(&format!("https://{s}")).ok())?;
    youtube_video_id(&parsed)
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// [`AudioSource`] backed by the `yt-dlp` CLI.
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: String,
    timeout: Duration,
}

impl YtDlp {
    pub fn new(cfg: &YoutubeConfig) -> Self {
        Self {
            bin: cfg.ytdlp_bin.clone(),
            timeout: Duration::from_millis(cfg.timeout_ms),
        }
    }

    pub fn is_available(&self) -> bool {
        shellout::has(&self.bin)
    }
}

async fn blocking<T: Send + 'static>(
    f: impl FnOnce() -> std::result::Result<T, &'static str> + Send + 'static,
) -> Result<T> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Transcription(format!("yt-dlp task failed: {e}")))?
        .map_err(|code| Error::Transcription(format!("yt-dlp: {code}")))
}

/// The downloaded audio for `video_id`: a finished, non-empty file named `<id>.<ext>`.
fn find_audio_file(dir: &Path, video_id: &str) -> Option<PathBuf> {
    let rd = std::fs::read_dir(dir).ok()?;
    let mut found: Vec<PathBuf> = rd
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_stem().and_then(|s| s.to_str()) == Some(video_id)
                && p.extension().and_then(|s| s.to_str()) != Some("part")
                && std::fs::metadata(p).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
        })
        .collect();
    found.sort();
    found.into_iter().next()
}

#[async_trait::async_trait]
impl AudioSource for YtDlp {
    async fn resolve_id(&self, input: &str) -> Result<String> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--print")
            .arg("id")
            .arg("--skip-download")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--")
            .arg(input);
        let timeout = self.timeout;
        let out = blocking(move || shellout::run_stdout_bounded(cmd, timeout, 4096)).await?;
        let text = String::from_utf8_lossy(&out);
        let id = text.lines().next().unwrap_or("").trim();
        if id.is_empty() {
            return Err(Error::Transcription("yt-dlp printed no video id".to_string()));
        }
        Ok(id.to_string())
    }

    async fn download_audio(&self, video_id: &str, dir: &Path) -> Result<PathBuf> {
        let out_tmpl = dir.join("%(id)s.%(ext)s");
        let mut cmd = Command::new(&self.bin);
        cmd.arg("-f")
            .arg("bestaudio")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--quiet")
            .arg("--no-progress")
            .arg("-o")
            .arg(out_tmpl)
            .arg(watch_url(video_id));
        let timeout = self.timeout;
        blocking(move || shellout::run_bounded(cmd, timeout)).await?;
        find_audio_file(dir, video_id)
            .ok_or_else(|| Error::Transcription("yt-dlp produced no audio file".to_string()))
    }
}

pub struct YoutubeTranscriber {
    source: Arc<dyn AudioSource>,
    stt: Arc<dyn SpeechToText>,
    permits: Arc<Semaphore>,
}

impl YoutubeTranscriber {
    pub fn new(
        source: Arc<dyn AudioSource>,
        stt: Arc<dyn SpeechToText>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            source,
            stt,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Transcribe the video named by `input` (bare id or URL).
    ///
    /// Failures collapse into [`Error::Transcription`], except a missing speech-to-text
    /// credential, which stays [`Error::NotConfigured`].
    pub async fn transcribe(&self, input: &str) -> Result<YoutubeTranscript> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::Validation("video reference must not be empty".to_string()));
        }
        // Bare ids may start with '-'; anything else that does would read as a yt-dlp option.
        if input.starts_with('-') && !looks_like_video_id(input) {
            return Err(Error::Validation(
                "video reference must be a YouTube URL or video id".to_string(),
            ));
        }
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::Transcription(e.to_string()))?;

        let dir = tempfile::Builder::new()
            .prefix("websift-yt-")
            .tempdir()
            .map_err(|e| Error::Transcription(format!("tempdir failed: {e}")))?;

        match self.run(input, dir.path()).await {
            Ok(t) => {
                if let Err(e) = dir.close() {
                    tracing::warn!(error = %e, "failed to remove transcription tempdir");
                }
                Ok(t)
            }
            Err(e) => {
                tracing::warn!(video = input, error = %e, "youtube transcription failed");
                Err(match e {
                    Error::NotConfigured(_) | Error::Transcription(_) => e,
                    other => Error::Transcription(other.to_string()),
                })
            }
        }
    }

    async fn run(&self, input: &str, dir: &Path) -> Result<YoutubeTranscript> {
        let video_id = match local_video_id(input) {
            Some(id) => id,
            None => self.source.resolve_id(input).await?,
        };
        tracing::debug!(video_id = %video_id, "downloading audio");
        let audio = self.source.download_audio(&video_id, dir).await?;
        let len = tokio::fs::metadata(&audio)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if len == 0 {
            return Err(Error::Transcription("downloaded audio is empty".to_string()));
        }
        let transcript = self.stt.transcribe(&audio).await?;
        Ok(YoutubeTranscript {
            transcript_length: transcript.chars().count(),
            video_id,
            transcript,
            success: true,
        })
    }
}
