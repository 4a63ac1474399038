use crate::config::SttConfig;
use std::path::Path;
use std::time::Duration;
use websift_core::{Error, Result, SpeechToText};

/// Speech-to-text against an OpenAI-compatible `/v1/audio/transcriptions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiStt {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl OpenAiStt {
    pub fn new(cfg: &SttConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("websift/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Request(format!("http client init failed: {e}")))?;
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            timeout: Duration::from_millis(cfg.timeout_ms),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint_transcriptions(&self) -> String {
        format!(
            "{}/v1/audio/transcriptions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl SpeechToText for OpenAiStt {
    async fn transcribe(&self, audio: &Path) -> Result<String> {
        let Some(key) = &self.api_key else {
            return Err(Error::NotConfigured(
                "missing WEBSIFT_STT_API_KEY (or OPENAI_API_KEY)".to_string(),
            ));
        };
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| Error::Transcription(format!("reading audio failed: {e}")))?;
        let file_name = audio
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("audio")
            .to_string();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| Error::Transcription(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "text")
            .part("file", part);

        let resp = self
            .client
            .post(self.endpoint_transcriptions())
            .timeout(self.timeout)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {key}"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Transcription(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Transcription(format!(
                "audio.transcriptions HTTP {status}"
            )));
        }
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Transcription(e.to_string()))?;
        Ok(text.trim().to_string())
    }
}
