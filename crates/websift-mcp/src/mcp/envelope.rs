use websift_core::{Error, FetchError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidParams,
    FetchTimeout,
    FetchFailed,
    SearchFailed,
    ParseFailed,
    TranscriptionFailed,
    NotConfigured,
}

impl ErrorCode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::FetchTimeout => "fetch_timeout",
            Self::FetchFailed => "fetch_failed",
            Self::SearchFailed => "search_failed",
            Self::ParseFailed => "parse_failed",
            Self::TranscriptionFailed => "transcription_failed",
            Self::NotConfigured => "not_configured",
        }
    }

    pub(crate) fn retryable(self) -> bool {
        match self {
            Self::FetchTimeout | Self::FetchFailed | Self::SearchFailed => true,
            // Same input, same outcome until something upstream or in config changes.
            Self::InvalidParams
            | Self::ParseFailed
            | Self::TranscriptionFailed
            | Self::NotConfigured => false,
        }
    }

    pub(crate) fn for_error(e: &Error) -> Self {
        match e {
            Error::Validation(_) => Self::InvalidParams,
            Error::Request(_) => Self::SearchFailed,
            Error::Parse(_) => Self::ParseFailed,
            Error::Fetch(f) => Self::for_fetch_error(f),
            Error::Transcription(_) => Self::TranscriptionFailed,
            Error::NotConfigured(_) => Self::NotConfigured,
        }
    }

    pub(crate) fn for_fetch_error(e: &FetchError) -> Self {
        match e {
            FetchError::Timeout(_) => Self::FetchTimeout,
            FetchError::Unreachable(_) => Self::FetchFailed,
            FetchError::ParseFailed(_) => Self::ParseFailed,
        }
    }

    pub(crate) fn hint(self) -> &'static str {
        match self {
            Self::InvalidParams => "Check the tool arguments against the tool's input schema.",
            Self::FetchTimeout => {
                "The page did not respond in time. Retry later, or raise WEBSIFT_FETCH_TIMEOUT_MS (server env)."
            }
            Self::FetchFailed => {
                "The page could not be retrieved (network error or non-2xx status). Check the URL and retry."
            }
            Self::SearchFailed => {
                "The search backend could not be reached or returned an error. Check WEBSIFT_SEARXNG_HOST and that the instance allows format=json."
            }
            Self::ParseFailed => {
                "The response could not be turned into text (binary body or malformed backend JSON)."
            }
            Self::TranscriptionFailed => {
                "Download or speech-to-text failed. Check that yt-dlp is installed (websift doctor) and the video is public."
            }
            Self::NotConfigured => {
                "A required setting is missing. Set WEBSIFT_STT_API_KEY (or OPENAI_API_KEY) in the server env."
            }
        }
    }
}

pub(crate) fn add_envelope_fields(payload: &mut serde_json::Value, kind: &str, elapsed_ms: u128) {
    payload["schema_version"] = serde_json::json!(super::SCHEMA_VERSION);
    payload["kind"] = serde_json::json!(kind);
    payload["elapsed_ms"] = serde_json::json!(elapsed_ms);
}

pub(crate) fn error_obj(
    code: ErrorCode,
    message: impl ToString,
    hint: impl ToString,
) -> serde_json::Value {
    serde_json::json!({
        "code": code.as_str(),
        "message": message.to_string(),
        "hint": hint.to_string(),
        "retryable": code.retryable(),
    })
}
