use serde::Serialize;
use thiserror::Error;

use crate::models::ProviderKind;

pub const DISABLED_FALLBACK: &str = "Autofill feature is disabled.";
pub const MISSING_KEY_FALLBACK: &str = "API key not configured.";
pub const NO_DESCRIPTION_FALLBACK: &str = "No description generated.";

#[derive(Debug, Error)]
pub enum AutofillError {
    #[error("autofill feature is disabled")]
    FeatureDisabled,
    #[error("API key missing for provider: {0}")]
    MissingApiKey(ProviderKind),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned status={status} body={body}")]
    UpstreamStatus { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

impl AutofillError {
    /// Stable machine-readable code reported alongside the fallback payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FeatureDisabled => "feature_disabled",
            Self::MissingApiKey(_) => "missing_api_key",
            Self::Transport(_) => "transport_error",
            Self::UpstreamStatus { .. } => "upstream_status",
            Self::MalformedResponse(_) => "malformed_response",
            Self::MalformedRequest(_) => "malformed_request",
        }
    }

    pub fn fallback_message(&self) -> &'static str {
        match self {
            Self::FeatureDisabled => DISABLED_FALLBACK,
            Self::MissingApiKey(_) => MISSING_KEY_FALLBACK,
            _ => NO_DESCRIPTION_FALLBACK,
        }
    }
}

impl From<reqwest::Error> for AutofillError {
    // the request URL can carry the Gemini key, so it never reaches the message
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            Self::Transport(format!("request timed out: {e}"))
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl From<&AutofillError> for ErrorBody {
    fn from(e: &AutofillError) -> Self {
        Self { kind: e.kind(), message: e.to_string() }
    }
}
