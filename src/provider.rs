use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    config::ProviderConfig,
    error::AutofillError,
    gemini::GeminiProvider,
    models::{GenerationResult, ProductMetadata, ProviderKind, SchemaVersion},
    openai::OpenAiProvider,
    prompt::{Prompt, NOT_AVAILABLE},
};

/// Wire format of one provider: how a prompt becomes a request and how a reply becomes a result.
pub trait ProviderApi: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Endpoint without credentials, safe to log.
    fn endpoint(&self) -> String;

    fn request_body(&self, prompt: &Prompt) -> Value;

    fn build_request(&self, http: &Client, api_key: &str, prompt: &Prompt) -> RequestBuilder;

    fn parse_response(&self, body: &str, schema: SchemaVersion) -> Result<GenerationResult, AutofillError>;
}

#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi(OpenAiProvider),
    Gemini(GeminiProvider),
}

impl Provider {
    pub fn from_config(config: &ProviderConfig) -> Self {
        let ep = &config.endpoint;
        match config.provider {
            ProviderKind::OpenAi => Self::OpenAi(OpenAiProvider::new(&ep.base_url, &ep.model)),
            ProviderKind::Gemini => Self::Gemini(GeminiProvider::new(&ep.base_url, &ep.model)),
        }
    }

    pub fn api(&self) -> &dyn ProviderApi {
        match self {
            Self::OpenAi(p) => p,
            Self::Gemini(p) => p,
        }
    }
}

/// Arguments of a `generate_product_metadata` call.
///
/// The schema asks for `description`, but some replies use `short_description`;
/// `description` wins when both are present.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MetadataArgs {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    short_description: Option<String>,
    #[serde(default)]
    meta_title: Option<String>,
    #[serde(default)]
    meta_keywords: Option<String>,
    #[serde(default)]
    meta_description: Option<String>,
}

impl MetadataArgs {
    pub(crate) fn from_value(args: Value) -> Result<Self, AutofillError> {
        match &args {
            Value::Object(map) if !map.is_empty() => {}
            _ => return Err(AutofillError::MalformedResponse(format!("empty function arguments: {args}"))),
        }
        serde_json::from_value(args).map_err(|e| AutofillError::MalformedResponse(format!("function arguments: {e}")))
    }

    pub(crate) fn from_json_str(raw: &str) -> Result<Self, AutofillError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| AutofillError::MalformedResponse(format!("function arguments are not JSON: {e}")))?;
        Self::from_value(value)
    }

    pub(crate) fn into_metadata(self) -> ProductMetadata {
        let na = || NOT_AVAILABLE.to_string();
        ProductMetadata {
            description: self.description.or(self.short_description).unwrap_or_else(na),
            meta_title: self.meta_title.unwrap_or_else(na),
            meta_keywords: self.meta_keywords.unwrap_or_else(na),
            meta_description: self.meta_description.unwrap_or_else(na),
        }
    }
}

/// Trimmed free text, or `None` when there is nothing to use.
pub(crate) fn non_empty_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

pub(crate) fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) { end -= 1; }
    format!("{}...[{} chars]", &s[..end], s.len())
}
