use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::{serde_as, NoneAsEmptyString, PickFirst};
use std::{fmt, str::FromStr};

use crate::error::{AutofillError, ErrorBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAi, ProviderKind::Gemini];

    pub fn as_str(self) -> &'static str {
        match self { Self::OpenAi => "openai", Self::Gemini => "gemini" }
    }

    pub fn label(self) -> &'static str {
        match self { Self::OpenAi => "OpenAI", Self::Gemini => "Gemini" }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ProviderKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(format!("unknown API provider: {other}")),
        }
    }
}

/// Which response schema the provider is asked to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// Free-text description only.
    Plain,
    /// Description plus SEO metadata via a forced `generate_product_metadata` call.
    Structured,
}

impl FromStr for SchemaVersion {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "structured" => Ok(Self::Structured),
            other => Err(format!("unknown schema version: {other}")),
        }
    }
}

/// Caller-supplied values that win over the stored product attributes.
///
/// Admin forms send some of these as numbers (price), so scalars are taken as text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldOverrides {
    #[serde(default, deserialize_with = "lenient_string")]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub product_price: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub product_categories: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub short_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub product_brand: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub language: Option<String>,
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected a text value, got {other}"))),
    }
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationRequest {
    // admin forms post the id as a string, sometimes empty
    #[serde_as(as = "PickFirst<(_, NoneAsEmptyString)>")]
    #[serde(default)]
    pub product_id: Option<u64>,
    #[serde(flatten)]
    pub overrides: FieldOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductMetadata {
    pub description: String,
    pub meta_title: String,
    pub meta_keywords: String,
    pub meta_description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Plain(String),
    Structured(ProductMetadata),
}

/// A generation result together with the error that forced a fallback, if any.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub result: GenerationResult,
    pub error: Option<AutofillError>,
}

impl GenerationOutcome {
    pub fn success(result: GenerationResult) -> Self { Self { result, error: None } }

    pub fn fallback(error: AutofillError) -> Self {
        Self { result: GenerationResult::Plain(error.fallback_message().to_string()), error: Some(error) }
    }
}

/// JSON body returned to the admin UI.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AutofillResponse {
    pub short_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl From<GenerationOutcome> for AutofillResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        let error = outcome.error.as_ref().map(ErrorBody::from);
        match outcome.result {
            GenerationResult::Plain(text) => Self {
                short_description: text,
                meta_title: None,
                meta_keywords: None,
                meta_description: None,
                error,
            },
            GenerationResult::Structured(meta) => Self {
                short_description: meta.description,
                meta_title: Some(meta.meta_title),
                meta_keywords: Some(meta.meta_keywords),
                meta_description: Some(meta.meta_description),
                error,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Product {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    #[serde(default)]
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderOption {
    pub value: &'static str,
    pub label: &'static str,
}
