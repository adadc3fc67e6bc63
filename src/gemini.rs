use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AutofillError,
    models::{GenerationResult, ProviderKind, SchemaVersion},
    prompt::{metadata_parameters, Prompt, METADATA_FUNCTION, METADATA_FUNCTION_DESCRIPTION},
    provider::{non_empty_text, MetadataArgs, ProviderApi},
};

/// `generateContent` API; the key travels as the `key` query parameter.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    base_url: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), model: model.to_string() }
    }
}

impl ProviderApi for GeminiProvider {
    fn kind(&self) -> ProviderKind { ProviderKind::Gemini }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body(&self, prompt: &Prompt) -> Value {
        let mut body = json!({
            "system_instruction": {
                "parts": [{"text": prompt.system}]
            },
            "contents": [{
                "role": "user",
                "parts": [{"text": prompt.user}]
            }]
        });
        if prompt.schema == SchemaVersion::Structured {
            body["tools"] = json!([{
                "function_declarations": [{
                    "name": METADATA_FUNCTION,
                    "description": METADATA_FUNCTION_DESCRIPTION,
                    "parameters": metadata_parameters()
                }]
            }]);
            body["tool_config"] = json!({
                "function_calling_config": {
                    "mode": "ANY",
                    "allowed_function_names": [METADATA_FUNCTION]
                }
            });
        }
        body
    }

    fn build_request(&self, http: &Client, api_key: &str, prompt: &Prompt) -> RequestBuilder {
        http.post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&self.request_body(prompt))
    }

    fn parse_response(&self, body: &str, schema: SchemaVersion) -> Result<GenerationResult, AutofillError> {
        let parsed: GeminiResponse = serde_json::from_str(body)
            .map_err(|e| AutofillError::MalformedResponse(format!("parse error: {e}")))?;
        // only candidates[0].content.parts[0] is consulted
        let part = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .ok_or_else(|| AutofillError::MalformedResponse("no candidate parts in Gemini response".into()))?;

        match (schema, part) {
            (SchemaVersion::Plain, Part::Text { text }) => non_empty_text(Some(text))
                .map(GenerationResult::Plain)
                .ok_or_else(|| AutofillError::MalformedResponse("empty text in Gemini response".into())),
            (SchemaVersion::Structured, Part::FunctionCall { function_call }) => {
                let args = MetadataArgs::from_value(function_call.args)?;
                Ok(GenerationResult::Structured(args.into_metadata()))
            }
            (SchemaVersion::Plain, _) => Err(AutofillError::MalformedResponse("first part is not text".into())),
            (SchemaVersion::Structured, _) => {
                Err(AutofillError::MalformedResponse("no function response received from Gemini".into()))
            }
        }
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCallPart,
    },
    Text { text: String },
    #[allow(dead_code)]
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct FunctionCallPart {
    #[serde(default)]
    args: Value,
}
