use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::AutofillError,
    models::{GenerationResult, ProviderKind, SchemaVersion},
    prompt::{metadata_parameters, Prompt, METADATA_FUNCTION, METADATA_FUNCTION_DESCRIPTION},
    provider::{non_empty_text, MetadataArgs, ProviderApi},
};

const PLAIN_MAX_TOKENS: u32 = 500;

/// Chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), model: model.to_string() }
    }
}

impl ProviderApi for OpenAiProvider {
    fn kind(&self) -> ProviderKind { ProviderKind::OpenAi }

    fn endpoint(&self) -> String { format!("{}/chat/completions", self.base_url) }

    fn request_body(&self, prompt: &Prompt) -> Value {
        let messages = json!([
            {"role": "system", "content": prompt.system},
            {"role": "user", "content": prompt.user}
        ]);
        match prompt.schema {
            SchemaVersion::Structured => json!({
                "model": self.model,
                "messages": messages,
                "functions": [{
                    "name": METADATA_FUNCTION,
                    "description": METADATA_FUNCTION_DESCRIPTION,
                    "parameters": metadata_parameters()
                }],
                "function_call": {"name": METADATA_FUNCTION}
            }),
            SchemaVersion::Plain => json!({
                "model": self.model,
                "messages": messages,
                "max_tokens": PLAIN_MAX_TOKENS
            }),
        }
    }

    fn build_request(&self, http: &Client, api_key: &str, prompt: &Prompt) -> RequestBuilder {
        http.post(self.endpoint()).bearer_auth(api_key).json(&self.request_body(prompt))
    }

    fn parse_response(&self, body: &str, schema: SchemaVersion) -> Result<GenerationResult, AutofillError> {
        let parsed: ChatCompletion = serde_json::from_str(body)
            .map_err(|e| AutofillError::MalformedResponse(format!("parse error: {e}")))?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| AutofillError::MalformedResponse("no choices in OpenAI response".into()))?;

        match schema {
            SchemaVersion::Plain => non_empty_text(message.content)
                .map(GenerationResult::Plain)
                .ok_or_else(|| AutofillError::MalformedResponse("no message content in OpenAI response".into())),
            SchemaVersion::Structured => {
                // tool_calls first, then the legacy single function_call
                let call = message
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|t| t.function)
                    .chain(message.function_call)
                    .find(|f| f.name == METADATA_FUNCTION)
                    .ok_or_else(|| AutofillError::MalformedResponse("no matching function call in OpenAI response".into()))?;
                let args = MetadataArgs::from_json_str(&call.arguments)?;
                Ok(GenerationResult::Structured(args.into_metadata()))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Message,
}

#[derive(Debug, Default, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}
