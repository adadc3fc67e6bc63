use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    catalog::{CategoryLookup, ProductLookup},
    config::{AutofillSettings, ProviderConfig, SettingsSource},
    error::AutofillError,
    models::{GenerationOutcome, GenerationRequest, GenerationResult},
    prompt::{ProductFields, Prompt},
    provider::{truncate_for_log, Provider},
};

/// Longest slice of a provider error body echoed back to the caller.
const UPSTREAM_BODY_LIMIT: usize = 300;

/// Turns a generation request into a description (and SEO metadata) with one provider call.
pub struct GenerationService {
    http: Client,
    settings: Arc<dyn SettingsSource>,
    products: Arc<dyn ProductLookup>,
    categories: Arc<dyn CategoryLookup>,
}

impl GenerationService {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        products: Arc<dyn ProductLookup>,
        categories: Arc<dyn CategoryLookup>,
    ) -> Self {
        Self { http: Client::new(), settings, products, categories }
    }

    /// Never fails: every error becomes a fallback outcome carrying the error.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let settings = self.settings.settings();
        let span = info_span!(
            "generate",
            request_id = %Uuid::new_v4(),
            provider = %settings.provider,
            product_id = ?request.product_id
        );
        async move {
            match self.try_generate(request, &settings).await {
                Ok(result) => {
                    info!("✅ Generation succeeded");
                    GenerationOutcome::success(result)
                }
                Err(e) => {
                    error!("❌ {e}; returning fallback");
                    GenerationOutcome::fallback(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn try_generate(
        &self,
        request: &GenerationRequest,
        settings: &AutofillSettings,
    ) -> Result<GenerationResult, AutofillError> {
        let config = settings.provider_config()?;
        let fields = self.resolve_fields(request).await;
        let prompt = Prompt::new(config.system_message(), &fields, config.schema_version);
        let provider = Provider::from_config(&config);
        self.call(&provider, &config, &prompt).await
    }

    pub async fn resolve_fields(&self, request: &GenerationRequest) -> ProductFields {
        let product = match request.product_id {
            Some(id) => {
                let found = self.products.product(id).await;
                if found.is_none() {
                    warn!(product_id = id, "⚠️ Product not found, using overrides only");
                }
                found
            }
            None => None,
        };
        // categories are only looked up when the caller did not supply them
        let category_names = match &product {
            Some(p) if request.overrides.product_categories.is_none() => {
                self.categories.category_names(&p.category_ids).await
            }
            _ => Vec::new(),
        };
        ProductFields::resolve(&request.overrides, product.as_ref(), &category_names)
    }

    async fn call(
        &self,
        provider: &Provider,
        config: &ProviderConfig,
        prompt: &Prompt,
    ) -> Result<GenerationResult, AutofillError> {
        let api = provider.api();
        info!("🔗 Making request to: {}", api.endpoint());

        let response = api
            .build_request(&self.http, config.api_key(), prompt)
            .timeout(config.timeout)
            .send()
            .await?;

        let status = response.status();
        info!("📥 Response status: {}", status);
        let body = response.text().await?;

        if !status.is_success() {
            error!("❌ API Error response: {}", truncate_for_log(&body, 1000));
            return Err(AutofillError::UpstreamStatus { status: status.as_u16(), body: truncate_for_log(&body, UPSTREAM_BODY_LIMIT) });
        }
        debug!("📥 Raw {} response: {}", api.kind(), truncate_for_log(&body, 1000));

        api.parse_response(&body, config.schema_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::InMemoryCatalog,
        error::{DISABLED_FALLBACK, MISSING_KEY_FALLBACK, NO_DESCRIPTION_FALLBACK},
        models::{AutofillResponse, Category, FieldOverrides, Product, ProductMetadata, ProviderKind, SchemaVersion},
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{any, body_partial_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalog() -> Arc<InMemoryCatalog> {
        let catalog = InMemoryCatalog::new();
        catalog.upsert_category(Category { id: 3, name: "Tools".into() });
        catalog.upsert_product(Product {
            id: 1,
            name: Some("Widget".into()),
            price: Some(19.99),
            short_description: Some(String::new()),
            brand: Some("Acme".into()),
            category_ids: vec![3],
        });
        Arc::new(catalog)
    }

    fn service(settings: AutofillSettings) -> GenerationService {
        let catalog = catalog();
        GenerationService::new(Arc::new(settings), catalog.clone(), catalog)
    }

    fn openai_settings(base: &str, schema: SchemaVersion) -> AutofillSettings {
        let mut s = AutofillSettings {
            provider: ProviderKind::OpenAi,
            openai_api_key: Some("sk-test".into()),
            schema_version: schema,
            ..Default::default()
        };
        s.openai.base_url = base.to_string();
        s
    }

    fn gemini_settings(base: &str, schema: SchemaVersion) -> AutofillSettings {
        let mut s = AutofillSettings {
            provider: ProviderKind::Gemini,
            gemini_api_key: Some("g-key".into()),
            schema_version: schema,
            ..Default::default()
        };
        s.gemini.base_url = base.to_string();
        s
    }

    fn request(product_id: Option<u64>, language: Option<&str>) -> GenerationRequest {
        GenerationRequest {
            product_id,
            overrides: FieldOverrides { language: language.map(String::from), ..Default::default() },
        }
    }

    #[tokio::test]
    async fn disabled_feature_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let settings = AutofillSettings { enabled: false, ..openai_settings(&server.uri(), SchemaVersion::Structured) };
        let outcome = service(settings).generate(&request(Some(1), None)).await;

        assert_eq!(outcome.result, GenerationResult::Plain(DISABLED_FALLBACK.into()));
        assert_eq!(outcome.error.as_ref().map(AutofillError::kind), Some("feature_disabled"));
        server.verify().await;
    }

    #[tokio::test]
    async fn empty_openai_key_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let settings = AutofillSettings { openai_api_key: Some(String::new()), ..openai_settings(&server.uri(), SchemaVersion::Plain) };
        let outcome = service(settings).generate(&request(Some(1), None)).await;

        assert_eq!(outcome.result, GenerationResult::Plain(MISSING_KEY_FALLBACK.into()));
        assert!(matches!(outcome.error, Some(AutofillError::MissingApiKey(ProviderKind::OpenAi))));
        server.verify().await;
    }

    #[tokio::test]
    async fn openai_structured_round_trip() {
        let server = MockServer::start().await;
        let args = json!({
            "description": "A sturdy widget.",
            "meta_title": "Widget by Acme",
            "meta_keywords": "widget, tools",
            "meta_description": "Buy the Acme widget."
        })
        .to_string();
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4", "function_call": {"name": "generate_product_metadata"}})))
            .and(body_string_contains("Name: Widget"))
            .and(body_string_contains("Price: 19.99"))
            .and(body_string_contains("Category: Tools"))
            .and(body_string_contains("following language: fr."))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_1", "type": "function", "function": {"name": "generate_product_metadata", "arguments": args}}
                ]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = service(openai_settings(&server.uri(), SchemaVersion::Structured))
            .generate(&request(Some(1), Some("fr")))
            .await;

        assert!(outcome.error.is_none());
        assert_eq!(
            outcome.result,
            GenerationResult::Structured(ProductMetadata {
                description: "A sturdy widget.".into(),
                meta_title: "Widget by Acme".into(),
                meta_keywords: "widget, tools".into(),
                meta_description: "Buy the Acme widget.".into(),
            })
        );
        server.verify().await;
    }

    #[tokio::test]
    async fn openai_plain_uses_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"max_tokens": 500})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Great widget."}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = service(openai_settings(&server.uri(), SchemaVersion::Plain)).generate(&request(Some(1), None)).await;
        assert_eq!(outcome.result, GenerationResult::Plain("Great widget.".into()));
        server.verify().await;
    }

    #[tokio::test]
    async fn gemini_plain_hello() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Hello"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = service(gemini_settings(&server.uri(), SchemaVersion::Plain)).generate(&request(None, None)).await;
        let response = AutofillResponse::from(outcome);
        assert_eq!(serde_json::to_value(response).unwrap(), json!({"short_description": "Hello"}));
        server.verify().await;
    }

    #[tokio::test]
    async fn gemini_structured_reads_function_call_args() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(body_partial_json(json!({"tool_config": {"function_calling_config": {"mode": "ANY"}}})))
            .and(body_string_contains("Brand: Acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"functionCall": {
                    "name": "generate_product_metadata",
                    "args": {"description": "D", "meta_title": "T", "meta_keywords": "K", "meta_description": "M"}
                }}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = service(gemini_settings(&server.uri(), SchemaVersion::Structured)).generate(&request(Some(1), None)).await;
        let GenerationResult::Structured(meta) = outcome.result else { panic!("expected structured result") };
        assert_eq!(meta.meta_keywords, "K");
        server.verify().await;
    }

    #[tokio::test]
    async fn transport_failure_in_structured_mode_falls_back() {
        // nothing listens on port 1
        let outcome = service(openai_settings("http://127.0.0.1:1", SchemaVersion::Structured))
            .generate(&request(Some(1), None))
            .await;

        assert_eq!(outcome.error.as_ref().map(AutofillError::kind), Some("transport_error"));
        let response = AutofillResponse::from(outcome);
        assert_eq!(response.short_description, NO_DESCRIPTION_FALLBACK);
        assert_eq!(response.meta_title, None);
        assert_eq!(response.meta_keywords, None);
        assert_eq!(response.meta_description, None);
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_transport_error() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let settings = AutofillSettings { timeout: Duration::from_millis(200), ..gemini_settings(&server.uri(), SchemaVersion::Plain) };
        let outcome = service(settings).generate(&request(None, None)).await;
        assert_eq!(outcome.error.as_ref().map(AutofillError::kind), Some("transport_error"));
        assert_eq!(outcome.result, GenerationResult::Plain(NO_DESCRIPTION_FALLBACK.into()));
    }

    #[tokio::test]
    async fn generate_runs_on_a_spawned_task() {
        let svc = Arc::new(service(AutofillSettings { enabled: false, ..Default::default() }));
        let handle = tokio::spawn(async move { svc.generate(&GenerationRequest::default()).await });
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.error.as_ref().map(AutofillError::kind), Some("feature_disabled"));
    }

    #[tokio::test]
    async fn transport_error_message_omits_url_and_key() {
        let outcome = service(gemini_settings("http://127.0.0.1:1", SchemaVersion::Plain)).generate(&request(None, None)).await;
        let message = outcome.error.map(|e| e.to_string()).unwrap_or_default();
        assert!(message.starts_with("transport error"), "{message}");
        assert!(!message.contains("g-key"), "{message}");
        assert!(!message.contains("127.0.0.1"), "{message}");
    }

    #[tokio::test]
    async fn upstream_error_body_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(5000)))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = service(openai_settings(&server.uri(), SchemaVersion::Plain)).generate(&request(None, None)).await;
        let Some(AutofillError::UpstreamStatus { status, body }) = outcome.error else { panic!("expected upstream status") };
        assert_eq!(status, 500);
        assert!(body.len() < 400, "body kept {} bytes", body.len());
        assert!(body.ends_with("...[5000 chars]"));
        server.verify().await;
    }

    #[tokio::test]
    async fn error_status_is_reported_distinctly() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = service(openai_settings(&server.uri(), SchemaVersion::Structured)).generate(&request(None, None)).await;
        assert!(matches!(outcome.error, Some(AutofillError::UpstreamStatus { status: 401, .. })));
        assert_eq!(outcome.result, GenerationResult::Plain(NO_DESCRIPTION_FALLBACK.into()));
    }

    #[tokio::test]
    async fn malformed_body_falls_back() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let outcome = service(gemini_settings(&server.uri(), SchemaVersion::Structured)).generate(&request(None, None)).await;
        assert_eq!(outcome.error.as_ref().map(AutofillError::kind), Some("malformed_response"));
        assert_eq!(outcome.result, GenerationResult::Plain(NO_DESCRIPTION_FALLBACK.into()));
    }

    #[tokio::test]
    async fn unknown_product_resolves_from_overrides() {
        let svc = service(AutofillSettings::default());
        let req = GenerationRequest {
            product_id: Some(404),
            overrides: FieldOverrides { product_name: Some("Lamp".into()), ..Default::default() },
        };
        let fields = svc.resolve_fields(&req).await;
        assert_eq!(fields.name, "Lamp");
        assert_eq!(fields.price, "N/A");
        assert_eq!(fields.categories, "N/A");
    }

    #[tokio::test]
    async fn category_override_skips_lookup() {
        let svc = service(AutofillSettings::default());
        let req = GenerationRequest {
            product_id: Some(1),
            overrides: FieldOverrides { product_categories: Some("Garden".into()), ..Default::default() },
        };
        assert_eq!(svc.resolve_fields(&req).await.categories, "Garden");
    }
}
