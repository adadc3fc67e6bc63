use axum::{
    body::Bytes,
    extract::{FromRequest, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    catalog::InMemoryCatalog,
    error::AutofillError,
    models::{AutofillResponse, Category, GenerationOutcome, GenerationRequest, Product, ProviderKind, ProviderOption},
    service::GenerationService,
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GenerationService>,
    pub catalog: Arc<InMemoryCatalog>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/autofill/generate", post(generate))
        .route("/api/autofill/providers", get(list_providers))
        .route("/api/products/:id", get(get_product).put(put_product))
        .route("/api/categories/:id", put(put_category))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

async fn health() -> &'static str { "ok" }

/// Always 200; failures show up as a fallback `short_description` plus an `error` object.
#[axum::debug_handler]
pub async fn generate(State(state): State<AppState>, request: Request) -> Json<AutofillResponse> {
    let body = match read_generation_request(request).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("⚠️ Rejected autofill request: {}", e);
            return Json(GenerationOutcome::fallback(e).into());
        }
    };
    tracing::info!("🚀 Autofill requested for product: {:?}", body.product_id);
    let outcome = state.service.generate(&body).await;
    Json(outcome.into())
}

/// Admin forms post urlencoded fields; everything else is read as JSON whatever its content type.
async fn read_generation_request(request: Request) -> Result<GenerationRequest, AutofillError> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        let Form(body) = Form::<GenerationRequest>::from_request(request, &())
            .await
            .map_err(|e| AutofillError::MalformedRequest(e.body_text()))?;
        return Ok(body);
    }
    let bytes = Bytes::from_request(request, &())
        .await
        .map_err(|e| AutofillError::MalformedRequest(e.body_text()))?;
    serde_json::from_slice(&bytes).map_err(|e| AutofillError::MalformedRequest(e.to_string()))
}

pub async fn list_providers() -> Json<Vec<ProviderOption>> {
    Json(ProviderKind::ALL.iter().map(|p| ProviderOption { value: p.as_str(), label: p.label() }).collect())
}

pub async fn get_product(Path(id): Path<u64>, State(state): State<AppState>) -> Response {
    if let Some(p) = state.catalog.get_product(id) { Json(p).into_response() } else { StatusCode::NOT_FOUND.into_response() }
}

pub async fn put_product(Path(id): Path<u64>, State(state): State<AppState>, Json(mut body): Json<Product>) -> Json<Product> {
    body.id = id;
    state.catalog.upsert_product(body.clone());
    tracing::info!("📦 Stored product {}", id);
    Json(body)
}

pub async fn put_category(Path(id): Path<u64>, State(state): State<AppState>, Json(mut body): Json<Category>) -> Json<Category> {
    body.id = id;
    state.catalog.upsert_category(body.clone());
    Json(body)
}
