use axum::{
    Json, Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::handlers::health;
use crate::infra::{app_state::AppState, errors::REDACTED_MESSAGE};
use crate::routes;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the full application router.
pub fn create_app(state: AppState) -> Router {
    // Browsers on any origin may call the API with credentials.
    let cors_layer = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .nest("/api", routes::create_api_router())
        .fallback(health::not_found_handler)
        // Layers run outer to inner: CORS, tracing, body limit, redaction.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            redact_server_errors,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Replace 5xx bodies with a generic message in production.
async fn redact_server_errors(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if state.config().is_production() && response.status().is_server_error() {
        return (
            response.status(),
            Json(json!({ "error": REDACTED_MESSAGE })),
        )
            .into_response();
    }
    response
}
