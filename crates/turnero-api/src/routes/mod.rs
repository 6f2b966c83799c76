pub mod health;
pub mod webhook;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{middleware::logging, state::AppState};

#[derive(OpenApi)]
#[openapi(
    paths(health::health_check, webhook::verify, webhook::receive),
    components(schemas(health::HealthResponse, webhook::AcceptedResponse)),
    tags(
        (name = "health", description = "Liveness"),
        (name = "webhook", description = "WhatsApp Cloud webhook ingress")
    )
)]
pub struct ApiDoc;

/// Application routes with request logging
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/webhook", get(webhook::verify).post(webhook::receive))
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(logging::log_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
