use axum::Router;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use turnero_api::{config::Config, routes, state::AppState};
use turnero_assistant::{AssistantClient, OpenAIAssistantsClient};
use turnero_engine::Engine;
use turnero_persist::{MongoPersistenceClient, PersistenceClient};
use turnero_whatsapp::{ReplySender, WhatsAppClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting Turnero API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    tracing::info!("Connecting to MongoDB");
    let mongo = MongoPersistenceClient::connect(&config.mongodb_uri, &config.mongodb.database).await?;
    mongo.ping().await?;
    mongo.ensure_indexes().await?;
    tracing::info!("MongoDB connected");
    let store: Arc<dyn PersistenceClient> = Arc::new(mongo);

    let assistant: Arc<dyn AssistantClient> =
        Arc::new(OpenAIAssistantsClient::new(config.assistant_config())?);
    let sender: Arc<dyn ReplySender> = Arc::new(WhatsAppClient::new(config.whatsapp_config())?);

    let engine = Engine::builder()
        .store(store)
        .assistant(assistant)
        .sender(sender)
        .config(config.engine_config())
        .build()?;

    let state = Arc::new(
        AppState::new(Arc::new(engine), config.whatsapp_verify_token.clone())
            .with_app_secret(config.whatsapp_app_secret.clone())
            .with_max_event_age(config.max_event_age()),
    );
    if state.app_secret.is_none() {
        tracing::warn!("WHATSAPP_APP_SECRET not set, webhook signatures are not checked");
    }

    let app = build_router(state, &config);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("API docs: http://{}/api/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    routes::router(state)
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(build_cors_layer(config))
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if !config.cors.enabled {
        return CorsLayer::new();
    }

    let mut cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    if config.cors.origins.iter().any(|o| o == "*") {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<axum::http::HeaderValue> = config
            .cors
            .origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    cors
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
