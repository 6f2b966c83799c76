use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use turnero_engine::Engine;
use turnero_types::InboundMessage;
use turnero_whatsapp::{verify_signature, VerifyQuery, WebhookPayload, SIGNATURE_HEADER};
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AcceptedResponse {
    pub status: String,
    /// Events handed to the engine
    pub accepted: usize,
}

/// Subscription challenge sent by the provider when the webhook is registered
#[utoipa::path(
    get,
    path = "/webhook",
    params(
        ("hub.mode" = Option<String>, Query, description = "Must be `subscribe`"),
        ("hub.verify_token" = Option<String>, Query, description = "Configured verify token"),
        ("hub.challenge" = Option<String>, Query, description = "Value echoed back on success")
    ),
    responses(
        (status = 200, description = "Challenge echoed", body = String, content_type = "text/plain"),
        (status = 403, description = "Token or mode mismatch")
    ),
    tag = "webhook"
)]
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<String> {
    match query.accept(&state.verify_token) {
        Some(challenge) => {
            info!("Webhook subscription verified");
            Ok(challenge.to_string())
        }
        None => {
            warn!(mode = ?query.mode, "Webhook verification rejected");
            Err(ApiError::VerificationFailed)
        }
    }
}

/// Inbound message notifications
///
/// Acknowledged as soon as the payload is accepted; each message is
/// processed on its own task.
#[utoipa::path(
    post,
    path = "/webhook",
    request_body(content = String, description = "WhatsApp Cloud webhook payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Payload accepted", body = AcceptedResponse),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Invalid signature")
    ),
    tag = "webhook"
)]
pub async fn receive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<AcceptedResponse>> {
    if let Some(secret) = state.app_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        verify_signature(&body, signature, secret)?;
    }

    let payload = WebhookPayload::parse(&body)?;
    let now = Utc::now();
    let mut accepted = 0;

    for event in payload.inbound_messages() {
        if event.is_stale(now, state.max_event_age) {
            warn!(
                message_id = %event.message_id,
                timestamp = %event.timestamp,
                "Dropping stale inbound message"
            );
            continue;
        }

        accepted += 1;
        tokio::spawn(process(Arc::clone(&state.engine), event));
    }

    if payload.status_count() > 0 {
        tracing::debug!(statuses = payload.status_count(), "Ignoring status callbacks");
    }

    Ok(Json(AcceptedResponse {
        status: "accepted".to_string(),
        accepted,
    }))
}

async fn process(engine: Arc<Engine>, event: InboundMessage) {
    let message_id = event.message_id.clone();
    match engine.handle(event).await {
        Ok(outcome) => info!(
            message_id = %message_id,
            outcome = outcome.label(),
            "Turn finished"
        ),
        Err(e) => error!(message_id = %message_id, error = %e, "Turn failed"),
    }
}
