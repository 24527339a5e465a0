//! Stripe webhook endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::billing::webhooks::handle_event;
use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::{verify_signature, WebhookEvent};

/// Acknowledgement returned to Stripe.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Always `true`.
    pub received: bool,
}

/// `POST /webhooks/stripe`
///
/// The signature is checked before the body is parsed. Any error after that
/// returns a non-2xx status so Stripe redelivers the event.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Webhooks are not configured".into()))?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe-Signature header".into()))?;

    verify_signature(
        &body,
        signature,
        secret,
        state.config.webhook_tolerance_seconds,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook");
        ApiError::from(e)
    })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid webhook payload: {e}")))?;

    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Stripe webhook received");

    handle_event(&state, &event).await?;

    Ok(Json(WebhookAck { received: true }))
}
