use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::domain::payment::ErrorEnvelope;
use crate::domain::webhook::GatewayNotification;
use crate::AppState;

/// Gateway callback. Signature is checked before anything can mutate state;
/// past that point every outcome (including internal failure) is
/// acknowledged 200 so the gateway stops redelivering.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Some(signature) = headers.get("x-gateway-signature").and_then(|h| h.to_str().ok())
    else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorEnvelope::new("SIGNATURE_MISSING", "missing X-Gateway-Signature")),
        )
            .into_response();
    };

    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorEnvelope::new("MALFORMED_PAYLOAD", "body is not valid JSON")),
            )
                .into_response()
        }
    };

    if !state.verifier.verify(&raw, signature) {
        tracing::warn!("webhook rejected: signature verification failed");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorEnvelope::new("SIGNATURE_INVALID", "signature verification failed")),
        )
            .into_response();
    }

    let notification: GatewayNotification = match serde_json::from_value(raw.clone()) {
        Ok(n) => n,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorEnvelope::new("MALFORMED_PAYLOAD", &e.to_string())),
            )
                .into_response()
        }
    };

    match state.webhooks.process(notification, raw).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "webhook processed");
            (StatusCode::OK, Json(json!({"received": true}))).into_response()
        }
        Err(e) => {
            // Deliberate: internal failures are logged, not propagated, so
            // the gateway is not stuck retrying against a broken store.
            tracing::error!(error = %e, "webhook processing error");
            (StatusCode::OK, Json(json!({"received": true}))).into_response()
        }
    }
}
