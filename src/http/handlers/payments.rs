use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use crate::domain::payment::{ErrorEnvelope, InitiatePaymentRequest};
use crate::AppState;

/// Identity comes from the upstream auth layer as a header; this core does
/// not own sessions.
fn user_from_headers(headers: &HeaderMap) -> Result<Uuid, (StatusCode, Json<ErrorEnvelope>)> {
    headers
        .get("x-user-id")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorEnvelope::new("UNAUTHENTICATED", "missing or invalid X-User-Id")),
            )
        })
}

pub async fn initiate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<InitiatePaymentRequest>,
) -> impl IntoResponse {
    let user_id = match user_from_headers(&headers) {
        Ok(id) => id,
        Err(resp) => return resp.into_response(),
    };

    match state.payments.initiate(user_id, req.course_id).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err((status, body)) => (status, Json(body)).into_response(),
    }
}

fn is_internal_caller(headers: &HeaderMap, expected: &str) -> bool {
    !expected.is_empty()
        && headers
            .get("x-internal-api-key")
            .and_then(|h| h.to_str().ok())
            == Some(expected)
}

pub async fn status(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    headers: HeaderMap,
) -> impl IntoResponse {
    // Owner or internal caller; operators read any payment without owning it.
    let requester = if is_internal_caller(&headers, &state.internal_api_key) {
        None
    } else {
        match user_from_headers(&headers) {
            Ok(id) => Some(id),
            Err(resp) => return resp.into_response(),
        }
    };

    match state.payments.status(payment_id, requester).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err((status, body)) => (status, Json(body)).into_response(),
    }
}
