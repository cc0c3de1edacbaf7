use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use crate::service::operator::AdminPaymentRequest;
use crate::AppState;

fn actor_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-operator-id")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("internal")
        .to_string()
}

pub async fn apply_action(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<AdminPaymentRequest>,
) -> impl IntoResponse {
    let actor = actor_from_headers(&headers);
    match state.operator.handle(payment_id, req, &actor).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err((status, body)) => (status, Json(body)).into_response(),
    }
}

pub async fn inspect(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.operator.inspect(payment_id).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err((status, body)) => (status, Json(body)).into_response(),
    }
}
