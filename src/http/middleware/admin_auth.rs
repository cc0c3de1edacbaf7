use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::domain::payment::ErrorEnvelope;

/// Gate for the operator console. An unconfigured key locks the surface
/// rather than opening it.
pub async fn require_internal_api_key(
    State(expected): State<String>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("x-internal-api-key")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if expected.is_empty() || provided != expected {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorEnvelope::new(
                "UNAUTHORIZED",
                "missing or invalid X-Internal-Api-Key",
            )),
        )
            .into_response();
    }

    next.run(request).await
}
