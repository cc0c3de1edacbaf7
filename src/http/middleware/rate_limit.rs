use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use redis::AsyncCommands;

use crate::domain::payment::ErrorEnvelope;

#[derive(Clone)]
pub struct RateLimitState {
    pub redis_client: redis::Client,
    pub max_per_minute: i64,
}

/// Per-caller, per-minute counter over redis, layered on the public payment
/// routes only (the admin surface is already gated by the internal key).
/// Buyers are keyed by X-User-Id, anonymous callers and the gateway by client
/// address. Fails open when redis is down: payment traffic should not be
/// dropped because the limiter is unavailable.
pub async fn enforce(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let caller = request
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| client_addr(&request));

    let minute = chrono::Utc::now().format("%Y%m%d%H%M");
    let key = format!("course_payments:rate:{caller}:{minute}");

    if let Ok(mut conn) = state.redis_client.get_multiplexed_async_connection().await {
        let count: i64 = conn.incr(&key, 1).await.unwrap_or(1);
        let _: bool = conn.expire(&key, 120).await.unwrap_or(false);
        if count > state.max_per_minute {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorEnvelope::new("RATE_LIMITED", "too many requests")),
            )
                .into_response();
        }
    }

    next.run(request).await
}

fn client_addr(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}
