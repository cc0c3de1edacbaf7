mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post};
use axum::Router;
use course_payments::http::handlers::{admin, payments, webhooks};
use course_payments::http::middleware::admin_auth;
use course_payments::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::{seeded_state, sign, success_payload, INTERNAL_API_KEY};

/// The production route table minus the redis-backed rate limiter.
fn app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/admin/payments/:payment_id",
            patch(admin::apply_action).get(admin::inspect),
        )
        .layer(from_fn_with_state(
            INTERNAL_API_KEY.to_string(),
            admin_auth::require_internal_api_key,
        ));

    Router::new()
        .route("/payments/initiate", post(payments::initiate))
        .route("/payments/webhook", post(webhooks::receive))
        .route("/payments/:payment_id/status", get(payments::status))
        .merge(admin_routes)
        .with_state(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn post_json(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
}

async fn initiate_via_http(app: &Router, user_id: Uuid, course_id: Uuid) -> (StatusCode, Value) {
    let body = json!({"course_id": course_id});
    let response = app
        .clone()
        .oneshot(
            post_json("/payments/initiate")
                .header("x-user-id", user_id.to_string())
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    (status, body_json(response).await)
}

async fn webhook_via_http(app: &Router, payload: &Value, signature: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            post_json("/payments/webhook")
                .header("x-gateway-signature", signature)
                .body(Body::from(payload.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn initiate_returns_checkout_session() {
    let (state, _store, course_id) = seeded_state().await;
    let app = app(state);
    let user_id = Uuid::new_v4();

    let (status, body) = initiate_via_http(&app, user_id, course_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount_cents"], 10_000);
    assert_eq!(body["currency"], "EGP");
    assert!(body["checkout_url"]
        .as_str()
        .unwrap()
        .starts_with("https://checkout.test/session/"));
}

#[tokio::test]
async fn initiate_requires_identity_header() {
    let (state, _store, course_id) = seeded_state().await;
    let app = app(state);

    let body = json!({"course_id": course_id});
    let response = app
        .oneshot(
            post_json("/payments/initiate")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn initiate_rejects_unknown_course_and_double_initiation() {
    let (state, _store, course_id) = seeded_state().await;
    let app = app(state);
    let user_id = Uuid::new_v4();

    let (status, body) = initiate_via_http(&app, user_id, Uuid::new_v4()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "COURSE_NOT_FOUND");

    let (status, _) = initiate_via_http(&app, user_id, course_id).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = initiate_via_http(&app, user_id, course_id).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "PAYMENT_ALREADY_PENDING");
}

#[tokio::test]
async fn webhook_rejects_missing_invalid_and_malformed() {
    let (state, _store, _course_id) = seeded_state().await;
    let app = app(state);

    let payload = success_payload("ord_x", "TXN-1", 10_000);

    // No signature header at all.
    let response = app
        .clone()
        .oneshot(
            post_json("/payments/webhook")
                .body(Body::from(payload.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "SIGNATURE_MISSING");

    // Signed, then tampered in flight.
    let signature = sign(&payload);
    let mut tampered = payload.clone();
    tampered["amount_cents"] = json!(1);
    let (status, body) = webhook_via_http(&app, &tampered, &signature).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "SIGNATURE_INVALID");

    // Not JSON at all.
    let response = app
        .clone()
        .oneshot(
            post_json("/payments/webhook")
                .header("x-gateway-signature", "deadbeef")
                .body(Body::from("{not json"))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "MALFORMED_PAYLOAD");
}

#[tokio::test]
async fn admin_surface_requires_internal_key() {
    let (state, _store, _course_id) = seeded_state().await;
    let app = app(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/admin/payments/{}", Uuid::new_v4()))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "UNAUTHORIZED");

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/admin/payments/{}", Uuid::new_v4()))
                .header("x-internal-api-key", "wrong-key")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn status_readable_by_owner_or_internal_caller() {
    let (state, _store, course_id) = seeded_state().await;
    let app = app(state);
    let user_id = Uuid::new_v4();

    let (status, initiated) = initiate_via_http(&app, user_id, course_id).await;
    assert_eq!(status, StatusCode::OK);
    let payment_id = initiated["payment_id"].as_str().unwrap().to_string();

    // Operators read any payment with the internal key, no owner identity.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/payments/{payment_id}/status"))
                .header("x-internal-api-key", INTERNAL_API_KEY)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "PENDING");

    // A wrong key does not fall back to anonymous access.
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/payments/{payment_id}/status"))
                .header("x-internal-api-key", "wrong-key")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn purchase_flow_end_to_end() {
    let (state, _store, course_id) = seeded_state().await;
    let app = app(state);
    let user_id = Uuid::new_v4();

    // Buyer starts checkout for the 100.00 EGP course.
    let (status, initiated) = initiate_via_http(&app, user_id, course_id).await;
    assert_eq!(status, StatusCode::OK);
    let payment_id = initiated["payment_id"].as_str().unwrap().to_string();

    // Status before the gateway reports back.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/payments/{payment_id}/status"))
                .header("x-user-id", user_id.to_string())
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let view = body_json(response).await;
    assert_eq!(view["status"], "PENDING");
    assert!(view["enrollment"].is_null());

    // The gateway confirms; the webhook must carry the order reference the
    // checkout session was created with.
    let order_ref = initiated["checkout_url"]
        .as_str()
        .unwrap()
        .rsplit('/')
        .next()
        .unwrap()
        .to_string();
    let payload = success_payload(&order_ref, "TXN-E2E", 10_000);
    let signature = sign(&payload);

    let (status, body) = webhook_via_http(&app, &payload, &signature).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);

    // Redelivery is acknowledged the same way.
    let (status, _) = webhook_via_http(&app, &payload, &signature).await;
    assert_eq!(status, StatusCode::OK);

    // Buyer now sees the completed payment with the enrollment attached.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/payments/{payment_id}/status"))
                .header("x-user-id", user_id.to_string())
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let view = body_json(response).await;
    assert_eq!(view["status"], "COMPLETED");
    assert!(view["enrollment"]["enrollment_id"].is_string());

    // Another user cannot read the payment.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/payments/{payment_id}/status"))
                .header("x-user-id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The operator console shows the full trail: both deliveries landed on
    // one record with two attempts.
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/admin/payments/{payment_id}"))
                .header("x-internal-api-key", INTERNAL_API_KEY)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let inspection = body_json(response).await;
    assert_eq!(inspection["payment"]["status"], "COMPLETED");
    assert_eq!(inspection["webhooks"].as_array().unwrap().len(), 1);
    assert_eq!(inspection["webhooks"][0]["processing_attempts"], 2);
}
