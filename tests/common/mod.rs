#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use course_payments::domain::course::Course;
use course_payments::domain::payment::Payment;
use course_payments::gateways::mock::MockCheckoutGateway;
use course_payments::repo::memory::MemoryStore;
use course_payments::service::webhooks::WebhookOutcome;
use course_payments::signature::SignatureVerifier;
use course_payments::AppState;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const INTERNAL_API_KEY: &str = "test-internal-key";

/// App wired against the in-memory store and the mock checkout gateway, with
/// one published 100.00 EGP course seeded.
pub async fn seeded_state() -> (AppState, Arc<MemoryStore>, Uuid) {
    let store = Arc::new(MemoryStore::new());
    let course_id = Uuid::new_v4();
    store
        .seed_course(Course {
            course_id,
            title: "Intro to Databases".to_string(),
            price_cents: 10_000,
            currency: "EGP".to_string(),
            is_published: true,
        })
        .await;

    let state = AppState::new(
        store.clone(),
        Arc::new(MockCheckoutGateway::succeeding()),
        SignatureVerifier::new(WEBHOOK_SECRET),
        redis::Client::open("redis://127.0.0.1:6379/").expect("redis url"),
        INTERNAL_API_KEY.to_string(),
    );
    (state, store, course_id)
}

/// Initiates a payment and returns the stored PENDING row.
pub async fn initiated_payment(
    state: &AppState,
    store: &MemoryStore,
    user_id: Uuid,
    course_id: Uuid,
) -> Payment {
    use course_payments::repo::ReconciliationStore;

    let resp = state
        .payments
        .initiate(user_id, course_id)
        .await
        .expect("initiate");
    store
        .find_payment(resp.payment_id)
        .await
        .expect("find_payment")
        .expect("payment row")
}

pub fn success_payload(order_ref: &str, txn_ref: &str, amount_cents: i64) -> serde_json::Value {
    json!({
        "transaction_ref": txn_ref,
        "order_ref": order_ref,
        "success": true,
        "amount_cents": amount_cents,
        "currency": "EGP",
    })
}

pub fn failure_payload(order_ref: &str, txn_ref: &str, amount_cents: i64) -> serde_json::Value {
    json!({
        "transaction_ref": txn_ref,
        "order_ref": order_ref,
        "success": false,
        "amount_cents": amount_cents,
        "currency": "EGP",
        "failure_code": "INSUFFICIENT_FUNDS",
        "failure_message": "card declined",
    })
}

pub fn refund_payload(order_ref: &str, txn_ref: &str, amount_cents: i64) -> serde_json::Value {
    json!({
        "transaction_ref": txn_ref,
        "order_ref": order_ref,
        "success": true,
        "is_refund": true,
        "amount_cents": amount_cents,
        "currency": "EGP",
    })
}

pub fn sign(payload: &serde_json::Value) -> String {
    SignatureVerifier::new(WEBHOOK_SECRET).compute(payload)
}

/// Pushes a payload straight into the processor, past the HTTP layer.
pub async fn deliver(state: &AppState, payload: &serde_json::Value) -> WebhookOutcome {
    let notification = serde_json::from_value(payload.clone()).expect("notification payload");
    state
        .webhooks
        .process(notification, payload.clone())
        .await
        .expect("process")
}
