use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One received gateway notification. The gateway may redeliver, so several
/// records can point at the same payment; the transaction reference is the
/// idempotency key.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookRecord {
    pub id: Uuid,
    pub payment_id: Option<Uuid>,
    pub gateway_txn_ref: String,
    pub raw_payload: serde_json::Value,
    pub processing_attempts: i32,
    pub processed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WebhookRecord {
    /// Processed cleanly: redeliveries short-circuit without side effects.
    pub fn is_settled(&self) -> bool {
        self.processed_at.is_some() && self.last_error.is_none()
    }
}

/// Parsed gateway callback payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayNotification {
    pub transaction_ref: String,
    pub order_ref: String,
    pub success: bool,
    #[serde(default)]
    pub is_refund: bool,
    pub amount_cents: i64,
    pub currency: String,
    #[serde(default)]
    pub failure_code: Option<String>,
    #[serde(default)]
    pub failure_message: Option<String>,
}
