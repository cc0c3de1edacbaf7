use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Who forced what, when. Kept separate from the gateway-originated webhook
/// trail.
#[derive(Debug, Clone, Serialize)]
pub struct OperatorActionRecord {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub actor: String,
    pub action: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
