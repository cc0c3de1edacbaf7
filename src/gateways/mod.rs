use anyhow::Result;
use uuid::Uuid;

pub mod hosted;
pub mod mock;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order_ref: String,
    pub amount_cents: i64,
    pub currency: String,
    pub course_title: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub gateway_order_id: Option<String>,
    pub raw_response: serde_json::Value,
}

/// External collaborator boundary: the gateway collects the card details and
/// reports the outcome later via webhook. This core only asks it for a
/// hosted checkout session.
#[async_trait::async_trait]
pub trait CheckoutGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession>;
}
