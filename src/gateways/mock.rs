use anyhow::{anyhow, Result};
use serde_json::json;

use crate::gateways::{CheckoutGateway, CheckoutRequest, CheckoutSession};

/// Test double for the checkout boundary. Behavior is a switch string so
/// failure paths can be exercised without a network.
pub struct MockCheckoutGateway {
    pub behavior: String,
}

impl MockCheckoutGateway {
    pub fn succeeding() -> Self {
        MockCheckoutGateway {
            behavior: "ALWAYS_SUCCESS".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl CheckoutGateway for MockCheckoutGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        match self.behavior.as_str() {
            "ALWAYS_ERROR" => Err(anyhow!("mock gateway error")),
            "ALWAYS_TIMEOUT" => Err(anyhow!("gateway timeout")),
            _ => Ok(CheckoutSession {
                checkout_url: format!("https://checkout.test/session/{}", request.order_ref),
                gateway_order_id: Some(format!("mock_order_{}", request.order_ref)),
                raw_response: json!({"mock": true, "merchant_order_id": request.order_ref}),
            }),
        }
    }
}
