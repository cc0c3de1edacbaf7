use anyhow::{anyhow, Result};
use serde_json::json;

use crate::gateways::{CheckoutGateway, CheckoutRequest, CheckoutSession};

/// Real gateway adapter: creates a hosted checkout session over HTTP. Any
/// transport or non-2xx outcome surfaces as an error; the caller keeps the
/// PENDING payment around either way.
pub struct HostedCheckoutGateway {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

#[async_trait::async_trait]
impl CheckoutGateway for HostedCheckoutGateway {
    fn name(&self) -> &'static str {
        "hosted"
    }

    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        let url = format!("{}/v1/checkout_sessions", self.base_url);
        let body = json!({
            "merchant_order_id": request.order_ref,
            "amount_cents": request.amount_cents,
            "currency": request.currency,
            "description": request.course_title,
            "customer_ref": request.user_id,
        });

        let resp = self
            .client
            .post(url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&body)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("gateway timeout")
                } else {
                    anyhow!("gateway unreachable: {e}")
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "gateway rejected checkout: HTTP_{} {}",
                status.as_u16(),
                text.chars().take(200).collect::<String>()
            ));
        }

        let raw: serde_json::Value = resp.json().await.unwrap_or_default();
        let checkout_url = raw
            .get("checkout_url")
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| anyhow!("gateway response missing checkout_url"))?;

        Ok(CheckoutSession {
            checkout_url,
            gateway_order_id: raw
                .get("id")
                .and_then(|v| v.as_str())
                .map(ToString::to_string),
            raw_response: raw,
        })
    }
}
