//! Payment Gateway Orders
//!
//! Implementation of `OrderService` over the Razorpay Orders API. A payment
//! made against an order comes back signed, which [`SignatureVerifier`]
//! checks with the same key secret.

use std::time::Duration;

use async_trait::async_trait;
use checkout_core::service::ServiceResult;
use checkout_core::{CheckoutRequest, OrderService};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ensure_success, Result};
use crate::signature::SignatureVerifier;

/// Gateway API credentials
#[derive(Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    key_secret: String,
    pub api_url: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl RazorpayConfig {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            api_url: "https://api.razorpay.com/v1".into(),
            timeout_secs: 30,
        }
    }

    /// `None` unless both `RAZORPAY_KEY_ID` and `RAZORPAY_KEY_SECRET` are set
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|s| !s.is_empty());

        let mut config = Self::new(var("RAZORPAY_KEY_ID")?, var("RAZORPAY_KEY_SECRET")?);
        if let Some(url) = var("RAZORPAY_API_URL") {
            config.api_url = url;
        }
        Some(config)
    }
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
}

/// Orders API client
pub struct RazorpayClient {
    client: reqwest::Client,
    config: RazorpayConfig,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Verifier for payments made against this client's orders
    pub fn verifier(&self) -> SignatureVerifier {
        SignatureVerifier::new(self.config.key_secret.clone())
    }
}

/// Order creation body; the receipt is capped at the gateway's 40 characters
pub fn order_body(request: &CheckoutRequest, receipt: &str) -> Value {
    let receipt: String = receipt.chars().take(40).collect();
    json!({
        "amount": request.amount,
        "currency": request.currency,
        "receipt": receipt,
        "notes": request.notes,
    })
}

#[async_trait]
impl OrderService for RazorpayClient {
    async fn create_order(&self, request: &CheckoutRequest) -> ServiceResult<String> {
        let receipt = format!("rcpt_{}", uuid::Uuid::new_v4().simple());
        let response = self
            .client
            .post(format!("{}/orders", self.config.api_url.trim_end_matches('/')))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&order_body(request, &receipt))
            .send()
            .await
            .map_err(crate::RuntimeError::from)?;

        let order: OrderResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(crate::RuntimeError::from)?;

        tracing::debug!(order_id = %order.id, receipt = %receipt, "Created gateway order");
        Ok(order.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::payment::{Notes, Prefill, Theme};
    use checkout_core::PlanTier;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            key: "rzp_test_key".into(),
            amount: 599_900,
            currency: "INR".into(),
            name: "Ransh OTT".into(),
            description: "Lifetime Access — Pay once, enjoy forever".into(),
            image: None,
            order_id: None,
            prefill: Prefill::default(),
            theme: Theme {
                color: "#1A1A2E".into(),
            },
            notes: Notes {
                plan_tier: PlanTier::Lifetime,
                user_id: "abc123".into(),
            },
        }
    }

    #[test]
    fn test_order_body() {
        let body = order_body(&request(), "rcpt_0123456789abcdef0123456789abcdef0123456789");

        assert_eq!(body["amount"], 599_900);
        assert_eq!(body["currency"], "INR");
        assert_eq!(body["receipt"].as_str().unwrap().len(), 40);
        assert_eq!(body["notes"]["plan_tier"], "lifetime");
        assert_eq!(body["notes"]["user_id"], "abc123");
    }

    #[test]
    fn test_order_response() {
        let body = r#"{"id":"order_IluGWxBm9U8zJ8","entity":"order","amount":599900,"status":"created"}"#;
        let order: OrderResponse = serde_json::from_str(body).unwrap();
        assert_eq!(order.id, "order_IluGWxBm9U8zJ8");
    }

    #[test]
    fn test_secret_stays_out_of_debug() {
        let config = RazorpayConfig::new("rzp_test_key", "rzp_secret_9x");
        assert!(!format!("{config:?}").contains("rzp_secret_9x"));

        let client = RazorpayClient::new(config).unwrap();
        let signature = client.verifier().sign("order_1", "pay_1");
        assert_eq!(signature, SignatureVerifier::new("rzp_secret_9x").sign("order_1", "pay_1"));
    }
}
