//! Payment Widget Contract
//!
//! The hosted checkout widget runs outside this crate. It receives a
//! [`CheckoutRequest`] and reports back exactly one [`WidgetOutcome`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::model::PlanTier;

/// Options handed to the payment widget
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Public gateway key id
    pub key: String,

    /// Amount in minor units
    pub amount: i64,

    pub currency: String,

    /// Merchant name shown in the widget header
    pub name: String,

    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Gateway order the payment is made against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    pub prefill: Prefill,

    pub theme: Theme,

    pub notes: Notes,
}

/// Contact details pre-filled in the widget
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefill {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub color: String,
}

/// Metadata the gateway keeps with the payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notes {
    pub plan_tier: PlanTier,

    /// Target account id, never the anonymous session id
    pub user_id: String,
}

/// Success payload from the widget
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSuccess {
    #[serde(rename = "razorpay_payment_id")]
    pub payment_id: String,

    #[serde(rename = "razorpay_order_id", default)]
    pub order_id: Option<String>,

    #[serde(rename = "razorpay_signature", default)]
    pub signature: Option<String>,
}

/// Failure payload from the widget
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailure {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl PaymentFailure {
    /// Gateway wording, most specific first
    pub fn message(&self) -> String {
        [&self.description, &self.reason]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("Payment was declined. Please try again.")
            .to_string()
    }
}

/// What the widget reported
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WidgetOutcome {
    Succeeded(PaymentSuccess),
    Failed(PaymentFailure),
    Dismissed,
}

/// Hosted payment widget
///
/// `open` resolves once the widget's own UI has finished; the flow never polls.
#[async_trait]
pub trait PaymentWidget: Send + Sync {
    async fn open(&self, request: &CheckoutRequest) -> Result<WidgetOutcome, ServiceError>;
}
