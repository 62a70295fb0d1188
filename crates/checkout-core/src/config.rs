//! Checkout Settings
//!
//! Merchant presentation and gateway key, read from the environment.

use crate::error::{CheckoutError, Result};
use crate::handoff::AppReturnConfig;

/// Merchant and gateway settings for checkout requests
#[derive(Clone, Debug)]
pub struct CheckoutSettings {
    /// Public gateway key id
    pub key_id: String,

    /// Merchant name shown in the widget
    pub merchant_name: String,

    /// ISO currency code for every plan
    pub currency: String,

    /// Logo shown in the widget
    pub image: Option<String>,

    /// Widget accent color
    pub theme_color: String,

    /// How to hand control back to the app
    pub app_return: AppReturnConfig,
}

impl CheckoutSettings {
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            merchant_name: "Ransh OTT".into(),
            currency: "INR".into(),
            image: Some("logo.png".into()),
            theme_color: "#1A1A2E".into(),
            app_return: AppReturnConfig::default(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let key_id = std::env::var("RAZORPAY_KEY_ID")
            .map_err(|_| CheckoutError::Config("RAZORPAY_KEY_ID not set".into()))?;

        let mut settings = Self::new(key_id);
        if let Ok(name) = std::env::var("MERCHANT_NAME") {
            settings.merchant_name = name;
        }
        if let Ok(currency) = std::env::var("CHECKOUT_CURRENCY") {
            settings.currency = currency.to_uppercase();
        }
        if let Ok(image) = std::env::var("MERCHANT_IMAGE") {
            settings.image = Some(image).filter(|s| !s.is_empty());
        }
        if let Ok(color) = std::env::var("THEME_COLOR") {
            settings.theme_color = color;
        }
        settings.app_return = AppReturnConfig::from_env();

        Ok(settings)
    }
}
