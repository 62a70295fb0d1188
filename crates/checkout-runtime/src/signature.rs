//! Gateway Signature Verification
//!
//! The gateway signs `order_id|payment_id` with the merchant key secret
//! (HMAC-SHA256, hex). A success callback without an order id carries no
//! signature and never verifies.

use checkout_core::PaymentSuccess;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies success callbacks against the merchant key secret
pub struct SignatureVerifier {
    key_secret: String,
}

impl SignatureVerifier {
    pub fn new(key_secret: impl Into<String>) -> Self {
        Self {
            key_secret: key_secret.into(),
        }
    }

    fn mac(&self, order_id: &str, payment_id: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.key_secret.as_bytes()).ok()?;
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        Some(mac)
    }

    /// Hex signature the gateway would send for this pair
    pub fn sign(&self, order_id: &str, payment_id: &str) -> Option<String> {
        self.mac(order_id, payment_id)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time check of the callback's signature
    pub fn verify(&self, payment: &PaymentSuccess) -> bool {
        let (Some(order_id), Some(signature)) = (&payment.order_id, &payment.signature) else {
            return false;
        };
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };

        self.mac(order_id, &payment.payment_id)
            .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
    }
}
