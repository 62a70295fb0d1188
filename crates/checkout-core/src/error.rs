//! Error Types

use thiserror::Error;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Failure reported by an external collaborator (identity, store, widget)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Request never got a usable response
    #[error("Network error: {0}")]
    Transport(String),

    /// Service answered and refused; the message is passed through as-is
    #[error("{0}")]
    Rejected(String),

    /// Response could not be decoded
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Identity could not be established. Blocks every further action.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No target user id in the query parameters
    #[error("Missing User ID. Please open from the App.")]
    MissingUserId,

    /// Token exchange or anonymous sign-in failed
    #[error("Auth Error: {0}")]
    Exchange(#[source] ServiceError),

    /// Identity service answered without a user
    #[error("Authentication failed (No user).")]
    NoSession,
}

/// Payment did not go through. The user may pick a plan again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Gateway declined; carries the gateway's own wording
    #[error("{0}")]
    Declined(String),

    /// Widget closed before completion
    #[error("Payment was cancelled before completion.")]
    Dismissed,

    /// Widget could not be opened
    #[error("Could not open payment gateway. Please try again.")]
    GatewayUnavailable(String),

    /// Success callback failed gateway signature verification
    #[error("Payment {payment_id} could not be verified. Please try again.")]
    SignatureMismatch { payment_id: String },
}

/// Which of the two post-payment writes failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStage {
    AccountUpdate,
    PaymentRecord,
}

impl std::fmt::Display for WriteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccountUpdate => f.write_str("account update"),
            Self::PaymentRecord => f.write_str("payment record"),
        }
    }
}

/// Money moved upstream but the subscription was not recorded.
///
/// The message always carries the payment id so support can reconcile by hand.
#[derive(Error, Debug)]
#[error(
    "Payment succeeded but subscription activation failed. Please contact support with payment ID: {payment_id}"
)]
pub struct PersistenceError {
    pub payment_id: String,
    pub stage: WriteStage,
    #[source]
    pub source: ServiceError,
}

/// Checkout error types
#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Plan tier not offered
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),

    /// Operation not valid in the current flow state
    #[error("Cannot {action} while checkout is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CheckoutError {
    /// Whether the user can carry on in the same flow (pick a plan again)
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Payment(_) | Self::UnknownPlan(_))
    }

    /// Payment id that must be preserved for manual reconciliation
    pub fn unreconciled_payment_id(&self) -> Option<&str> {
        match self {
            Self::Persistence(err) => Some(&err.payment_id),
            _ => None,
        }
    }

    /// Convert to a user-facing message
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(err) => err.to_string(),
            Self::Payment(PaymentError::Declined(msg)) if msg.trim().is_empty() => {
                "Payment was declined. Please try again.".into()
            }
            Self::Payment(err) => err.to_string(),
            Self::Persistence(err) => err.to_string(),
            Self::UnknownPlan(_) => "That plan is not available.".into(),
            Self::InvalidState { .. } => {
                "This checkout can no longer do that. Please reopen it from the App.".into()
            }
            Self::Config(_) => "Service configuration error.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_message_keeps_payment_id() {
        let err = CheckoutError::from(PersistenceError {
            payment_id: "pay_Q1w2E3".into(),
            stage: WriteStage::PaymentRecord,
            source: ServiceError::Transport("connection reset".into()),
        });

        assert!(err.user_message().contains("pay_Q1w2E3"));
        assert_eq!(err.unreconciled_payment_id(), Some("pay_Q1w2E3"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_exchange_error_is_verbatim() {
        let err = AuthError::Exchange(ServiceError::Rejected("INVALID_CUSTOM_TOKEN".into()));
        assert_eq!(err.to_string(), "Auth Error: INVALID_CUSTOM_TOKEN");
    }

    #[test]
    fn test_payment_errors_are_recoverable() {
        assert!(CheckoutError::from(PaymentError::Dismissed).is_recoverable());
        assert!(!CheckoutError::from(AuthError::MissingUserId).is_recoverable());
    }
}
