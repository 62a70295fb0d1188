//! Collaborator Contracts
//!
//! Traits for the external systems the flow talks to. HTTP implementations
//! live in `checkout-runtime`; in-memory ones in [`crate::memory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::model::{AccountUpdate, PaymentRecord};
use crate::payment::CheckoutRequest;
use crate::session::Credential;

/// Result type for collaborator calls
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// A signed-in identity returned by the identity service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityGrant {
    pub uid: String,
    pub id_token: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Identity service (custom token exchange, anonymous sign-in)
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_in_with_custom_token(&self, token: &str) -> ServiceResult<IdentityGrant>;

    async fn sign_in_anonymously(&self) -> ServiceResult<IdentityGrant>;
}

/// Remote override for one plan tier
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOverride {
    /// Raw tier key (document `tier` field or document id)
    pub tier: String,
    /// Price in minor units
    pub price: Option<i64>,
    pub duration_days: Option<u32>,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Read-only plan configuration collection
#[async_trait]
pub trait PlanSource: Send + Sync {
    async fn fetch_overrides(&self, credential: &Credential) -> ServiceResult<Vec<PlanOverride>>;
}

/// Remote document store
///
/// The two writes are independent; there is no transaction spanning them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Update an existing user document. Never creates one.
    async fn update_account(
        &self,
        credential: &Credential,
        user_id: &str,
        update: &AccountUpdate,
    ) -> ServiceResult<()>;

    /// Append a payment record, returning its document id
    async fn insert_payment(&self, credential: &Credential, record: &PaymentRecord) -> ServiceResult<String>;
}

/// Gateway order creation
///
/// An order fixes the amount server-side; the gateway then signs the
/// payment made against it.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Create an order for `request`, returning the order id
    async fn create_order(&self, request: &CheckoutRequest) -> ServiceResult<String>;
}

/// Time source for payment issue timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
