//! # checkout-core
//!
//! Checkout flow for the external subscription page: identity resolution,
//! plan catalog, payment widget delegation and subscription persistence.
//!
//! ## Flow
//!
//! ```text
//! ┌────────────────┐   ┌───────┐   ┌─────────────────┐   ┌─────────┐
//! │ Authenticating │──▶│ Ready │──▶│ AwaitingPayment │──▶│ Settled │
//! └────────────────┘   └───────┘   └─────────────────┘   └─────────┘
//!         │                           │   ▲        │
//!         ▼                           ▼   │        ▼
//!   ┌────────────┐          ┌───────────────┐   ┌──────────────┐
//!   │ AuthFailed │          │ PaymentFailed │   │ Unreconciled │
//!   └────────────┘          └───────────────┘   └──────────────┘
//! ```
//!
//! Every external system (identity service, document store, plan
//! configuration, payment widget, mobile shell) sits behind a trait so the
//! controller can run against HTTP collaborators in production and the
//! in-memory ones from [`memory`] in tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_core::{CheckoutFlow, CheckoutParams, Collaborators, CheckoutSettings};
//!
//! let mut flow = CheckoutFlow::new(collaborators, CheckoutSettings::from_env()?);
//! flow.authenticate(&params).await?;
//!
//! // Hand the request to the widget, then report its callback
//! let request = flow.select_plan("monthly")?;
//! let receipt = flow.payment_succeeded(success).await?;
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod flow;
pub mod handoff;
pub mod memory;
pub mod model;
pub mod params;
pub mod payment;
pub mod service;
pub mod session;

pub use catalog::PlanCatalog;
pub use config::CheckoutSettings;
pub use error::{AuthError, CheckoutError, PaymentError, PersistenceError, Result, ServiceError, WriteStage};
pub use flow::{CheckoutFlow, Collaborators, FlowState, Receipt};
pub use handoff::{AppReturnConfig, AppReturnTarget, HandoffAction, HandoffPlan, HandoffStep};
pub use model::{AccountUpdate, PaymentRecord, PlanDefinition, PlanTier, SubscriptionStatus};
pub use params::CheckoutParams;
pub use payment::{CheckoutRequest, PaymentFailure, PaymentSuccess, PaymentWidget, WidgetOutcome};
pub use service::{
    Clock, DocumentStore, IdentityGrant, IdentityService, OrderService, PlanOverride, PlanSource, SystemClock,
};
pub use session::{AuthenticatedSession, Credential, Profile, ProxySession, Session};
