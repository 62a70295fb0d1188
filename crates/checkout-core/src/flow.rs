//! Checkout Flow Controller
//!
//! One controller per checkout attempt. Each transition runs to completion
//! before the next event is accepted; nothing here retries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::PlanCatalog;
use crate::config::CheckoutSettings;
use crate::error::{AuthError, CheckoutError, PaymentError, PersistenceError, Result, ServiceError, WriteStage};
use crate::handoff::HandoffPlan;
use crate::model::{AccountUpdate, PaymentRecord, PlanDefinition, PlanTier};
use crate::params::CheckoutParams;
use crate::payment::{CheckoutRequest, Notes, PaymentFailure, PaymentSuccess, PaymentWidget, Prefill, Theme, WidgetOutcome};
use crate::service::{Clock, DocumentStore, IdentityService, OrderService, PlanSource, SystemClock};
use crate::session::{AuthenticatedSession, Credential, ProxySession, Session};

/// External systems a flow talks to
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityService>,
    pub plans: Arc<dyn PlanSource>,
    pub store: Arc<dyn DocumentStore>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        plans: Arc<dyn PlanSource>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            identity,
            plans,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Proof of a recorded subscription
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub user_id: String,
    pub record_id: String,
    pub payment_id: String,
    pub plan: PlanTier,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Where a checkout currently stands
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    Authenticating,
    Ready,
    AwaitingPayment {
        plan: PlanDefinition,
        /// Gateway order the payment must belong to, when one was placed
        order_id: Option<String>,
    },
    Settled { receipt: Receipt },
    AuthFailed { message: String },
    PaymentFailed { message: String },

    /// Paid upstream but not recorded; needs manual reconciliation
    Unreconciled { payment_id: String, message: String },
}

impl FlowState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
            Self::AwaitingPayment { .. } => "awaiting payment",
            Self::Settled { .. } => "settled",
            Self::AuthFailed { .. } => "auth failed",
            Self::PaymentFailed { .. } => "payment failed",
            Self::Unreconciled { .. } => "unreconciled",
        }
    }

    /// No further transition is possible
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Settled { .. } | Self::AuthFailed { .. } | Self::Unreconciled { .. }
        )
    }
}

/// Checkout state machine
pub struct CheckoutFlow {
    collaborators: Collaborators,
    settings: CheckoutSettings,
    state: FlowState,
    session: Option<Session>,
    catalog: PlanCatalog,
}

impl CheckoutFlow {
    pub fn new(collaborators: Collaborators, settings: CheckoutSettings) -> Self {
        Self {
            collaborators,
            settings,
            state: FlowState::Authenticating,
            session: None,
            catalog: PlanCatalog::builtin(),
        }
    }

    pub const fn state(&self) -> &FlowState {
        &self.state
    }

    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub const fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub const fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Resolve the caller's identity and load plan prices.
    ///
    /// A missing `uid` fails before the identity service is contacted.
    pub async fn authenticate(&mut self, params: &CheckoutParams) -> Result<&Session> {
        if !matches!(self.state, FlowState::Authenticating) {
            return Err(self.invalid("authenticate"));
        }

        match self.establish_session(params).await {
            Ok(session) => {
                self.catalog = PlanCatalog::load(self.collaborators.plans.as_ref(), session.credential()).await;
                self.state = FlowState::Ready;

                tracing::info!(
                    target_id = %session.target_id(),
                    proxy = session.is_proxy(),
                    identifier = %session.profile().identifier,
                    "Checkout session ready"
                );
                Ok(&*self.session.insert(session))
            }
            Err(err) => {
                tracing::warn!(error = %err, "Checkout authentication failed");
                self.state = FlowState::AuthFailed {
                    message: err.to_string(),
                };
                Err(err.into())
            }
        }
    }

    async fn establish_session(&self, params: &CheckoutParams) -> std::result::Result<Session, AuthError> {
        let target_id = params.target_uid().ok_or(AuthError::MissingUserId)?;
        let identity = self.collaborators.identity.as_ref();

        if let Some(token) = params.token() {
            let grant = identity
                .sign_in_with_custom_token(token)
                .await
                .map_err(AuthError::Exchange)?;
            if grant.uid.is_empty() {
                return Err(AuthError::NoSession);
            }
            if grant.uid != target_id {
                tracing::warn!(
                    token_uid = %grant.uid,
                    url_uid = %target_id,
                    "Token user differs from uid parameter; crediting token user"
                );
            }

            Ok(Session::Authenticated(AuthenticatedSession {
                profile: params.profile_for(&grant),
                id: grant.uid,
                credential: Credential::new(grant.id_token),
            }))
        } else {
            let grant = identity
                .sign_in_anonymously()
                .await
                .map_err(AuthError::Exchange)?;
            if grant.uid.is_empty() {
                return Err(AuthError::NoSession);
            }

            Ok(Session::Proxy(ProxySession {
                session_id: grant.uid,
                target_id: target_id.to_string(),
                credential: Credential::new(grant.id_token),
                profile: params.profile(),
            }))
        }
    }

    /// Pick a plan and build the widget request.
    ///
    /// Allowed when ready, or again after a failed payment.
    pub fn select_plan(&mut self, tier: &str) -> Result<CheckoutRequest> {
        if !matches!(self.state, FlowState::Ready | FlowState::PaymentFailed { .. }) {
            return Err(self.invalid("select a plan"));
        }

        let plan = tier
            .parse::<PlanTier>()
            .ok()
            .and_then(|t| self.catalog.get(t))
            .cloned()
            .ok_or_else(|| CheckoutError::UnknownPlan(tier.to_string()))?;
        let session = self.session.as_ref().ok_or(AuthError::NoSession)?;

        let request = checkout_request(&self.settings, session, &plan);
        tracing::info!(
            plan = %plan.tier,
            amount = plan.amount,
            target_id = %session.target_id(),
            "Opening payment widget"
        );

        self.state = FlowState::AwaitingPayment { plan, order_id: None };
        Ok(request)
    }

    /// Place a gateway order for the pending payment and attach it to
    /// `request`. The gateway only signs payments made against an order.
    ///
    /// Failure ends the attempt as `GatewayUnavailable`; the user may pick
    /// again.
    pub async fn place_order(&mut self, request: &mut CheckoutRequest, orders: &dyn OrderService) -> Result<()> {
        if !matches!(self.state, FlowState::AwaitingPayment { order_id: None, .. }) {
            return Err(self.invalid("place an order"));
        }

        match orders.create_order(request).await {
            Ok(id) => {
                tracing::info!(order_id = %id, amount = request.amount, "Gateway order placed");
                if let FlowState::AwaitingPayment { order_id, .. } = &mut self.state {
                    *order_id = Some(id.clone());
                }
                request.order_id = Some(id);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Gateway order creation failed");
                Err(self.reject_payment(PaymentError::GatewayUnavailable(e.to_string()))?.into())
            }
        }
    }

    /// Order the pending payment must belong to
    pub fn pending_order_id(&self) -> Option<&str> {
        match &self.state {
            FlowState::AwaitingPayment { order_id, .. } => order_id.as_deref(),
            _ => None,
        }
    }

    /// Record a successful payment: update the account, then append the
    /// payment record.
    ///
    /// The two writes are not atomic. If the second fails the account stays
    /// updated without a matching record; either failure leaves the flow
    /// `Unreconciled` with the payment id in the error.
    pub async fn payment_succeeded(&mut self, payment: PaymentSuccess) -> Result<Receipt> {
        let FlowState::AwaitingPayment { plan, .. } = &self.state else {
            return Err(self.invalid("confirm a payment"));
        };
        let plan = plan.clone();

        let started_at = self.collaborators.clock.now();
        let Some(expires_at) = plan.expires_at(started_at) else {
            let source = ServiceError::Other(format!(
                "subscription end out of range for {} days",
                plan.duration_days
            ));
            return Err(self.unreconciled(payment.payment_id, WriteStage::AccountUpdate, source));
        };

        let session = self.session.as_ref().ok_or(AuthError::NoSession)?;
        let update = AccountUpdate::activate(plan.tier, &payment, started_at, expires_at);
        let record = PaymentRecord::new(session, &plan, &payment, &self.settings.currency, started_at, expires_at);

        tracing::info!(
            payment_id = %payment.payment_id,
            target_id = %session.target_id(),
            plan = %plan.tier,
            expires_at = %record.expires_at,
            "Payment succeeded, activating subscription"
        );

        let outcome = persist(self.collaborators.store.as_ref(), session, &update, &record).await;
        match outcome {
            Ok(record_id) => {
                let receipt = Receipt {
                    user_id: record.user_id,
                    record_id,
                    payment_id: payment.payment_id,
                    plan: plan.tier,
                    started_at,
                    expires_at: record.expires_at,
                };
                tracing::info!(record_id = %receipt.record_id, "Subscription activated");

                self.state = FlowState::Settled {
                    receipt: receipt.clone(),
                };
                Ok(receipt)
            }
            Err((stage, source)) => Err(self.unreconciled(payment.payment_id, stage, source)),
        }
    }

    /// Paid but not recorded: keep the payment id for reconciliation
    fn unreconciled(&mut self, payment_id: String, stage: WriteStage, source: ServiceError) -> CheckoutError {
        tracing::error!(
            payment_id = %payment_id,
            stage = %stage,
            error = %source,
            "Subscription activation failed after payment"
        );

        let err = PersistenceError {
            payment_id,
            stage,
            source,
        };
        self.state = FlowState::Unreconciled {
            payment_id: err.payment_id.clone(),
            message: err.to_string(),
        };
        err.into()
    }

    /// Widget reported a failed payment. Nothing is written.
    pub fn payment_failed(&mut self, failure: &PaymentFailure) -> Result<PaymentError> {
        self.reject_payment(PaymentError::Declined(failure.message()))
    }

    /// Widget was closed before completing. Nothing is written.
    pub fn payment_dismissed(&mut self) -> Result<PaymentError> {
        self.reject_payment(PaymentError::Dismissed)
    }

    /// End the pending payment with `error`; returns it for display
    pub fn reject_payment(&mut self, error: PaymentError) -> Result<PaymentError> {
        if !matches!(self.state, FlowState::AwaitingPayment { .. }) {
            return Err(self.invalid("report a payment failure"));
        }

        tracing::warn!(error = %error, "Payment not completed");
        self.state = FlowState::PaymentFailed {
            message: error.to_string(),
        };
        Ok(error)
    }

    /// Select `tier`, hand the request to `widget` and settle its outcome
    pub async fn checkout(&mut self, tier: &str, widget: &dyn PaymentWidget) -> Result<Receipt> {
        let request = self.select_plan(tier)?;

        let outcome = match widget.open(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Payment widget error");
                return Err(self.reject_payment(PaymentError::GatewayUnavailable(e.to_string()))?.into());
            }
        };

        match outcome {
            WidgetOutcome::Succeeded(payment) => self.payment_succeeded(payment).await,
            WidgetOutcome::Failed(failure) => Err(self.payment_failed(&failure)?.into()),
            WidgetOutcome::Dismissed => Err(self.payment_dismissed()?.into()),
        }
    }

    /// App-return sequence, available once settled
    pub fn handoff(&self) -> Result<HandoffPlan> {
        match self.state {
            FlowState::Settled { .. } => Ok(HandoffPlan::for_app(&self.settings.app_return)),
            _ => Err(self.invalid("return to the app")),
        }
    }

    const fn invalid(&self, action: &'static str) -> CheckoutError {
        CheckoutError::InvalidState {
            action,
            state: self.state.name(),
        }
    }
}

fn checkout_request(settings: &CheckoutSettings, session: &Session, plan: &PlanDefinition) -> CheckoutRequest {
    let profile = session.profile();

    CheckoutRequest {
        key: settings.key_id.clone(),
        amount: plan.amount,
        currency: settings.currency.clone(),
        name: settings.merchant_name.clone(),
        description: plan.checkout_description(),
        image: settings.image.clone(),
        order_id: None,
        prefill: Prefill {
            email: profile.email.clone().unwrap_or_default(),
            name: profile.display_name.clone(),
            contact: profile.phone.clone(),
        },
        theme: Theme {
            color: settings.theme_color.clone(),
        },
        notes: Notes {
            plan_tier: plan.tier,
            user_id: session.target_id().to_string(),
        },
    }
}

async fn persist(
    store: &dyn DocumentStore,
    session: &Session,
    update: &AccountUpdate,
    record: &PaymentRecord,
) -> std::result::Result<String, (WriteStage, ServiceError)> {
    store
        .update_account(session.credential(), session.target_id(), update)
        .await
        .map_err(|e| (WriteStage::AccountUpdate, e))?;

    store
        .insert_payment(session.credential(), record)
        .await
        .map_err(|e| (WriteStage::PaymentRecord, e))
}
