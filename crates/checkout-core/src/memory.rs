//! In-Memory Collaborators
//!
//! Stand-ins for the identity service, plan configuration, document store,
//! gateway orders, payment widget and app shell. Used for local development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ServiceError;
use crate::handoff::{AppReturnTarget, HandoffAction};
use crate::model::{AccountUpdate, PaymentRecord};
use crate::payment::{CheckoutRequest, PaymentWidget, WidgetOutcome};
use crate::service::{
    Clock, DocumentStore, IdentityGrant, IdentityService, OrderService, PlanOverride, PlanSource, ServiceResult,
};
use crate::session::Credential;

fn poisoned<T>(_: PoisonError<T>) -> ServiceError {
    ServiceError::Other("in-memory lock poisoned".into())
}

/// Identity service with a fixed table of custom tokens
#[derive(Default)]
pub struct MemoryIdentity {
    tokens: HashMap<String, IdentityGrant>,
    failure: Option<ServiceError>,
    calls: AtomicUsize,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as a custom token for `grant`
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, grant: IdentityGrant) -> Self {
        self.tokens.insert(token.into(), grant);
        self
    }

    /// Fail every sign-in with `error`
    pub fn failing(error: ServiceError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Number of sign-in attempts received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> ServiceResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failure.clone().map_or(Ok(()), Err)
    }
}

#[async_trait]
impl IdentityService for MemoryIdentity {
    async fn sign_in_with_custom_token(&self, token: &str) -> ServiceResult<IdentityGrant> {
        self.check()?;
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| ServiceError::Rejected("INVALID_CUSTOM_TOKEN".into()))
    }

    async fn sign_in_anonymously(&self) -> ServiceResult<IdentityGrant> {
        self.check()?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        Ok(IdentityGrant {
            uid: format!("anon_{}", &id[..12]),
            id_token: format!("anon-token-{id}"),
            email: None,
            display_name: None,
            phone: None,
        })
    }
}

/// Plan source returning a fixed answer
pub struct StaticPlanSource {
    answer: ServiceResult<Vec<PlanOverride>>,
}

impl StaticPlanSource {
    pub const fn new(overrides: Vec<PlanOverride>) -> Self {
        Self { answer: Ok(overrides) }
    }

    pub fn unreachable() -> Self {
        Self {
            answer: Err(ServiceError::Transport("plans collection unreachable".into())),
        }
    }
}

impl Default for StaticPlanSource {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl PlanSource for StaticPlanSource {
    async fn fetch_overrides(&self, _credential: &Credential) -> ServiceResult<Vec<PlanOverride>> {
        self.answer.clone()
    }
}

/// Document store over in-process maps
///
/// Accounts must be seeded with [`MemoryDocumentStore::with_account`]; updates
/// to unknown accounts fail the way a remote update of a missing document does.
#[derive(Default)]
pub struct MemoryDocumentStore {
    accounts: RwLock<HashMap<String, Option<AccountUpdate>>>,
    payments: RwLock<Vec<(String, PaymentRecord)>>,
    fail_updates: AtomicBool,
    fail_inserts: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing user document
    #[must_use]
    pub fn with_account(self, user_id: impl Into<String>) -> Self {
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.into(), None);
        self
    }

    pub fn fail_account_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_payment_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Latest subscription fields written for `user_id`
    pub fn account(&self, user_id: &str) -> Option<AccountUpdate> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
            .flatten()
    }

    pub fn payments(&self) -> Vec<PaymentRecord> {
        self.payments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Successful writes of either kind
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn update_account(
        &self,
        _credential: &Credential,
        user_id: &str,
        update: &AccountUpdate,
    ) -> ServiceResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(ServiceError::Transport("document store unavailable".into()));
        }

        let mut accounts = self.accounts.write().map_err(poisoned)?;
        let Some(slot) = accounts.get_mut(user_id) else {
            return Err(ServiceError::Rejected(format!("NOT_FOUND: No document to update: users/{user_id}")));
        };
        *slot = Some(update.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn insert_payment(&self, _credential: &Credential, record: &PaymentRecord) -> ServiceResult<String> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(ServiceError::Transport("document store unavailable".into()));
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        self.payments
            .write()
            .map_err(poisoned)?
            .push((id.clone(), record.clone()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }
}

/// Gateway order book
#[derive(Default)]
pub struct MemoryOrders {
    orders: Mutex<Vec<(String, i64)>>,
    fail: AtomicBool,
}

impl MemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_orders(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Order ids with their amounts, oldest first
    pub fn orders(&self) -> Vec<(String, i64)> {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl OrderService for MemoryOrders {
    async fn create_order(&self, request: &CheckoutRequest) -> ServiceResult<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Transport("gateway unreachable".into()));
        }

        let mut orders = self.orders.lock().map_err(poisoned)?;
        let id = format!("order_{:014}", orders.len() + 1);
        orders.push((id.clone(), request.amount));
        Ok(id)
    }
}

/// Clock stuck at one instant
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Widget that always reports the same outcome and remembers what it was asked
pub struct ScriptedWidget {
    outcome: ServiceResult<WidgetOutcome>,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl ScriptedWidget {
    pub const fn new(outcome: WidgetOutcome) -> Self {
        Self {
            outcome: Ok(outcome),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Widget that cannot be opened
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(ServiceError::Other(reason.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PaymentWidget for ScriptedWidget {
    async fn open(&self, request: &CheckoutRequest) -> ServiceResult<WidgetOutcome> {
        self.requests.lock().map_err(poisoned)?.push(request.clone());
        self.outcome.clone()
    }
}

/// App-return target that records what it was told
#[derive(Default)]
pub struct RecordingTarget {
    events: Mutex<Vec<HandoffAction>>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HandoffAction> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, action: HandoffAction) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
    }
}

impl AppReturnTarget for RecordingTarget {
    fn redirect(&self, url: &str) {
        self.push(HandoffAction::Redirect { url: url.to_string() });
    }

    fn show_message(&self, text: &str) {
        self.push(HandoffAction::ShowMessage { text: text.to_string() });
    }
}
