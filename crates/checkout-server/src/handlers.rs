//! HTTP Handlers
//!
//! The page loads `start`, which authenticates and creates a flow. The
//! returned `flow_id` addresses every later call: plan selection (answered
//! with the widget options) and the widget's callbacks.
//!
//! With a gateway key secret configured, selection places a gateway order
//! and a success callback is only accepted with a valid signature for that
//! order.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use checkout_core::{
    CheckoutError, CheckoutFlow, CheckoutParams, CheckoutRequest, FlowState, HandoffPlan,
    PaymentError, PaymentFailure, PaymentSuccess, PlanDefinition, Receipt,
};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub checkout_configured: bool,
    pub signature_verification: bool,
    pub active_flows: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

/// Plan as listed on the page
#[derive(Debug, Serialize, Deserialize)]
pub struct PlanView {
    pub tier: String,
    pub name: String,
    pub description: String,
    pub amount: i64,
    pub currency: String,
    pub display_price: String,
    pub duration_days: u32,
}

impl PlanView {
    fn new(plan: &PlanDefinition, currency: &str) -> Self {
        Self {
            tier: plan.tier.to_string(),
            name: plan.name.clone(),
            description: plan.description.clone(),
            amount: plan.amount,
            currency: currency.to_string(),
            display_price: plan.display_price(),
            duration_days: plan.duration_days,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub flow_id: String,
    pub display_name: String,
    pub identifier: String,
    pub plans: Vec<PlanView>,
}

#[derive(Debug, Deserialize)]
pub struct SelectPlanRequest {
    pub plan: String,
}

/// Body of the widget's `payment.failed` event
#[derive(Debug, Deserialize)]
pub struct FailureCallback {
    #[serde(default)]
    pub error: PaymentFailure,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub receipt: Receipt,
    pub handoff: HandoffPlan,
}

#[derive(Debug, Serialize)]
pub struct OutcomeResponse {
    pub state: FlowState,
    pub message: String,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Checkout is not configured")]
    Disabled,

    #[error("Checkout session not found. Please reopen it from the App.")]
    FlowNotFound,

    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Disabled => (StatusCode::SERVICE_UNAVAILABLE, "CHECKOUT_DISABLED"),
            Self::FlowNotFound => (StatusCode::NOT_FOUND, "FLOW_NOT_FOUND"),
            Self::Checkout(err) => match err {
                CheckoutError::Auth(_) => (StatusCode::UNAUTHORIZED, "AUTH_FAILED"),
                CheckoutError::Payment(_) => (StatusCode::PAYMENT_REQUIRED, "PAYMENT_FAILED"),
                CheckoutError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ACTIVATION_FAILED"),
                CheckoutError::UnknownPlan(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_PLAN"),
                CheckoutError::InvalidState { .. } => (StatusCode::CONFLICT, "INVALID_STATE"),
                CheckoutError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let (error, payment_id) = match &self {
            Self::Checkout(err) => (
                err.user_message(),
                err.unreconciled_payment_id().map(str::to_string),
            ),
            other => (other.to_string(), None),
        };

        if status.is_server_error() {
            tracing::error!(code, error = %self, "Checkout request failed");
        }

        (
            status,
            Json(ErrorResponse {
                error,
                code: code.into(),
                payment_id,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn find_flow(state: &AppState, flow_id: &Uuid) -> Result<Arc<Mutex<CheckoutFlow>>, ApiError> {
    state.flows.get(flow_id).await.ok_or(ApiError::FlowNotFound)
}

fn plan_views(flow: &CheckoutFlow) -> Vec<PlanView> {
    let currency = &flow.settings().currency;
    flow.catalog()
        .plans()
        .iter()
        .map(|plan| PlanView::new(plan, currency))
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        checkout_configured: state.collaborators.is_some(),
        signature_verification: state.signing.is_some(),
        active_flows: state.flows.len().await,
    })
}

/// Authenticate from the page's query parameters and open a flow
pub async fn start_checkout(
    State(state): State<AppState>,
    Query(params): Query<CheckoutParams>,
) -> ApiResult<StartResponse> {
    let collaborators = state.collaborators.clone().ok_or(ApiError::Disabled)?;
    let mut flow = CheckoutFlow::new(collaborators, (*state.settings).clone());

    let profile = flow.authenticate(&params).await?.profile().clone();
    let plans = plan_views(&flow);
    let flow_id = state.flows.insert(flow).await;

    Ok(Json(StartResponse {
        flow_id: flow_id.to_string(),
        display_name: profile.display_name,
        identifier: profile.identifier,
        plans,
    }))
}

/// Plans with current prices
pub async fn list_plans(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> ApiResult<Vec<PlanView>> {
    let flow = find_flow(&state, &flow_id).await?;
    let flow = flow.lock().await;
    Ok(Json(plan_views(&flow)))
}

/// Select a plan; answers with the options for the payment widget
pub async fn select_plan(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
    Json(payload): Json<SelectPlanRequest>,
) -> ApiResult<CheckoutRequest> {
    let flow = find_flow(&state, &flow_id).await?;
    let mut flow = flow.lock().await;

    let mut request = flow.select_plan(&payload.plan)?;
    if let Some(signing) = &state.signing {
        flow.place_order(&mut request, signing.orders.as_ref()).await?;
    }
    Ok(Json(request))
}

/// Widget success callback
pub async fn payment_success(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
    Json(payment): Json<PaymentSuccess>,
) -> ApiResult<SuccessResponse> {
    let flow = find_flow(&state, &flow_id).await?;
    let mut flow = flow.lock().await;

    if let Some(signing) = &state.signing {
        let genuine = flow
            .pending_order_id()
            .is_some_and(|order_id| payment.order_id.as_deref() == Some(order_id))
            && signing.verifier.verify(&payment);

        if !genuine {
            tracing::warn!(payment_id = %payment.payment_id, "Rejected callback without a valid signature");
            let err = flow.reject_payment(PaymentError::SignatureMismatch {
                payment_id: payment.payment_id.clone(),
            })?;
            return Err(CheckoutError::from(err).into());
        }
    }

    let receipt = flow.payment_succeeded(payment).await?;
    let handoff = flow.handoff()?;

    Ok(Json(SuccessResponse { receipt, handoff }))
}

/// Widget failure callback
pub async fn payment_failure(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
    Json(callback): Json<FailureCallback>,
) -> ApiResult<OutcomeResponse> {
    let flow = find_flow(&state, &flow_id).await?;
    let mut flow = flow.lock().await;

    let error = flow.payment_failed(&callback.error)?;
    Ok(Json(OutcomeResponse {
        state: flow.state().clone(),
        message: error.to_string(),
    }))
}

/// Widget closed without paying
pub async fn payment_dismissed(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> ApiResult<OutcomeResponse> {
    let flow = find_flow(&state, &flow_id).await?;
    let mut flow = flow.lock().await;

    let error = flow.payment_dismissed()?;
    Ok(Json(OutcomeResponse {
        state: flow.state().clone(),
        message: error.to_string(),
    }))
}

/// App-return sequence for a settled checkout
pub async fn return_to_app(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> ApiResult<HandoffPlan> {
    let flow = find_flow(&state, &flow_id).await?;
    let flow = flow.lock().await;
    Ok(Json(flow.handoff()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::router;
    use crate::state::{FlowRegistry, SignedOrders};

    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::Router;
    use checkout_core::memory::{MemoryDocumentStore, MemoryIdentity, MemoryOrders, StaticPlanSource};
    use checkout_core::{CheckoutSettings, Collaborators};
    use checkout_runtime::SignatureVerifier;
    use tower::ServiceExt;

    const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../static");
    const KEY_SECRET: &str = "rzp_secret";

    struct TestApp {
        router: Router,
        store: Arc<MemoryDocumentStore>,
        orders: Arc<MemoryOrders>,
    }

    fn app(signed: bool) -> TestApp {
        let store = Arc::new(MemoryDocumentStore::new().with_account("abc123"));
        let orders = Arc::new(MemoryOrders::new());
        let collaborators = Collaborators::new(
            Arc::new(MemoryIdentity::new()),
            Arc::new(StaticPlanSource::unreachable()),
            store.clone(),
        );
        let signing = signed.then(|| SignedOrders {
            orders: orders.clone(),
            verifier: Arc::new(SignatureVerifier::new(KEY_SECRET)),
        });
        let state = AppState {
            collaborators: Some(collaborators),
            settings: Arc::new(CheckoutSettings::new("rzp_test_key")),
            signing,
            flows: Arc::new(FlowRegistry::new()),
        };

        TestApp {
            router: router(state, STATIC_DIR),
            store,
            orders,
        }
    }

    async fn call(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or_default();
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn start(router: &Router) -> String {
        let (status, body) = call(router, get("/api/checkout/start?uid=abc123&email=asha%40example.com")).await;
        assert_eq!(status, StatusCode::OK);
        body["flow_id"].as_str().unwrap().to_string()
    }

    async fn select(router: &Router, flow_id: &str, plan: &str) -> serde_json::Value {
        let (status, request) = call(
            router,
            post(&format!("/api/checkout/{flow_id}/select"), serde_json::json!({ "plan": plan })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        request
    }

    #[tokio::test]
    async fn test_start_without_uid() {
        let app = app(false);
        let (status, body) = call(&app.router, get("/api/checkout/start")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_FAILED");
        assert_eq!(body["error"], "Missing User ID. Please open from the App.");
    }

    #[tokio::test]
    async fn test_start_lists_default_plans() {
        let app = app(false);
        let (status, body) = call(&app.router, get("/api/checkout/start?uid=abc123&email=asha%40example.com")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["identifier"], "asha@example.com");
        assert_eq!(body["plans"][0]["amount"], 39_900);
        assert_eq!(body["plans"][0]["display_price"], "399");
        assert_eq!(body["plans"][1]["display_price"], "5,999");
    }

    #[tokio::test]
    async fn test_full_checkout() {
        let app = app(false);
        let flow_id = start(&app.router).await;

        let request = select(&app.router, &flow_id, "monthly").await;
        assert_eq!(request["amount"], 39_900);
        assert_eq!(request["notes"]["user_id"], "abc123");
        assert_eq!(request["prefill"]["email"], "asha@example.com");
        assert!(request.get("order_id").is_none());

        let (status, body) = call(
            &app.router,
            post(
                &format!("/api/checkout/{flow_id}/success"),
                serde_json::json!({ "razorpay_payment_id": "pay_Web1" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["receipt"]["user_id"], "abc123");
        assert_eq!(body["handoff"]["steps"].as_array().unwrap().len(), 3);
        assert_eq!(app.store.payments().len(), 1);

        let (status, handoff) = call(&app.router, get(&format!("/api/checkout/{flow_id}/return"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(handoff["steps"][1]["url"], "ransh://subscription_success");
    }

    #[tokio::test]
    async fn test_failure_then_retry() {
        let app = app(false);
        let flow_id = start(&app.router).await;
        select(&app.router, &flow_id, "lifetime").await;

        let (status, body) = call(
            &app.router,
            post(
                &format!("/api/checkout/{flow_id}/failure"),
                serde_json::json!({ "error": { "code": "BAD_REQUEST_ERROR", "reason": "payment_failed" } }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "payment_failed");
        assert_eq!(body["state"]["state"], "payment_failed");
        assert_eq!(app.store.write_count(), 0);

        select(&app.router, &flow_id, "monthly").await;
    }

    #[tokio::test]
    async fn test_activation_failure_returns_payment_id() {
        let app = app(false);
        let flow_id = start(&app.router).await;
        select(&app.router, &flow_id, "monthly").await;
        app.store.fail_account_updates(true);

        let (status, body) = call(
            &app.router,
            post(
                &format!("/api/checkout/{flow_id}/success"),
                serde_json::json!({ "razorpay_payment_id": "pay_Lost99" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "ACTIVATION_FAILED");
        assert_eq!(body["payment_id"], "pay_Lost99");
        assert!(body["error"].as_str().unwrap().contains("pay_Lost99"));

        // A failed account update stops the payment record too
        assert!(app.store.account("abc123").is_none());
        assert!(app.store.payments().is_empty());
        assert_eq!(app.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_signed_checkout() {
        let app = app(true);
        let flow_id = start(&app.router).await;

        let request = select(&app.router, &flow_id, "lifetime").await;
        let order_id = request["order_id"].as_str().unwrap().to_string();
        assert_eq!(app.orders.orders(), vec![(order_id.clone(), 599_900)]);

        let signature = SignatureVerifier::new(KEY_SECRET).sign(&order_id, "pay_Signed").unwrap();
        let (status, body) = call(
            &app.router,
            post(
                &format!("/api/checkout/{flow_id}/success"),
                serde_json::json!({
                    "razorpay_payment_id": "pay_Signed",
                    "razorpay_order_id": order_id,
                    "razorpay_signature": signature
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["receipt"]["payment_id"], "pay_Signed");
        assert_eq!(app.store.account("abc123").unwrap().gateway_order_ref, order_id);
        assert_eq!(app.store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_unsigned_callback_rejected_when_signing() {
        let app = app(true);
        let flow_id = start(&app.router).await;
        select(&app.router, &flow_id, "lifetime").await;

        let (status, body) = call(
            &app.router,
            post(
                &format!("/api/checkout/{flow_id}/success"),
                serde_json::json!({ "razorpay_payment_id": "pay_Forged" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["code"], "PAYMENT_FAILED");
        assert_eq!(app.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_bad_signature_writes_nothing() {
        let app = app(true);
        let flow_id = start(&app.router).await;
        let request = select(&app.router, &flow_id, "monthly").await;
        let order_id = request["order_id"].as_str().unwrap();

        let (status, body) = call(
            &app.router,
            post(
                &format!("/api/checkout/{flow_id}/success"),
                serde_json::json!({
                    "razorpay_payment_id": "pay_Forged",
                    "razorpay_order_id": order_id,
                    "razorpay_signature": "00ff"
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["code"], "PAYMENT_FAILED");
        assert_eq!(app.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_signature_for_another_order_rejected() {
        let app = app(true);
        let flow_id = start(&app.router).await;
        select(&app.router, &flow_id, "monthly").await;

        // Correctly signed, but not for the order this checkout placed
        let signature = SignatureVerifier::new(KEY_SECRET).sign("order_Elsewhere", "pay_Replayed").unwrap();
        let (status, _) = call(
            &app.router,
            post(
                &format!("/api/checkout/{flow_id}/success"),
                serde_json::json!({
                    "razorpay_payment_id": "pay_Replayed",
                    "razorpay_order_id": "order_Elsewhere",
                    "razorpay_signature": signature
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(app.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_order_failure_allows_retry() {
        let app = app(true);
        let flow_id = start(&app.router).await;
        app.orders.fail_orders(true);

        let (status, body) = call(
            &app.router,
            post(&format!("/api/checkout/{flow_id}/select"), serde_json::json!({ "plan": "monthly" })),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["code"], "PAYMENT_FAILED");

        app.orders.fail_orders(false);
        let request = select(&app.router, &flow_id, "monthly").await;
        assert!(request["order_id"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_flow_and_plan() {
        let app = app(false);
        let (status, body) = call(&app.router, get(&format!("/api/checkout/{}/plans", Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "FLOW_NOT_FOUND");

        let flow_id = start(&app.router).await;
        let (status, body) = call(
            &app.router,
            post(&format!("/api/checkout/{flow_id}/select"), serde_json::json!({ "plan": "weekly" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "UNKNOWN_PLAN");
    }

    #[tokio::test]
    async fn test_serves_checkout_page() {
        let app = app(false);
        let response = app.router.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains("/api/checkout/start"));
    }

    #[tokio::test]
    async fn test_disabled_without_collaborators() {
        let state = AppState {
            collaborators: None,
            settings: Arc::new(CheckoutSettings::new("")),
            signing: None,
            flows: Arc::new(FlowRegistry::new()),
        };
        let router = router(state, STATIC_DIR);

        let (status, body) = call(&router, get("/api/checkout/start?uid=abc123")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "CHECKOUT_DISABLED");

        let (_, health) = call(&router, get("/health")).await;
        assert_eq!(health["checkout_configured"], false);
        assert_eq!(health["signature_verification"], false);
    }
}
