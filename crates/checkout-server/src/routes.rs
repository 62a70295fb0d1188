//! Router

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handlers::{
    health_check, list_plans, payment_dismissed, payment_failure, payment_success, return_to_app,
    select_plan, start_checkout,
};
use crate::state::AppState;

/// Checkout API plus the static checkout page
pub fn router(state: AppState, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))

        // Checkout flow
        .route("/api/checkout/start", get(start_checkout))
        .route("/api/checkout/{flow_id}/plans", get(list_plans))
        .route("/api/checkout/{flow_id}/select", post(select_plan))

        // Widget callbacks
        .route("/api/checkout/{flow_id}/success", post(payment_success))
        .route("/api/checkout/{flow_id}/failure", post(payment_failure))
        .route("/api/checkout/{flow_id}/dismiss", post(payment_dismissed))

        // App return
        .route("/api/checkout/{flow_id}/return", get(return_to_app))

        // Checkout page
        .fallback_service(ServeDir::new(static_dir))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
