//! ott-checkout HTTP Server
//!
//! Axum-based server hosting the external subscription checkout: the static
//! checkout page plus the JSON API it drives.

mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_core::{CheckoutSettings, Collaborators};
use checkout_runtime::{FirebaseConfig, FirebaseIdentity, FirestoreClient, RazorpayClient, RazorpayConfig};

use crate::state::{AppState, FlowRegistry, SignedOrders};

fn firebase_collaborators() -> anyhow::Result<Collaborators> {
    let config = FirebaseConfig::from_env()?;
    let identity = FirebaseIdentity::new(config.clone()).context("identity client")?;
    let firestore = Arc::new(FirestoreClient::new(config).context("firestore client")?);

    Ok(Collaborators::new(Arc::new(identity), firestore.clone(), firestore))
}

fn signed_orders() -> anyhow::Result<Option<SignedOrders>> {
    let Some(config) = RazorpayConfig::from_env() else {
        return Ok(None);
    };
    let client = RazorpayClient::new(config).context("gateway client")?;

    Ok(Some(SignedOrders {
        verifier: Arc::new(client.verifier()),
        orders: Arc::new(client),
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let settings = CheckoutSettings::from_env();
    let collaborators = firebase_collaborators();

    let (collaborators, settings) = match (collaborators, settings) {
        (Ok(collaborators), Ok(settings)) => {
            tracing::info!(merchant = %settings.merchant_name, "✓ Firebase and gateway configured");
            (Some(collaborators), settings)
        }
        (collaborators, settings) => {
            if let Err(e) = &collaborators {
                tracing::warn!("⚠ Firebase not configured: {}", e);
                tracing::warn!("  Set FIREBASE_API_KEY and FIREBASE_PROJECT_ID in .env");
            }
            if let Err(e) = &settings {
                tracing::warn!("⚠ Gateway not configured: {}", e);
                tracing::warn!("  Set RAZORPAY_KEY_ID in .env");
            }
            tracing::warn!("⚠ Checkout disabled");
            (None, settings.unwrap_or_else(|_| CheckoutSettings::new("")))
        }
    };

    let signing = signed_orders()?;
    if signing.is_some() {
        tracing::info!("✓ Gateway orders enabled, success callbacks must be signed");
    } else {
        tracing::warn!("⚠ RAZORPAY_KEY_SECRET not set - payments accepted unverified");
    }

    // Build application state
    let state = AppState {
        collaborators,
        settings: Arc::new(settings),
        signing,
        flows: Arc::new(FlowRegistry::new()),
    };

    let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".into());
    let app = routes::router(state, &static_dir);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 ott-checkout running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                        - Health check");
    tracing::info!("  GET  /api/checkout/start            - Authenticate, open a checkout");
    tracing::info!("  GET  /api/checkout/{{id}}/plans       - List plans");
    tracing::info!("  POST /api/checkout/{{id}}/select      - Choose a plan");
    tracing::info!("  POST /api/checkout/{{id}}/success     - Widget success callback");
    tracing::info!("  POST /api/checkout/{{id}}/failure     - Widget failure callback");
    tracing::info!("  POST /api/checkout/{{id}}/dismiss     - Widget closed");
    tracing::info!("  GET  /api/checkout/{{id}}/return      - App return sequence");
    tracing::info!("  GET  /*                             - Checkout page ({})", static_dir);

    axum::serve(listener, app).await?;

    Ok(())
}
