//! Application State

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use checkout_core::{CheckoutFlow, CheckoutSettings, Collaborators, OrderService};
use checkout_runtime::SignatureVerifier;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// How long an abandoned checkout is kept around
const FLOW_TTL: Duration = Duration::from_secs(60 * 60);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Identity, store and plan collaborators (None if Firebase is not configured)
    pub collaborators: Option<Collaborators>,

    /// Merchant and app-return settings
    pub settings: Arc<CheckoutSettings>,

    /// Gateway orders and callback verification (None if no key secret is configured)
    pub signing: Option<SignedOrders>,

    /// Checkouts in progress, one per page load
    pub flows: Arc<FlowRegistry>,
}

/// Every payment goes through a gateway order and must come back signed
#[derive(Clone)]
pub struct SignedOrders {
    pub orders: Arc<dyn OrderService>,
    pub verifier: Arc<SignatureVerifier>,
}

struct FlowEntry {
    created: Instant,
    flow: Arc<Mutex<CheckoutFlow>>,
}

/// Live checkout flows keyed by id
#[derive(Default)]
pub struct FlowRegistry {
    flows: RwLock<HashMap<Uuid, FlowEntry>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flow, dropping ones older than the TTL
    pub async fn insert(&self, flow: CheckoutFlow) -> Uuid {
        let id = Uuid::new_v4();
        let mut flows = self.flows.write().await;

        let before = flows.len();
        flows.retain(|_, entry| entry.created.elapsed() < FLOW_TTL);
        if flows.len() < before {
            tracing::debug!(expired = before - flows.len(), "Dropped stale checkout flows");
        }

        flows.insert(
            id,
            FlowEntry {
                created: Instant::now(),
                flow: Arc::new(Mutex::new(flow)),
            },
        );
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<Mutex<CheckoutFlow>>> {
        self.flows.read().await.get(id).map(|entry| entry.flow.clone())
    }

    pub async fn len(&self) -> usize {
        self.flows.read().await.len()
    }
}
