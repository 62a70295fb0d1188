//! # checkout-runtime
//!
//! HTTP implementations of the `checkout-core` collaborator traits:
//!
//! - [`FirebaseIdentity`]: custom-token exchange and anonymous sign-in
//!   through the Identity Toolkit REST API
//! - [`FirestoreClient`]: user document updates, payment records and plan
//!   overrides through the Firestore REST API
//! - [`RazorpayClient`]: payment gateway orders
//! - [`SignatureVerifier`]: gateway callback signature checks

mod config;
mod error;
pub mod firestore;
pub mod identity;
pub mod orders;
pub mod signature;

pub use config::FirebaseConfig;
pub use error::{Result, RuntimeError};
pub use firestore::FirestoreClient;
pub use identity::FirebaseIdentity;
pub use orders::{RazorpayClient, RazorpayConfig};
pub use signature::SignatureVerifier;
