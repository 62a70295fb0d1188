//! Firebase Project Configuration

use std::time::Duration;

use crate::error::{Result, RuntimeError};

/// Firebase project settings
#[derive(Clone, Debug)]
pub struct FirebaseConfig {
    /// Web API key
    pub api_key: String,

    pub project_id: String,

    /// Firestore database id
    pub database: String,

    /// Identity Toolkit base URL (override for the emulator)
    pub identity_url: String,

    /// Firestore base URL (override for the emulator)
    pub firestore_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl FirebaseConfig {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            database: "(default)".into(),
            identity_url: "https://identitytoolkit.googleapis.com/v1".into(),
            firestore_url: "https://firestore.googleapis.com/v1".into(),
            timeout_secs: 30,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("FIREBASE_API_KEY")
            .map_err(|_| RuntimeError::Config("FIREBASE_API_KEY not set".into()))?;
        let project_id = std::env::var("FIREBASE_PROJECT_ID")
            .map_err(|_| RuntimeError::Config("FIREBASE_PROJECT_ID not set".into()))?;

        let mut config = Self::new(api_key, project_id);
        if let Ok(url) = std::env::var("FIREBASE_IDENTITY_URL") {
            config.identity_url = url;
        }
        if let Ok(url) = std::env::var("FIRESTORE_URL") {
            config.firestore_url = url;
        }
        if let Some(secs) = std::env::var("FIREBASE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout_secs = secs;
        }

        Ok(config)
    }

    /// Resource name of a document, e.g. `projects/p/databases/(default)/documents/users/u1`
    pub fn document_name(&self, path: &str) -> String {
        format!(
            "projects/{}/databases/{}/documents/{}",
            self.project_id, self.database, path
        )
    }

    /// URL of the documents root
    pub fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.firestore_url.trim_end_matches('/'),
            self.project_id,
            self.database
        )
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?)
    }
}
