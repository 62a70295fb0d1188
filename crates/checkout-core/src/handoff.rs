//! App-Return Handoff
//!
//! After settlement the page tries to send the user back to the app: an
//! intent deep link, then a plain custom-scheme link, then a static message
//! asking the user to switch manually. Nothing confirms that the app received
//! any of it.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Deep-link settings for the mobile app
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppReturnConfig {
    /// Custom URL scheme registered by the app
    pub scheme: String,

    /// Android application id
    pub package: String,

    /// Host part of the deep link
    pub host: String,

    /// Delay before the custom-scheme fallback
    pub scheme_fallback_after: Duration,

    /// Delay before the manual message
    pub manual_message_after: Duration,

    pub manual_message: String,
}

impl Default for AppReturnConfig {
    fn default() -> Self {
        Self {
            scheme: "ransh".into(),
            package: "com.ransh.app".into(),
            host: "subscription_success".into(),
            scheme_fallback_after: Duration::from_millis(500),
            manual_message_after: Duration::from_millis(2500),
            manual_message:
                "Your subscription is active! Please switch back to the Ransh app manually.".into(),
        }
    }
}

impl AppReturnConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(scheme) = std::env::var("APP_SCHEME") {
            config.scheme = scheme;
        }
        if let Ok(package) = std::env::var("APP_PACKAGE") {
            config.package = package;
        }
        config
    }

    /// Android intent URL, the most reliable deep link on Chrome
    pub fn intent_url(&self) -> String {
        format!(
            "intent://{}#Intent;scheme={};package={};end",
            self.host, self.scheme, self.package
        )
    }

    pub fn scheme_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

/// One thing the page does while handing off
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HandoffAction {
    Redirect { url: String },
    ShowMessage { text: String },
}

/// An action and when it fires, relative to the start of the handoff
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: HandoffAction,
}

/// Receiver of handoff actions (the browser window, in practice)
pub trait AppReturnTarget: Send + Sync {
    fn redirect(&self, url: &str);

    fn show_message(&self, text: &str);
}

/// Ordered, fire-and-forget handoff sequence
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffPlan {
    pub steps: Vec<HandoffStep>,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl HandoffPlan {
    pub fn for_app(config: &AppReturnConfig) -> Self {
        Self {
            steps: vec![
                HandoffStep {
                    at_ms: 0,
                    action: HandoffAction::Redirect {
                        url: config.intent_url(),
                    },
                },
                HandoffStep {
                    at_ms: millis(config.scheme_fallback_after),
                    action: HandoffAction::Redirect {
                        url: config.scheme_url(),
                    },
                },
                HandoffStep {
                    at_ms: millis(config.manual_message_after),
                    action: HandoffAction::ShowMessage {
                        text: config.manual_message.clone(),
                    },
                },
            ],
        }
    }

    /// Play every step against `target` at its offset
    pub async fn run(&self, target: &dyn AppReturnTarget) {
        let mut elapsed = 0;
        for step in &self.steps {
            if step.at_ms > elapsed {
                tokio::time::sleep(Duration::from_millis(step.at_ms - elapsed)).await;
                elapsed = step.at_ms;
            }

            match &step.action {
                HandoffAction::Redirect { url } => {
                    tracing::debug!(url = %url, "Returning to app");
                    target.redirect(url);
                }
                HandoffAction::ShowMessage { text } => target.show_message(text),
            }
        }
    }

    /// Run in the background; nobody waits for or acknowledges the result
    pub fn spawn(self, target: Arc<dyn AppReturnTarget>) {
        tokio::spawn(async move {
            self.run(target.as_ref()).await;
        });
    }
}
