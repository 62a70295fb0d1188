//! Query Parameters
//!
//! The app opens the page with `?uid=..&token=..&email=..&name=..&phone=..`.

use serde::{Deserialize, Serialize};

use crate::service::IdentityGrant;
use crate::session::Profile;

/// Parameters the checkout page is opened with
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutParams {
    /// Signed custom token (optional)
    #[serde(default)]
    pub token: Option<String>,

    /// Target account id (required)
    #[serde(default)]
    pub uid: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl CheckoutParams {
    pub fn target_uid(&self) -> Option<&str> {
        present(self.uid.as_ref())
    }

    pub fn token(&self) -> Option<&str> {
        present(self.token.as_ref())
    }

    /// Profile built from the URL hints alone (anonymous sessions)
    pub fn profile(&self) -> Profile {
        resolve_profile(
            present(self.name.as_ref()),
            present(self.email.as_ref()),
            present(self.phone.as_ref()),
        )
    }

    /// Profile for a verified session: identity service first, URL hints second
    pub fn profile_for(&self, grant: &IdentityGrant) -> Profile {
        resolve_profile(
            present(grant.display_name.as_ref()).or_else(|| present(self.name.as_ref())),
            present(grant.email.as_ref()).or_else(|| present(self.email.as_ref())),
            present(grant.phone.as_ref()).or_else(|| present(self.phone.as_ref())),
        )
    }
}

fn resolve_profile(name: Option<&str>, email: Option<&str>, phone: Option<&str>) -> Profile {
    let display_name = name
        .or_else(|| email.and_then(|e| e.split('@').next()).filter(|s| !s.is_empty()))
        .unwrap_or("User")
        .to_string();

    let identifier = match (email, phone, name) {
        (Some(email), _, _) => email.to_string(),
        (None, Some(phone), _) => phone.to_string(),
        (None, None, Some(name)) => format!("{name} (No Email)"),
        (None, None, None) => "Guest".to_string(),
    };

    Profile {
        display_name,
        email: email.map(str::to_string),
        phone: phone.map(str::to_string),
        identifier,
    }
}
