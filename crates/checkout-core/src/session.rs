//! Session Management
//!
//! A checkout runs under one of two kinds of session. A verified session owns
//! the account it pays for. A proxy session is an anonymous credential carrier
//! paying for a separately tracked target account.

use serde::{Deserialize, Serialize};

/// Bearer credential used to authorize document-store calls
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(..)")
    }
}

/// Who the page shows as signed in
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,

    /// Email, phone or name, whichever identifies the user best
    pub identifier: String,
}

/// Session issued for a verified custom token
#[derive(Clone, Debug)]
pub struct AuthenticatedSession {
    pub id: String,
    pub credential: Credential,
    pub profile: Profile,
}

/// Anonymous session writing on behalf of `target_id`
#[derive(Clone, Debug)]
pub struct ProxySession {
    pub session_id: String,
    pub target_id: String,
    pub credential: Credential,
    pub profile: Profile,
}

/// An established checkout session
#[derive(Clone, Debug)]
pub enum Session {
    Authenticated(AuthenticatedSession),
    Proxy(ProxySession),
}

impl Session {
    /// Account that receives the subscription; every write is keyed by it
    pub fn target_id(&self) -> &str {
        match self {
            Self::Authenticated(s) => &s.id,
            Self::Proxy(s) => &s.target_id,
        }
    }

    /// Id of the session itself
    pub fn session_id(&self) -> &str {
        match self {
            Self::Authenticated(s) => &s.id,
            Self::Proxy(s) => &s.session_id,
        }
    }

    pub const fn credential(&self) -> &Credential {
        match self {
            Self::Authenticated(s) => &s.credential,
            Self::Proxy(s) => &s.credential,
        }
    }

    pub const fn profile(&self) -> &Profile {
        match self {
            Self::Authenticated(s) => &s.profile,
            Self::Proxy(s) => &s.profile,
        }
    }

    pub const fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_session_targets_tracked_id() {
        let session = Session::Proxy(ProxySession {
            session_id: "anon_9f2c".into(),
            target_id: "abc123".into(),
            credential: Credential::new("id-token"),
            profile: Profile::default(),
        });

        assert!(session.is_proxy());
        assert_eq!(session.target_id(), "abc123");
        assert_eq!(session.session_id(), "anon_9f2c");
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("secret-id-token");
        assert!(!format!("{credential:?}").contains("secret"));
    }
}
