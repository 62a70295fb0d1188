//! Firebase Identity Provider
//!
//! Implementation of `IdentityService` over the Identity Toolkit REST API.

use async_trait::async_trait;
use checkout_core::service::ServiceResult;
use checkout_core::{IdentityGrant, IdentityService};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::FirebaseConfig;
use crate::error::{ensure_success, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    #[serde(default)]
    local_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
}

/// Identity Toolkit client
pub struct FirebaseIdentity {
    client: reqwest::Client,
    config: FirebaseConfig,
}

impl FirebaseIdentity {
    pub fn new(config: FirebaseConfig) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            config,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/accounts:{}?key={}",
            self.config.identity_url.trim_end_matches('/'),
            method,
            self.config.api_key
        )
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &serde_json::Value) -> Result<T> {
        let response = self.client.post(self.endpoint(method)).json(body).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    /// Profile of the user behind `id_token`
    async fn lookup(&self, id_token: &str) -> Result<Option<AccountInfo>> {
        let lookup: LookupResponse = self
            .call("lookup", &serde_json::json!({ "idToken": id_token }))
            .await?;
        Ok(lookup.users.into_iter().next())
    }
}

fn grant(id_token: String, account: Option<AccountInfo>) -> IdentityGrant {
    match account {
        Some(account) => IdentityGrant {
            uid: account.local_id,
            id_token,
            email: account.email,
            display_name: account.display_name,
            phone: account.phone_number,
        },
        // An empty uid is reported upstream as "no user"
        None => IdentityGrant {
            uid: String::new(),
            id_token,
            email: None,
            display_name: None,
            phone: None,
        },
    }
}

#[async_trait]
impl IdentityService for FirebaseIdentity {
    async fn sign_in_with_custom_token(&self, token: &str) -> ServiceResult<IdentityGrant> {
        let signed_in: SignInResponse = self
            .call(
                "signInWithCustomToken",
                &serde_json::json!({ "token": token, "returnSecureToken": true }),
            )
            .await?;

        let account = self.lookup(&signed_in.id_token).await?;
        tracing::debug!(found = account.is_some(), "Exchanged custom token");

        Ok(grant(signed_in.id_token, account))
    }

    async fn sign_in_anonymously(&self) -> ServiceResult<IdentityGrant> {
        let signed_in: SignInResponse = self
            .call("signUp", &serde_json::json!({ "returnSecureToken": true }))
            .await?;
        tracing::debug!(uid = ?signed_in.local_id, "Created anonymous session");

        Ok(IdentityGrant {
            uid: signed_in.local_id.unwrap_or_default(),
            id_token: signed_in.id_token,
            email: None,
            display_name: None,
            phone: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let identity = FirebaseIdentity::new(FirebaseConfig::new("AIzaKey", "ransh-ott")).unwrap();
        assert_eq!(
            identity.endpoint("signUp"),
            "https://identitytoolkit.googleapis.com/v1/accounts:signUp?key=AIzaKey"
        );
    }

    #[test]
    fn test_lookup_response_to_grant() {
        let body = r#"{
            "kind": "identitytoolkit#GetAccountInfoResponse",
            "users": [{
                "localId": "u_42",
                "email": "asha@example.com",
                "phoneNumber": "+919800000000",
                "emailVerified": true
            }]
        }"#;
        let lookup: LookupResponse = serde_json::from_str(body).unwrap();
        let grant = grant("id-token".into(), lookup.users.into_iter().next());

        assert_eq!(grant.uid, "u_42");
        assert_eq!(grant.email.as_deref(), Some("asha@example.com"));
        assert_eq!(grant.phone.as_deref(), Some("+919800000000"));
        assert!(grant.display_name.is_none());
    }

    #[test]
    fn test_empty_lookup_has_no_user() {
        let lookup: LookupResponse = serde_json::from_str("{}").unwrap();
        let grant = grant("id-token".into(), lookup.users.into_iter().next());
        assert!(grant.uid.is_empty());
    }

    #[test]
    fn test_anonymous_sign_up_response() {
        let body = r#"{"idToken":"eyJ...","refreshToken":"r","expiresIn":"3600","localId":"anon_7"}"#;
        let response: SignInResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.local_id.as_deref(), Some("anon_7"));
    }
}
