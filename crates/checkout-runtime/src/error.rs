//! Runtime Error Types

use checkout_core::ServiceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success answer; `message` is the service's own error code/text
    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RuntimeError> for ServiceError {
    fn from(err: RuntimeError) -> Self {
        match err {
            // Request URLs carry the API key
            RuntimeError::Http(e) => Self::Transport(e.without_url().to_string()),
            RuntimeError::Remote { message, .. } => Self::Rejected(message),
            RuntimeError::Json(e) => Self::Decode(e.to_string()),
            RuntimeError::Config(msg) => Self::Other(msg),
        }
    }
}

/// Turn a non-2xx response into [`RuntimeError::Remote`].
///
/// Google APIs answer `{"error": {"message": ...}}`, the payment gateway
/// `{"error": {"description": ...}}`.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: serde_json::Value = response.json().await.unwrap_or_default();
    Err(RuntimeError::Remote {
        status: status.as_u16(),
        message: remote_message(&body).unwrap_or_else(|| format!("HTTP {status}")),
    })
}

pub(crate) fn remote_message(body: &serde_json::Value) -> Option<String> {
    let error = &body["error"];
    error["message"]
        .as_str()
        .or_else(|| error["description"].as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_message_passes_through() {
        let body = serde_json::json!({
            "error": { "code": 400, "message": "INVALID_CUSTOM_TOKEN", "status": "INVALID_ARGUMENT" }
        });
        let err = RuntimeError::Remote {
            status: 400,
            message: remote_message(&body).unwrap(),
        };

        assert_eq!(ServiceError::from(err), ServiceError::Rejected("INVALID_CUSTOM_TOKEN".into()));
    }

    #[test]
    fn test_gateway_error_description() {
        let body = serde_json::json!({
            "error": { "code": "BAD_REQUEST_ERROR", "description": "Authentication failed" }
        });
        assert_eq!(remote_message(&body).as_deref(), Some("Authentication failed"));
    }

    #[test]
    fn test_missing_error_body() {
        assert!(remote_message(&serde_json::json!({})).is_none());
    }

    #[tokio::test]
    async fn test_transport_error_hides_api_key() {
        // Nothing listens on a port that was just released
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}/v1/accounts:signUp?key=AIzaSecretKey"))
            .send()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("AIzaSecretKey"));

        let ServiceError::Transport(message) = ServiceError::from(RuntimeError::from(err)) else {
            panic!("expected a transport error");
        };
        assert!(!message.contains("AIzaSecretKey"));
    }
}
