use crate::error::AppError;
use crate::models::Identity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Synchronous round trip to the external user service that turns a bearer
/// credential into a verified identity. Consumed by both the HTTP auth
/// middleware and the WebSocket connection path.
#[async_trait]
pub trait IdentityBridge: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Identity, AppError>;
}

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    cmd: &'static str,
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    status: bool,
    #[serde(default)]
    data: Option<Identity>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP implementation of the USER_AUTH contract:
/// request `{cmd: "USER_AUTH", token}` -> `{status, data?, error?}`.
pub struct HttpIdentityBridge {
    client: reqwest::Client,
    url: String,
}

impl HttpIdentityBridge {
    pub fn new(url: String, timeout_ms: u64) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| AppError::Config(format!("identity bridge client: {e}")))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl IdentityBridge for HttpIdentityBridge {
    async fn authenticate(&self, token: &str) -> Result<Identity, AppError> {
        let response = self
            .client
            .post(&self.url)
            .json(&AuthRequest {
                cmd: "USER_AUTH",
                token,
            })
            .send()
            .await
            .map_err(|e| {
                // Timeouts count as authentication failure, not retried.
                tracing::warn!(error = %e, "identity bridge call failed");
                AppError::Upstream(e.to_string())
            })?;

        let body: AuthResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("malformed auth response: {e}")))?;

        if !body.status {
            tracing::debug!(error = ?body.error, "identity bridge rejected credential");
            return Err(AppError::Unauthorized);
        }
        body.data.ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_request_wire_shape() {
        let request = AuthRequest {
            cmd: "USER_AUTH",
            token: "t0ken",
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["cmd"], "USER_AUTH");
        assert_eq!(value["token"], "t0ken");
    }

    #[test]
    fn auth_response_tolerates_missing_fields() {
        let body: AuthResponse = serde_json::from_str(r#"{"status": false}"#).unwrap();
        assert!(!body.status);
        assert!(body.data.is_none());
        assert!(body.error.is_none());
    }

    #[test]
    fn auth_response_parses_identity() {
        let body: AuthResponse = serde_json::from_str(
            r#"{"status": true, "data": {"userId": "u1", "firstName": "ada"}}"#,
        )
        .unwrap();
        assert!(body.status);
        assert_eq!(body.data.unwrap().user_id, "u1");
    }
}
