//! Session credential exchange
//!
//! Before a transport session can open, the client trades a session name
//! and participant name for a short-lived token plus the transport URL to
//! use it against. The issuing service is opaque to this crate; both the
//! token and the URL pass straight through to the transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{Result, RoomError};

/// Request body sent to the credential endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub session_name: String,
    pub participant_name: String,
}

/// Credential returned by the issuing service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredential {
    /// Opaque auth token, passed to the transport unmodified
    pub token: String,
    /// Where the transport should connect
    pub transport_url: String,
}

/// Issues session credentials.
///
/// Tokens are good for the lifetime of one session; there is no refresh
/// flow at this layer.
#[async_trait]
pub trait CredentialProvider: Send + Sync + std::fmt::Debug {
    async fn issue(
        &self,
        session_name: &str,
        participant_name: &str,
    ) -> Result<SessionCredential>;
}

/// Credential provider backed by an HTTP endpoint.
///
/// POSTs `{"sessionName": ..., "participantName": ...}` as JSON and
/// expects `{"token": ..., "transportUrl": ...}` back. Any non-success
/// status or connection failure maps to [`RoomError::CredentialFailed`];
/// nothing is retried here.
#[derive(Debug, Clone)]
pub struct HttpCredentialProvider {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpCredentialProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn issue(
        &self,
        session_name: &str,
        participant_name: &str,
    ) -> Result<SessionCredential> {
        let request = CredentialRequest {
            session_name: session_name.to_string(),
            participant_name: participant_name.to_string(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| RoomError::CredentialFailed {
                status: None,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            warn!(
                "credential endpoint rejected '{}': {} {}",
                session_name, status, reason
            );
            return Err(RoomError::CredentialFailed {
                status: Some(status.as_u16()),
                reason,
            });
        }

        let credential: SessionCredential =
            response
                .json()
                .await
                .map_err(|e| RoomError::CredentialFailed {
                    status: Some(status.as_u16()),
                    reason: format!("malformed credential response: {}", e),
                })?;

        debug!("credential issued for session '{}'", session_name);
        Ok(credential)
    }
}

/// Provider that hands out a fixed, pre-fetched credential.
///
/// For callers whose application server already performed the exchange,
/// and for tests that bypass HTTP entirely.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: SessionCredential,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>, transport_url: impl Into<String>) -> Self {
        Self {
            credential: SessionCredential {
                token: token.into(),
                transport_url: transport_url.into(),
            },
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn issue(&self, _session: &str, _participant: &str) -> Result<SessionCredential> {
        Ok(self.credential.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = CredentialRequest {
            session_name: "algebra-1on1".to_string(),
            participant_name: "alice".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["sessionName"], "algebra-1on1");
        assert_eq!(json["participantName"], "alice");
    }

    #[test]
    fn test_credential_wire_shape() {
        let credential: SessionCredential = serde_json::from_str(
            r#"{"token": "tok-abc", "transportUrl": "wss://rt.example.com"}"#,
        )
        .unwrap();
        assert_eq!(credential.token, "tok-abc");
        assert_eq!(credential.transport_url, "wss://rt.example.com");
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticCredentialProvider::new("tok", "wss://local");
        let credential = provider.issue("any", "one").await.unwrap();
        assert_eq!(credential.token, "tok");
        assert_eq!(credential.transport_url, "wss://local");
    }
}
