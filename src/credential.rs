use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::error::ConnectError;

/// Source of the short-lived secret used to open a realtime session.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// `Ok(None)` means the backend answered but handed out no secret.
    async fn fetch(&self) -> Result<Option<String>, ConnectError>;
}

#[derive(Debug, Deserialize)]
struct SessionTokenResponse {
    #[serde(default)]
    client_secret: Option<ClientSecret>,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    #[serde(default)]
    value: Option<String>,
}

/// Asks the application backend's `/api/session` endpoint for an ephemeral key.
#[derive(Debug, Clone)]
pub struct HttpCredentialSource {
    base_url: String,
    http: HttpClient,
}

impl HttpCredentialSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            http: HttpClient::new(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/session", self.base_url)
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn fetch(&self) -> Result<Option<String>, ConnectError> {
        let response = self.http.get(self.endpoint()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectError::Credential(format!(
                "Failed to fetch session token: {} - {}",
                status, body
            )));
        }

        let body: SessionTokenResponse = response.json().await?;
        Ok(body
            .client_secret
            .and_then(|secret| secret.value)
            .filter(|value| !value.is_empty()))
    }
}

/// A fixed secret, for backends that hand one out ahead of time.
#[derive(Debug, Clone)]
pub struct StaticCredential(pub Option<String>);

#[async_trait]
impl CredentialSource for StaticCredential {
    async fn fetch(&self) -> Result<Option<String>, ConnectError> {
        Ok(self.0.clone())
    }
}

fn normalize_base_url(value: &str) -> String {
    value.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let source = HttpCredentialSource::new("http://localhost:3000/");
        assert_eq!(source.endpoint(), "http://localhost:3000/api/session");
    }

    #[test]
    fn token_response_tolerates_missing_secret() {
        let body: SessionTokenResponse = serde_json::from_str(r#"{"error":"nope"}"#).unwrap();
        assert!(body.client_secret.is_none());

        let body: SessionTokenResponse =
            serde_json::from_str(r#"{"client_secret":{"value":"ek_123","expires_at":1}}"#).unwrap();
        assert_eq!(body.client_secret.unwrap().value.as_deref(), Some("ek_123"));
    }
}
