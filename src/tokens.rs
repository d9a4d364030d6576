use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use thiserror::Error;
use tracing::info;

/// One seller's credentials as configured in the environment. Amazon entries
/// carry only a refresh token; the access token is minted on pipeline start.
#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub access_token: Option<String>,
    pub refresh_token: String,
    #[serde(default)]
    pub seller_id: Option<String>,
}

/// Seller → credential table for one platform, loaded once from an env var
/// holding a JSON object. Absent or malformed input yields an empty table.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    sellers: HashMap<String, Credential>,
}

impl TokenStore {
    pub fn from_env(var: &str) -> Self {
        let sellers = env::var(var)
            .ok()
            .map(|raw| parse_credentials(&raw))
            .unwrap_or_default();
        if !sellers.is_empty() {
            info!(
                target = "mercurio.tokens",
                var,
                sellers = sellers.len(),
                "loaded seller credentials"
            );
        }
        Self { sellers }
    }

    pub fn get(&self, seller: &str) -> Option<&Credential> {
        self.sellers.get(seller)
    }

    pub fn seller_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sellers.keys().cloned().collect();
        names.sort();
        names
    }
}

fn parse_credentials(raw: &str) -> HashMap<String, Credential> {
    serde_json::from_str(raw).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token endpoint returned HTTP {0}")]
    Status(u16),
    #[error("token request failed: {0}")]
    Request(String),
}

/// The platform's refresh endpoint plus the application credentials it wants.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    pub url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Owns the live (access, refresh) pair for one seller during one sync run.
/// Refreshes mutate this session only; nothing is written back to config.
#[derive(Debug)]
pub struct TokenSession {
    endpoint: TokenEndpoint,
    access_token: String,
    refresh_token: String,
}

impl TokenSession {
    pub fn new(endpoint: TokenEndpoint, credential: &Credential) -> Self {
        Self {
            endpoint,
            access_token: credential.access_token.clone().unwrap_or_default(),
            refresh_token: credential.refresh_token.clone(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Exchange the refresh token for a fresh pair. Providers that do not
    /// rotate refresh tokens simply omit the field and the current one stays.
    pub async fn refresh(&mut self, client: &Client) -> Result<(), TokenError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.endpoint.client_id.as_str()),
            ("client_secret", self.endpoint.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
        ];
        let response = client
            .post(&self.endpoint.url)
            .form(&params)
            .send()
            .await
            .map_err(|err| TokenError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenError::Status(status.as_u16()));
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|err| TokenError::Request(err.to_string()))?;
        self.access_token = payload.access_token;
        if let Some(next) = payload.refresh_token {
            self.refresh_token = next;
        }
        info!(target = "mercurio.tokens", "access token refreshed");
        Ok(())
    }

    /// Mint an initial access token when the configured credential has none.
    pub async fn ensure_access(&mut self, client: &Client) -> Result<(), TokenError> {
        if self.access_token.is_empty() {
            self.refresh(client).await
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seller_map() {
        let raw = r#"{
            "loja_abc": {"access_token": "at-1", "refresh_token": "rt-1", "seller_id": "123"},
            "loja_xyz": {"refresh_token": "rt-2"}
        }"#;
        let parsed = parse_credentials(raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["loja_abc"].seller_id.as_deref(), Some("123"));
        assert!(parsed["loja_xyz"].access_token.is_none());
    }

    #[test]
    fn malformed_json_yields_empty_table() {
        assert!(parse_credentials("not json").is_empty());
        assert!(parse_credentials("[1, 2]").is_empty());
    }

    #[test]
    fn session_starts_from_credential() {
        let credential = Credential {
            access_token: Some("live".into()),
            refresh_token: "keep".into(),
            seller_id: None,
        };
        let session = TokenSession::new(
            TokenEndpoint {
                url: "https://auth.example/oauth/token".into(),
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
            &credential,
        );
        assert_eq!(session.access_token(), "live");
    }
}
