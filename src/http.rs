use crate::tokens::TokenSession;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub fn build_client() -> Client {
    let timeout = std::env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);
    let connect = std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5);
    Client::builder()
        .timeout(Duration::from_secs(timeout))
        .connect_timeout(Duration::from_secs(connect))
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("token refresh failed: {0}")]
    Refresh(String),
}

impl FetchError {
    /// Refresh failures abort the whole seller sync; everything else is
    /// recoverable per resource.
    pub fn is_auth(&self) -> bool {
        matches!(self, FetchError::Refresh(_))
    }
}

/// How the access token travels on the wire.
#[derive(Debug, Clone, Copy)]
pub enum AuthStyle {
    Bearer,
    AmzAccessToken,
}

/// Authenticated GET executor. On a 401 it refreshes the session once and
/// retries the same request; a second failure is returned to the caller.
pub struct Gateway {
    client: Client,
    session: TokenSession,
    style: AuthStyle,
}

impl Gateway {
    pub fn new(client: Client, session: TokenSession, style: AuthStyle) -> Self {
        Self {
            client,
            session,
            style,
        }
    }

    pub async fn get_json(
        &mut self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let response = self.send(url, query).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            info!(target = "mercurio.http", url, "401 from upstream, refreshing token");
            self.session
                .refresh(&self.client)
                .await
                .map_err(|err| FetchError::Refresh(err.to_string()))?;
            let retried = self.send(url, query).await?;
            return decode(retried).await;
        }
        decode(response).await
    }

    async fn send(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, FetchError> {
        let mut request = self.client.get(url).query(query);
        request = match self.style {
            AuthStyle::Bearer => request.bearer_auth(self.session.access_token()),
            AuthStyle::AmzAccessToken => request
                .header("x-amz-access-token", self.session.access_token())
                .header("Accept", "application/json"),
        };
        request
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))
    }
}

async fn decode(response: reqwest::Response) -> Result<Value, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    response
        .json()
        .await
        .map_err(|err| FetchError::Transport(err.to_string()))
}
