//! Credential loading.
//!
//! The server authenticates with the credentials file named by
//! `--credentials` / `GOOGLE_APPLICATION_CREDENTIALS`. Two file types are
//! accepted:
//! - `service_account` keys, handled by gcp_auth's `CustomServiceAccount`
//! - `authorized_user` files written by `gcloud auth application-default login`,
//!   exchanged for access tokens with the refresh token they carry
//!
//! Nothing else in the environment is consulted.

use crate::bigquery::client::upstream_error;
use crate::error::{BqError, BqResult};
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, Token, TokenProvider};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Google's OAuth token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Load the token provider for a credentials file.
pub fn load_token_provider(path: &Path) -> BqResult<Arc<dyn TokenProvider>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        BqError::auth(format!(
            "Cannot read credentials file {}: {}",
            path.display(),
            e
        ))
    })?;

    match credential_type(&raw).as_deref() {
        Some("service_account") => {
            debug!(path = %path.display(), "Loading service account key");
            Ok(Arc::new(CustomServiceAccount::from_file(path)?))
        }
        Some("authorized_user") => {
            debug!(path = %path.display(), "Loading authorized user credentials");
            Ok(Arc::new(AuthorizedUser::from_json(&raw)?))
        }
        Some(other) => Err(BqError::configuration(format!(
            "Unsupported credential type '{}' in {}; expected service_account or authorized_user",
            other,
            path.display()
        ))),
        None => Err(BqError::configuration(format!(
            "{} is not a credentials file (no \"type\" field)",
            path.display()
        ))),
    }
}

fn credential_type(raw: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()?
        .get("type")?
        .as_str()
        .map(String::from)
}

#[derive(Deserialize)]
struct AuthorizedUserFile {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    #[serde(default)]
    quota_project_id: Option<String>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
    refresh_token: &'a str,
}

/// Token provider for `authorized_user` credentials.
///
/// Access tokens are fetched on first use and cached until shortly before
/// they expire.
pub struct AuthorizedUser {
    http: reqwest::Client,
    token_uri: String,
    credentials: AuthorizedUserFile,
    token: RwLock<Option<Arc<Token>>>,
}

impl AuthorizedUser {
    /// Parse the contents of an `authorized_user` file.
    pub fn from_json(raw: &str) -> BqResult<Self> {
        let credentials: AuthorizedUserFile = serde_json::from_str(raw).map_err(|e| {
            BqError::configuration(format!("Invalid authorized_user credentials: {}", e))
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            credentials,
            token: RwLock::new(None),
        })
    }

    /// Use a different token endpoint.
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    async fn refresh(&self) -> Result<Arc<Token>, gcp_auth::Error> {
        let request = RefreshRequest {
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
            grant_type: "refresh_token",
            refresh_token: &self.credentials.refresh_token,
        };
        let response = self
            .http
            .post(&self.token_uri)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                gcp_auth::Error::Other("failed to reach the token endpoint", Box::new(e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(gcp_auth::Error::Other(
                "token refresh was rejected",
                Box::new(upstream_error(status.as_u16(), &body)),
            ));
        }

        let token: Token = response
            .json()
            .await
            .map_err(|e| gcp_auth::Error::Other("invalid token response", Box::new(e)))?;
        info!(expires_at = %token.expires_at(), "Refreshed user access token");
        Ok(Arc::new(token))
    }
}

#[async_trait]
impl TokenProvider for AuthorizedUser {
    async fn token(&self, _scopes: &[&str]) -> Result<Arc<Token>, gcp_auth::Error> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| !t.has_expired()) {
                return Ok(token.clone());
            }
        }

        let mut cached = self.token.write().await;
        // another caller may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref().filter(|t| !t.has_expired()) {
            return Ok(token.clone());
        }
        let token = self.refresh().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn project_id(&self) -> Result<Arc<str>, gcp_auth::Error> {
        self.credentials
            .quota_project_id
            .as_deref()
            .map(Arc::from)
            .ok_or(gcp_auth::Error::Str("no project ID in user credentials"))
    }
}
