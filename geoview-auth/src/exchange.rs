//! Credential-to-token exchange against the remote authority

use crate::config::{ExchangeConfig, ExchangeMode};
use crate::types::{ExchangeGrant, GenerateTokenResponse, ProxyAuthRequest, ProxyAuthResponse};
use crate::{AuthError, Credentials, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// The remote authority that turns credentials into a bearer token.
///
/// Implementations perform exactly one attempt; retry policy belongs to the
/// caller.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self, credentials: &Credentials) -> Result<ExchangeGrant>;
}

/// Exchange through the backend authentication proxy
pub struct ProxyExchange {
    client: Client,
    proxy_url: String,
}

/// Exchange directly against the server's `generateToken` endpoint
pub struct DirectExchange {
    client: Client,
    referer: String,
    expiration_minutes: u32,
}

/// Build the backend selected by the configuration
pub fn from_config(config: &ExchangeConfig) -> Result<Arc<dyn TokenExchange>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(AuthError::Transport)?;

    Ok(match config.mode {
        ExchangeMode::Proxy => Arc::new(ProxyExchange::with_client(client, &config.proxy_url)),
        ExchangeMode::Direct => Arc::new(DirectExchange::with_client(
            client,
            &config.referer,
            config.expiration_minutes,
        )),
    })
}

impl ProxyExchange {
    pub fn new(proxy_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            proxy_url: proxy_url.into(),
        }
    }

    pub fn with_client(client: Client, proxy_url: impl Into<String>) -> Self {
        Self {
            client,
            proxy_url: proxy_url.into(),
        }
    }
}

#[async_trait]
impl TokenExchange for ProxyExchange {
    async fn exchange(&self, credentials: &Credentials) -> Result<ExchangeGrant> {
        let request = ProxyAuthRequest {
            username: &credentials.username,
            password: &credentials.password,
            server_url: &credentials.server_url,
        };

        debug!("Requesting token for {} via proxy", credentials.server_url);

        let response = self
            .client
            .post(&self.proxy_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Token proxy unreachable: {}", e);
                AuthError::Transport(e)
            })?;

        let status = response.status();
        let text = response.text().await.map_err(AuthError::Transport)?;
        let body: ProxyAuthResponse = serde_json::from_str(&text).unwrap_or_default();

        if !status.is_success() {
            return Err(AuthError::rejected(body.failure_text().unwrap_or_else(|| {
                format!("Authentication failed with status: {status}")
            })));
        }

        if !body.success {
            return Err(AuthError::rejected(
                body.failure_text()
                    .unwrap_or_else(|| "Authentication failed".to_string()),
            ));
        }

        match body.token {
            Some(token) if !token.is_empty() => Ok(ExchangeGrant {
                token,
                expires: body.expires,
            }),
            _ => Err(AuthError::rejected("Authentication failed: No token received")),
        }
    }
}

impl DirectExchange {
    pub fn new(referer: impl Into<String>, expiration_minutes: u32) -> Self {
        Self::with_client(Client::new(), referer, expiration_minutes)
    }

    pub fn with_client(client: Client, referer: impl Into<String>, expiration_minutes: u32) -> Self {
        Self {
            client,
            referer: referer.into(),
            expiration_minutes,
        }
    }
}

#[async_trait]
impl TokenExchange for DirectExchange {
    async fn exchange(&self, credentials: &Credentials) -> Result<ExchangeGrant> {
        let token_url = token_url(&credentials.server_url)?;
        let expiration = self.expiration_minutes.to_string();

        debug!("Requesting token from {}", token_url);

        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("client", "referer"),
            ("referer", self.referer.as_str()),
            ("expiration", expiration.as_str()),
            ("f", "json"),
        ];

        let response = self
            .client
            .post(&token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("Token service unreachable: {}", e);
                AuthError::Transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::rejected(format!(
                "Authentication failed with status: {status}"
            )));
        }

        let body: GenerateTokenResponse = response.json().await.map_err(|e| {
            AuthError::rejected(format!("Invalid response from token service: {e}"))
        })?;

        if let Some(err) = body.error {
            return Err(AuthError::rejected(format!(
                "Authentication failed: {}",
                err.message.as_deref().unwrap_or("Invalid credentials")
            )));
        }

        match body.token {
            Some(token) if !token.is_empty() => Ok(ExchangeGrant {
                token,
                expires: body.expires,
            }),
            _ => Err(AuthError::rejected("Authentication failed: No token received")),
        }
    }
}

/// Derive the `generateToken` URL for a service or portal URL.
///
/// Portal and ArcGIS Online style hosts issue tokens under
/// `/sharing/rest/generateToken`; stand-alone servers under
/// `/tokens/generateToken`.
pub fn token_url(server_url: &str) -> Result<String> {
    let trimmed = server_url.trim_end_matches('/');
    let mut base = trimmed.split("/rest/services").next().unwrap_or(trimmed);

    let mut sharing = false;
    if let Some(idx) = base.find("/sharing") {
        base = &base[..idx];
        sharing = true;
    }

    url::Url::parse(base)?;

    if sharing || base.contains("arcgis.com") || base.contains("/portal") {
        Ok(format!("{base}/sharing/rest/generateToken"))
    } else {
        Ok(format!("{base}/tokens/generateToken"))
    }
}
