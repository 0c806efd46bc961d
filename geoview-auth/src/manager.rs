//! The token manager: one shared authority over cached tokens and
//! remembered credentials

use crate::cache::TokenCache;
use crate::config::AuthConfig;
use crate::exchange::{self, TokenExchange};
use crate::service_error::ServiceError;
use crate::storage::CredentialStore;
use crate::{auth, AuthError, Credentials, Result, Token};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Token manager for secured map services.
///
/// Construct one per process and share it behind an `Arc`. The token cache
/// and the credential store are independent: clearing tokens never forgets
/// credentials, and forgetting credentials never drops a live token.
pub struct TokenManager {
    cache: TokenCache,
    exchange: Arc<dyn TokenExchange>,
    store: Arc<dyn CredentialStore>,
    coalesce: bool,
    /// One lock per server URL, held for the duration of an exchange
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TokenManager {
    pub fn new(exchange: Arc<dyn TokenExchange>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            cache: TokenCache::new(),
            exchange,
            store,
            coalesce: true,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Build the exchange backend and credential store named by `config`
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        config.validate()?;
        let exchange = exchange::from_config(&config.exchange)?;
        let store: Arc<dyn CredentialStore> = Arc::from(config.storage.open()?);

        Ok(Self::new(exchange, store).with_coalescing(config.cache.coalesce_exchanges))
    }

    /// Like [`TokenManager::from_config`], additionally starting the
    /// background expiry sweep when one is configured. Must run inside a
    /// tokio runtime.
    pub fn start(config: &AuthConfig) -> Result<Arc<Self>> {
        let manager = Arc::new(Self::from_config(config)?);
        if let Some(secs) = config.cache.sweep_interval_secs {
            manager.spawn_sweeper(Duration::from_secs(secs));
        }
        Ok(manager)
    }

    /// When disabled, overlapping exchanges for one server each hit the
    /// endpoint and the last to finish owns the cache slot.
    pub fn with_coalescing(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    /// Exchange credentials for a token, reusing a valid cached one
    pub async fn exchange_token(&self, credentials: &Credentials) -> Result<Token> {
        credentials.validate()?;
        let server_url = credentials.server_url.as_str();

        if let Some(token) = self.get_cached_token(server_url).await {
            debug!("Using cached token for {}", server_url);
            return Ok(token);
        }

        if !self.coalesce {
            return self.perform_exchange(credentials).await;
        }

        let slot = self.in_flight_slot(server_url).await;
        let result = {
            let _guard = slot.lock().await;

            // Whoever held the slot before us may have cached a token already
            match self.get_cached_token(server_url).await {
                Some(token) => {
                    debug!("Using token obtained by a concurrent exchange for {}", server_url);
                    Ok(token)
                }
                None => self.perform_exchange(credentials).await,
            }
        };
        self.release_slot(server_url, slot).await;

        result
    }

    async fn perform_exchange(&self, credentials: &Credentials) -> Result<Token> {
        let server_url = credentials.server_url.as_str();
        info!("Authenticating with map server: {}", server_url);

        let grant = match self.exchange.exchange(credentials).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!("Token exchange for {} failed: {}", server_url, e);
                return Err(e);
            }
        };

        let token = Token::from_exchange(grant.token, grant.expires, server_url, Utc::now());
        self.cache.insert(token.clone()).await;

        info!(
            "Authentication successful for {}, token expires {}",
            server_url,
            token.expires.to_rfc3339()
        );
        Ok(token)
    }

    async fn in_flight_slot(&self, server_url: &str) -> Arc<Mutex<()>> {
        let mut slots = self.in_flight.lock().await;
        slots.entry(server_url.to_string()).or_default().clone()
    }

    /// Forget the slot once no other caller is waiting on it
    async fn release_slot(&self, server_url: &str, slot: Arc<Mutex<()>>) {
        let mut slots = self.in_flight.lock().await;
        let idle = slots
            .get(server_url)
            .is_some_and(|held| Arc::ptr_eq(held, &slot) && Arc::strong_count(&slot) == 2);
        if idle {
            slots.remove(server_url);
        }
    }

    /// Cached token for a server if it is still valid. Expired entries are
    /// evicted here.
    pub async fn get_cached_token(&self, server_url: &str) -> Option<Token> {
        self.cache.get_valid(server_url).await
    }

    /// `now < expires - 5 minutes`
    pub fn is_token_valid(token: &Token) -> bool {
        token.is_valid()
    }

    /// Bearer string to attach to an outgoing request
    pub async fn get_token_for_request(&self, server_url: &str) -> Option<String> {
        self.get_cached_token(server_url).await.map(|t| t.token)
    }

    pub async fn clear_token(&self, server_url: &str) {
        if self.cache.remove(server_url).await {
            debug!("Cleared cached token for {}", server_url);
        }
    }

    pub async fn clear_all_tokens(&self) {
        self.cache.clear().await;
        debug!("Cleared all cached tokens");
    }

    /// Entries currently held, including expired ones not yet evicted
    pub async fn cached_token_count(&self) -> usize {
        self.cache.len().await
    }

    /// Drop every cached token that is no longer valid
    pub async fn sweep_expired(&self) -> usize {
        self.cache.sweep_at(Utc::now()).await
    }

    /// Periodically sweep expired tokens until the manager is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(strong) = manager.upgrade() else {
                    break;
                };
                let removed = strong.sweep_expired().await;
                if removed > 0 {
                    debug!("Swept {} expired tokens", removed);
                }
            }
        })
    }

    /// Remember credentials for later [`TokenManager::auto_authenticate`].
    ///
    /// The record is base64-encoded, not encrypted.
    pub fn store_credentials(&self, credentials: &Credentials) -> Result<()> {
        credentials.validate()?;
        let encoded = credentials.encode()?;
        self.store.set(&credentials.storage_key(), &encoded)?;
        debug!("Stored credentials for {}", credentials.server_url);
        Ok(())
    }

    /// Remembered credentials for a server. Missing, unreadable and
    /// undecodable records all come back as `None`.
    pub fn get_stored_credentials(&self, server_url: &str) -> Option<Credentials> {
        let key = auth::storage_key(server_url);
        let encoded = match self.store.get(&key) {
            Ok(Some(encoded)) => encoded,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read stored credentials for {}: {}", server_url, e);
                return None;
            }
        };

        match Credentials::decode(&encoded) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                warn!("Ignoring stored credentials for {}: {}", server_url, e);
                None
            }
        }
    }

    pub fn remove_stored_credentials(&self, server_url: &str) -> Result<()> {
        self.store.remove(&auth::storage_key(server_url))?;
        debug!("Removed stored credentials for {}", server_url);
        Ok(())
    }

    pub fn has_stored_credentials(&self, server_url: &str) -> bool {
        self.get_stored_credentials(server_url).is_some()
    }

    /// Re-establish a session from remembered credentials without prompting
    pub async fn auto_authenticate(&self, server_url: &str) -> Result<Token> {
        let credentials = self
            .get_stored_credentials(server_url)
            .ok_or(AuthError::NotFound)?;
        self.exchange_token(&credentials).await
    }

    /// Inspect a map-service response body; when the service reports the
    /// token as invalid or missing, drop the cached token for that server so
    /// the next request re-authenticates.
    pub async fn invalidate_on_service_error(
        &self,
        server_url: &str,
        body: &serde_json::Value,
    ) -> Option<ServiceError> {
        let error = ServiceError::from_body(body)?;
        if error.requires_authentication() {
            warn!("{} rejected our token: {}", server_url, error);
            self.clear_token(server_url).await;
        }
        Some(error)
    }
}
