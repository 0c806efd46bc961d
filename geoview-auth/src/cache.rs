//! In-memory token cache keyed by server URL

use crate::Token;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// One token per server URL. Expired entries are only dropped when they are
/// read (or by an explicit sweep); nothing evicts them in the background on
/// its own.
#[derive(Clone, Default)]
pub struct TokenCache {
    entries: Arc<RwLock<HashMap<String, Token>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the token for `server_url` if it is still valid at `now`,
    /// evicting it when it is not.
    pub async fn get_valid_at(&self, server_url: &str, now: DateTime<Utc>) -> Option<Token> {
        {
            let entries = self.entries.read().await;
            match entries.get(server_url) {
                None => return None,
                Some(token) if token.is_valid_at(now) => return Some(token.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // Another writer may have replaced the entry between the two locks
        if let Some(token) = entries.get(server_url) {
            if token.is_valid_at(now) {
                return Some(token.clone());
            }
            debug!("Evicting expired token for {}", server_url);
            entries.remove(server_url);
        }
        None
    }

    pub async fn get_valid(&self, server_url: &str) -> Option<Token> {
        self.get_valid_at(server_url, Utc::now()).await
    }

    /// Insert a token, replacing whatever was cached for the same server
    pub async fn insert(&self, token: Token) {
        let mut entries = self.entries.write().await;
        entries.insert(token.server_url.clone(), token);
    }

    pub async fn remove(&self, server_url: &str) -> bool {
        let mut entries = self.entries.write().await;
        entries.remove(server_url).is_some()
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    /// Number of entries held, including expired ones not yet evicted
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, server_url: &str) -> bool {
        self.entries.read().await.contains_key(server_url)
    }

    /// Drop every entry that is no longer valid at `now`
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, token| token.is_valid_at(now));
        before - entries.len()
    }
}
