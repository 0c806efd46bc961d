//! Credentials, bearer tokens and their validity rules

use crate::{AuthError, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tokens are treated as unusable this long before their real expiry
pub const SAFETY_MARGIN_MS: i64 = 5 * 60 * 1000;

/// Lifetime assumed when the exchange endpoint does not report an expiry
pub const DEFAULT_TOKEN_LIFETIME_MS: i64 = 60 * 60 * 1000;

/// Prefix of every persisted credential record key
pub const STORAGE_KEY_PREFIX: &str = "arcgis_creds_";

/// Username, password and the map server they belong to
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub server_url: String,
}

/// A short-lived bearer token issued for one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Opaque bearer string
    pub token: String,
    /// Absolute expiry, epoch-millis on the wire
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires: DateTime<Utc>,
    /// Server this token authorizes requests against
    pub server_url: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        server_url: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            server_url: server_url.into(),
        }
    }

    /// Reject credentials with an empty field before any network traffic
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() || self.password.is_empty() || self.server_url.is_empty() {
            return Err(AuthError::rejected("Invalid authentication parameters"));
        }
        Ok(())
    }

    /// Key under which these credentials are persisted
    pub fn storage_key(&self) -> String {
        storage_key(&self.server_url)
    }

    /// Reversible encoding of the credentials. This is obfuscation against
    /// casual inspection only; anyone who can read the store can read the
    /// password.
    pub fn encode(&self) -> Result<String> {
        let serialized = serde_json::to_vec(self)?;
        Ok(general_purpose::STANDARD.encode(serialized))
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| AuthError::Decode(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| AuthError::Decode(e.to_string()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server_url", &self.server_url)
            .finish()
    }
}

impl Token {
    pub fn new(token: impl Into<String>, expires: DateTime<Utc>, server_url: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires,
            server_url: server_url.into(),
        }
    }

    /// Build a token from an endpoint reply, defaulting the expiry to one
    /// hour after `now` when the endpoint left it out.
    pub fn from_exchange(
        token: String,
        expires_ms: Option<i64>,
        server_url: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let expires = expires_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(|| now + Duration::milliseconds(DEFAULT_TOKEN_LIFETIME_MS));

        Self::new(token, expires, server_url)
    }

    /// Usable only while `now < expires - 5 minutes`. An expiry too close
    /// to the start of the representable range has no usable window at all.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires
            .checked_sub_signed(Duration::milliseconds(SAFETY_MARGIN_MS))
            .is_some_and(|limit| now < limit)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Get the authorization header value
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub fn expires_millis(&self) -> i64 {
        self.expires.timestamp_millis()
    }
}

/// Stable storage-safe identifier for a server URL.
///
/// The URL is hashed verbatim so `https://x` and `https://x/` are distinct
/// servers, exactly as they are distinct cache keys.
pub fn server_key(server_url: &str) -> String {
    use sha1::{Digest, Sha1};

    let mut hasher = Sha1::new();
    hasher.update(server_url.as_bytes());
    let result = hasher.finalize();

    hex::encode(&result[..8])
}

pub fn storage_key(server_url: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}{}", server_key(server_url))
}
