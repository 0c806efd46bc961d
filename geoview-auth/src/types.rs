//! Wire types shared by the exchange backends and callers

use crate::{AuthError, Token};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// What an exchange backend hands back on success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeGrant {
    pub token: String,
    /// Absolute expiry in epoch-millis, when the endpoint reported one
    pub expires: Option<i64>,
}

/// Body sent to the backend authentication proxy
#[derive(Debug, Serialize)]
pub(crate) struct ProxyAuthRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub server_url: &'a str,
}

/// Body returned by the backend authentication proxy.
///
/// Success looks like `{success: true, token, expires}`; failures carry
/// either an `error` string or a FastAPI-style `detail`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProxyAuthResponse {
    #[serde(default)]
    pub success: bool,
    pub token: Option<String>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub expires: Option<i64>,
    pub error: Option<String>,
    pub detail: Option<Value>,
}

impl ProxyAuthResponse {
    /// Human-readable failure text, preferring `detail` over `error`
    pub fn failure_text(&self) -> Option<String> {
        let detail = self.detail.as_ref().and_then(|d| match d {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        });
        detail.or_else(|| self.error.clone())
    }
}

/// Body returned by an ArcGIS `generateToken` endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct GenerateTokenResponse {
    pub token: Option<String>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub expires: Option<i64>,
    pub error: Option<ArcGisError>,
}

/// Epoch-millis from whatever an endpoint sends: integers, floats and
/// numeric strings are accepted, anything else reads as absent.
fn lenient_millis<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(millis_from_value))
}

fn millis_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(millis_from_f64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(millis_from_f64))
        }
        _ => None,
    }
}

fn millis_from_f64(ms: f64) -> Option<i64> {
    // `as` saturates, so only non-finite values need rejecting
    ms.is_finite().then(|| ms.round() as i64)
}

/// The `error` object ArcGIS services embed in otherwise successful responses
#[derive(Debug, Clone, Deserialize)]
pub struct ArcGisError {
    #[serde(default)]
    pub code: i64,
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<String>,
}

/// Success-flag view of an exchange result for callers that bridge to a UI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<std::result::Result<Token, AuthError>> for AuthOutcome {
    fn from(result: std::result::Result<Token, AuthError>) -> Self {
        match result {
            Ok(token) => Self {
                success: true,
                token: Some(token),
                error: None,
            },
            Err(e) => Self {
                success: false,
                token: None,
                error: Some(e.to_string()),
            },
        }
    }
}
