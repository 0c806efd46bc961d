//! Classification of error bodies returned by ArcGIS map services

use crate::types::ArcGisError;

/// ArcGIS code for an expired or otherwise invalid token
pub const INVALID_TOKEN: i64 = 498;

/// ArcGIS code for a request to a secured service without a token
pub const TOKEN_REQUIRED: i64 = 499;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service no longer honours the token we sent (498/499)
    AuthenticationRequired(String),
    BadRequest(String),
    Service { code: i64, message: String },
}

impl ServiceError {
    /// Inspect a map-service JSON body. Services report failures inside a
    /// 200 response, so the body must be checked even on HTTP success.
    pub fn from_body(body: &serde_json::Value) -> Option<Self> {
        let raw = body.get("error")?;
        let error: ArcGisError = serde_json::from_value(raw.clone()).unwrap_or(ArcGisError {
            code: 0,
            message: raw.as_str().map(str::to_string),
            details: Vec::new(),
        });
        let message = error
            .message
            .unwrap_or_else(|| "Unknown error".to_string());

        Some(match error.code {
            INVALID_TOKEN | TOKEN_REQUIRED => ServiceError::AuthenticationRequired(message),
            400 => ServiceError::BadRequest(message),
            code => ServiceError::Service { code, message },
        })
    }

    pub fn requires_authentication(&self) -> bool {
        matches!(self, ServiceError::AuthenticationRequired(_))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::AuthenticationRequired(m) => write!(f, "Authentication required: {m}"),
            ServiceError::BadRequest(m) => write!(f, "Invalid request: {m}"),
            ServiceError::Service { message, .. } => write!(f, "Service error: {message}"),
        }
    }
}
