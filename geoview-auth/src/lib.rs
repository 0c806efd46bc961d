//! Token lifecycle management for secured ArcGIS map services

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod exchange;
pub mod manager;
pub mod service_error;
pub mod storage;
pub mod types;

pub use auth::{Credentials, Token, DEFAULT_TOKEN_LIFETIME_MS, SAFETY_MARGIN_MS};
pub use cache::TokenCache;
pub use config::{
    AuthConfig, CacheConfig, ExchangeConfig, ExchangeMode, LoggingConfig, StorageBackend,
    StorageConfig,
};
pub use error::{AuthError, Result};
pub use exchange::{DirectExchange, ProxyExchange, TokenExchange};
pub use manager::TokenManager;
pub use service_error::ServiceError;
pub use storage::{CredentialStore, FileStore, KeyringStore, MemoryStore};
pub use types::{AuthOutcome, ExchangeGrant};
