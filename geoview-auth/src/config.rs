//! Configuration management for the geoview token manager

use crate::storage::{CredentialStore, FileStore, KeyringStore, MemoryStore};
use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// How tokens are obtained
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Token cache behaviour
    #[serde(default)]
    pub cache: CacheConfig,

    /// Where remembered credentials live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Server used when a command does not name one
    #[serde(default)]
    pub default_server: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeMode {
    /// Through the backend authentication proxy
    Proxy,
    /// Straight to the server's generateToken endpoint
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub mode: ExchangeMode,

    /// Proxy endpoint accepting `{username, password, server_url}`
    pub proxy_url: String,

    /// Referer the direct-mode token is bound to
    pub referer: String,

    /// Token lifetime requested in direct mode (minutes)
    pub expiration_minutes: u32,

    /// HTTP timeout for the exchange call (seconds)
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serialize concurrent exchanges for the same server
    pub coalesce_exchanges: bool,

    /// Interval of the background expiry sweep; none when unset
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// File backend path; platform data dir when unset
    pub path: Option<String>,

    /// Keyring service name
    pub service_name: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            mode: ExchangeMode::Proxy,
            proxy_url: "http://localhost:8000/api/auth/arcgis".to_string(),
            referer: "http://localhost:3000".to_string(),
            expiration_minutes: 60,
            timeout_secs: 30,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            coalesce_exchanges: true,
            sweep_interval_secs: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: None,
            service_name: "geoview-auth".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AuthConfig {
    /// Load configuration from file or create default
    pub fn load_or_default(config_path: Option<&str>) -> crate::Result<Self> {
        match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                let config: AuthConfig = serde_json::from_str(&content)?;
                config.validate()?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to file
    pub fn save(&self, config_path: &str) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.exchange.timeout_secs == 0 {
            return Err(crate::AuthError::Config(
                "exchange.timeout_secs must be positive".to_string(),
            ));
        }
        if self.exchange.mode == ExchangeMode::Proxy {
            url::Url::parse(&self.exchange.proxy_url)?;
        }
        if self.cache.sweep_interval_secs == Some(0) {
            return Err(crate::AuthError::Config(
                "cache.sweep_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve an explicit server or fall back to the configured default
    pub fn server_or_default<'a>(&'a self, server: Option<&'a str>) -> crate::Result<&'a str> {
        server.or(self.default_server.as_deref()).ok_or_else(|| {
            crate::AuthError::Config("No server given and no default_server configured".to_string())
        })
    }
}

impl StorageConfig {
    /// Open the configured credential store
    pub fn open(&self) -> crate::Result<Box<dyn CredentialStore>> {
        Ok(match self.backend {
            StorageBackend::Memory => Box::new(MemoryStore::new()),
            StorageBackend::File => match &self.path {
                Some(path) => Box::new(FileStore::new(path)),
                None => Box::new(FileStore::default_location()?),
            },
            StorageBackend::Keyring => Box::new(KeyringStore::new(self.service_name.clone())),
        })
    }
}
