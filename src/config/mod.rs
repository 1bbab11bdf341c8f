//! Environment configuration.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::time::Duration;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Local development; human-readable logs, relaxed CORS.
    Development,
    /// Production.
    Production,
}

impl Environment {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(ConfigError::InvalidEnvironment {
                value: other.to_string(),
            }),
        }
    }
}

/// Which face engine backs the provider adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    /// Local inference sidecar reachable over HTTP. Exposes embeddings.
    Local,
    /// Cloud recognition API. Embedding-opaque, server-side collections.
    Cloud,
    /// Deterministic in-process mock (tests, demos).
    Mock,
}

impl ProviderType {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            "mock" => Ok(Self::Mock),
            other => Err(ConfigError::InvalidProviderType {
                value: other.to_string(),
            }),
        }
    }

    /// Stable name used in logs and audit events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
            Self::Mock => "mock",
        }
    }
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,

    /// HTTP bind address.
    pub bind_addr: IpAddr,

    /// Deployment environment.
    pub environment: Environment,

    /// Postgres connection string.
    pub database_url: String,

    /// Selected face engine.
    pub provider_type: ProviderType,

    /// Base URL of the provider endpoint (local sidecar or cloud API).
    pub provider_base_url: Option<String>,

    /// Cloud provider region.
    pub provider_region: Option<String>,

    /// Prefix for provider-side per-tenant collection names.
    pub provider_collection_prefix: String,

    /// Per-call ceiling for provider round trips.
    pub provider_timeout: Duration,

    /// Seed for keyed API-key hashing.
    pub api_key_secret: String,

    /// Bearer token for the super-admin surface. Absent disables it.
    pub admin_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
            environment: Environment::Development,
            database_url: String::new(),
            provider_type: ProviderType::Local,
            provider_base_url: None,
            provider_region: None,
            provider_collection_prefix: "visage".to_string(),
            provider_timeout: Duration::from_secs(5),
            api_key_secret: String::new(),
            admin_token: None,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "PORT";
    const ENV_BIND_ADDR: &'static str = "BIND_ADDR";
    const ENV_ENVIRONMENT: &'static str = "ENV";
    const ENV_DATABASE_URL: &'static str = "DATABASE_URL";
    const ENV_PROVIDER_TYPE: &'static str = "PROVIDER_TYPE";
    const ENV_PROVIDER_BASE_URL: &'static str = "PROVIDER_BASE_URL";
    const ENV_PROVIDER_REGION: &'static str = "PROVIDER_REGION";
    const ENV_PROVIDER_COLLECTION_PREFIX: &'static str = "PROVIDER_COLLECTION_PREFIX";
    const ENV_PROVIDER_TIMEOUT_SECS: &'static str = "PROVIDER_TIMEOUT_SECS";
    const ENV_API_KEY_SECRET: &'static str = "API_KEY_SECRET";
    const ENV_ADMIN_TOKEN: &'static str = "ADMIN_TOKEN";

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let environment = match env::var(Self::ENV_ENVIRONMENT) {
            Ok(value) => Environment::parse(&value)?,
            Err(_) => defaults.environment,
        };
        let database_url = Self::require_string_from_env(Self::ENV_DATABASE_URL)?;
        let provider_type = match env::var(Self::ENV_PROVIDER_TYPE) {
            Ok(value) => ProviderType::parse(&value)?,
            Err(_) => defaults.provider_type,
        };
        let provider_base_url = Self::parse_optional_string_from_env(Self::ENV_PROVIDER_BASE_URL);
        let provider_region = Self::parse_optional_string_from_env(Self::ENV_PROVIDER_REGION);
        let provider_collection_prefix = Self::parse_string_from_env(
            Self::ENV_PROVIDER_COLLECTION_PREFIX,
            defaults.provider_collection_prefix,
        );
        let provider_timeout = Duration::from_secs(Self::parse_u64_from_env(
            Self::ENV_PROVIDER_TIMEOUT_SECS,
            defaults.provider_timeout.as_secs(),
        ));
        let api_key_secret = Self::require_string_from_env(Self::ENV_API_KEY_SECRET)?;
        let admin_token = Self::parse_optional_string_from_env(Self::ENV_ADMIN_TOKEN);

        Ok(Self {
            port,
            bind_addr,
            environment,
            database_url,
            provider_type,
            provider_base_url,
            provider_region,
            provider_collection_prefix,
            provider_timeout,
            api_key_secret,
            admin_token,
        })
    }

    /// Checks cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider_type {
            ProviderType::Local | ProviderType::Cloud => {
                if self.provider_base_url.is_none() {
                    return Err(ConfigError::MissingProviderOption {
                        provider: self.provider_type.as_str(),
                        name: Self::ENV_PROVIDER_BASE_URL,
                    });
                }
            }
            ProviderType::Mock => {}
        }
        Ok(())
    }

    /// The address:port string the server binds to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn require_string_from_env(var_name: &'static str) -> Result<String, ConfigError> {
        match Self::parse_optional_string_from_env(var_name) {
            Some(value) => Ok(value),
            None => Err(ConfigError::MissingEnvVar { name: var_name }),
        }
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}
