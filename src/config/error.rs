//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort {
        /// Offending value.
        value: String,
    },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        /// Offending value.
        value: String,
        /// Parse failure.
        #[source]
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        /// Offending value.
        value: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },

    /// A required environment variable was not set.
    #[error("missing required environment variable: {name}")]
    MissingEnvVar {
        /// Variable name.
        name: &'static str,
    },

    /// Environment name was neither `development` nor `production`.
    #[error("unknown environment '{value}': expected 'development' or 'production'")]
    InvalidEnvironment {
        /// Offending value.
        value: String,
    },

    /// Provider type was not a recognized variant.
    #[error("unknown provider type '{value}': expected 'local', 'cloud' or 'mock'")]
    InvalidProviderType {
        /// Offending value.
        value: String,
    },

    /// A provider knob required by the selected provider type is missing.
    #[error("provider type '{provider}' requires {name} to be set")]
    MissingProviderOption {
        /// Selected provider type.
        provider: &'static str,
        /// Missing variable name.
        name: &'static str,
    },
}
