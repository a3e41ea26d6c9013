//! Auth service configuration.
//!
//! Configuration is loaded from environment variables. The database URL is
//! redacted in Debug output.

use common::logging::LogFormat;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default `iss` claim.
pub const DEFAULT_JWT_ISSUER: &str = "home-server-auth";

/// Default access token lifetime (30 minutes).
pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: u64 = 1800;

/// Default refresh token lifetime (7 days).
pub const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: u64 = 604_800;

/// Default RSA modulus size.
pub const DEFAULT_KEY_SIZE_BITS: usize = 2048;

/// Smallest modulus accepted for RS256.
pub const MIN_KEY_SIZE_BITS: usize = 2048;

/// Largest modulus accepted. Generation time grows steeply beyond this.
pub const MAX_KEY_SIZE_BITS: usize = 8192;

/// Default bcrypt cost for newly hashed passwords.
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Minimum bcrypt cost (OWASP recommendation).
pub const MIN_BCRYPT_COST: u32 = 10;

/// Maximum bcrypt cost before hashing latency becomes unacceptable.
pub const MAX_BCRYPT_COST: u32 = 14;

/// Auth service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Value of the `iss` claim on every issued token.
    pub jwt_issuer: String,

    pub access_token_ttl: Duration,

    pub refresh_token_ttl: Duration,

    /// RSA modulus size used when a new signing key is generated.
    pub key_size_bits: usize,

    /// Optional PKCS#8 PEM file holding the signing key across restarts.
    /// When `None` the key is ephemeral.
    pub private_key_path: Option<PathBuf>,

    /// bcrypt cost for hashing new passwords.
    pub bcrypt_cost: u32,

    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("key_size_bits", &self.key_size_bits)
            .field("private_key_path", &self.private_key_path)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("log_format", &self.log_format)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid token lifetime configuration: {0}")]
    InvalidTokenTtl(String),

    #[error("Invalid key size configuration: {0}")]
    InvalidKeySize(String),

    #[error("Invalid bcrypt cost configuration: {0}")]
    InvalidBcryptCost(String),

    #[error("Invalid log format configuration: {0}")]
    InvalidLogFormat(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let jwt_issuer = vars
            .get("JWT_ISSUER")
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_JWT_ISSUER.to_string());

        let access_token_ttl = parse_ttl(
            vars,
            "JWT_ACCESS_TOKEN_TTL_SECONDS",
            DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
        )?;
        let refresh_token_ttl = parse_ttl(
            vars,
            "JWT_REFRESH_TOKEN_TTL_SECONDS",
            DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
        )?;

        let key_size_bits = if let Some(value_str) = vars.get("JWT_KEY_SIZE") {
            let value: usize = value_str.parse().map_err(|e| {
                ConfigError::InvalidKeySize(format!(
                    "JWT_KEY_SIZE must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;
            if !(MIN_KEY_SIZE_BITS..=MAX_KEY_SIZE_BITS).contains(&value) {
                return Err(ConfigError::InvalidKeySize(format!(
                    "JWT_KEY_SIZE must be between {} and {} bits, got {}",
                    MIN_KEY_SIZE_BITS, MAX_KEY_SIZE_BITS, value
                )));
            }
            value
        } else {
            DEFAULT_KEY_SIZE_BITS
        };

        let private_key_path = vars
            .get("JWT_PRIVATE_KEY_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let bcrypt_cost = bcrypt_cost_from_vars(vars)?;

        let log_format = match vars.get("LOG_FORMAT") {
            Some(value) => value
                .parse()
                .map_err(|e: common::logging::InvalidLogFormat| {
                    ConfigError::InvalidLogFormat(e.to_string())
                })?,
            None => LogFormat::default(),
        };

        Ok(Config {
            database_url,
            bind_address,
            jwt_issuer,
            access_token_ttl,
            refresh_token_ttl,
            key_size_bits,
            private_key_path,
            bcrypt_cost,
            log_format,
        })
    }
}

/// Read only `BCRYPT_COST`, for commands that hash passwords without
/// starting the service.
pub fn bcrypt_cost_from_env() -> Result<u32, ConfigError> {
    bcrypt_cost_from_vars(&env::vars().collect())
}

/// `BCRYPT_COST` from `vars`, defaulting to [`DEFAULT_BCRYPT_COST`].
pub fn bcrypt_cost_from_vars(vars: &HashMap<String, String>) -> Result<u32, ConfigError> {
    let Some(value_str) = vars.get("BCRYPT_COST") else {
        return Ok(DEFAULT_BCRYPT_COST);
    };

    let value: u32 = value_str.parse().map_err(|e| {
        ConfigError::InvalidBcryptCost(format!(
            "BCRYPT_COST must be a valid integer, got '{}': {}",
            value_str, e
        ))
    })?;
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&value) {
        return Err(ConfigError::InvalidBcryptCost(format!(
            "BCRYPT_COST must be between {} and {}, got {}",
            MIN_BCRYPT_COST, MAX_BCRYPT_COST, value
        )));
    }
    Ok(value)
}

fn parse_ttl(
    vars: &HashMap<String, String>,
    name: &str,
    default_seconds: u64,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(Duration::from_secs(default_seconds));
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTokenTtl(format!(
            "{} must be a valid integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidTokenTtl(format!(
            "{} must be greater than zero",
            name
        )));
    }

    Ok(Duration::from_secs(value))
}
