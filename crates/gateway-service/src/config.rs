//! Gateway configuration.
//!
//! Configuration is loaded from environment variables.

use crate::services::registry::BackendRegistry;
use axum::http::HeaderValue;
use common::logging::LogFormat;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

/// Default issuer public key endpoint.
pub const DEFAULT_AUTH_PUBLIC_KEY_URL: &str = "http://auth-service:8080/api/v1/auth/public-key";

pub const DEFAULT_PUBLIC_KEY_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Default grace for serving an expired key when the issuer is unreachable.
/// Zero means fail closed.
pub const DEFAULT_PUBLIC_KEY_STALE_GRACE_SECONDS: u64 = 0;

/// `users` is served by the auth service (profile endpoints).
pub const DEFAULT_BACKENDS: &str = "auth=http://auth-service:8080,users=http://auth-service:8080,stats=http://stats-service:8080,camera=http://camera-service:8080";

/// Path prefixes that may be called without a token.
pub const DEFAULT_PUBLIC_PATHS: &str =
    "/api/v1/auth/login,/api/v1/auth/refresh,/api/v1/auth/public-key";

pub const DEFAULT_PROXY_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_PROXY_MAX_RETRIES: u32 = 3;
pub const DEFAULT_PROXY_RETRY_DELAY_MS: u64 = 200;

/// Upper bound on retries so a misconfiguration cannot stall requests forever.
pub const MAX_PROXY_RETRIES: u32 = 10;

pub const DEFAULT_MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8000").
    pub bind_address: String,

    /// Issuer endpoint serving `{public_key, algorithm, key_type}`.
    pub auth_public_key_url: String,

    pub public_key_fetch_timeout: Duration,

    pub public_key_stale_grace: Duration,

    pub backends: BackendRegistry,

    /// Served under the optional auth policy. Matched on whole path segments.
    pub public_paths: Vec<String>,

    /// Per-attempt upstream timeout.
    pub proxy_timeout: Duration,

    /// Retries after the first attempt, for transient transport errors only.
    pub proxy_max_retries: u32,

    pub proxy_retry_delay: Duration,

    pub max_request_body_bytes: usize,

    /// Browser origins allowed to call the gateway with credentials. Empty
    /// allows any origin, without credentials.
    pub cors_allowed_origins: Vec<HeaderValue>,

    pub log_format: LogFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),

    #[error("Invalid backend configuration: {0}")]
    InvalidBackends(String),

    #[error("Invalid public path configuration: {0}")]
    InvalidPublicPath(String),

    #[error("Invalid retry configuration: {0}")]
    InvalidRetries(String),

    #[error("Invalid body limit configuration: {0}")]
    InvalidBodyLimit(String),

    #[error("Invalid URL configuration: {0}")]
    InvalidUrl(String),

    #[error("Invalid CORS origin configuration: {0}")]
    InvalidCorsOrigin(String),

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
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let auth_public_key_url = vars
            .get("AUTH_PUBLIC_KEY_URL")
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_AUTH_PUBLIC_KEY_URL.to_string());
        if !(auth_public_key_url.starts_with("http://")
            || auth_public_key_url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidUrl(format!(
                "AUTH_PUBLIC_KEY_URL must start with http:// or https://, got '{}'",
                auth_public_key_url
            )));
        }

        let public_key_fetch_timeout = Duration::from_secs(parse_u64(
            vars,
            "PUBLIC_KEY_FETCH_TIMEOUT_SECONDS",
            DEFAULT_PUBLIC_KEY_FETCH_TIMEOUT_SECONDS,
            false,
        )?);
        let public_key_stale_grace = Duration::from_secs(parse_u64(
            vars,
            "PUBLIC_KEY_STALE_GRACE_SECONDS",
            DEFAULT_PUBLIC_KEY_STALE_GRACE_SECONDS,
            true,
        )?);

        let backends = BackendRegistry::parse(
            vars.get("BACKENDS")
                .map(String::as_str)
                .unwrap_or(DEFAULT_BACKENDS),
        )
        .map_err(|e| ConfigError::InvalidBackends(e.to_string()))?;

        let public_paths = parse_public_paths(
            vars.get("PUBLIC_PATHS")
                .map(String::as_str)
                .unwrap_or(DEFAULT_PUBLIC_PATHS),
        )?;

        let proxy_timeout = Duration::from_secs(parse_u64(
            vars,
            "PROXY_TIMEOUT_SECONDS",
            DEFAULT_PROXY_TIMEOUT_SECONDS,
            false,
        )?);

        let proxy_max_retries = match vars.get("PROXY_MAX_RETRIES") {
            Some(value_str) => {
                let value: u32 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidRetries(format!(
                        "PROXY_MAX_RETRIES must be a valid integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if value > MAX_PROXY_RETRIES {
                    return Err(ConfigError::InvalidRetries(format!(
                        "PROXY_MAX_RETRIES must be at most {}, got {}",
                        MAX_PROXY_RETRIES, value
                    )));
                }
                value
            }
            None => DEFAULT_PROXY_MAX_RETRIES,
        };

        let proxy_retry_delay = Duration::from_millis(parse_u64(
            vars,
            "PROXY_RETRY_DELAY_MS",
            DEFAULT_PROXY_RETRY_DELAY_MS,
            true,
        )?);

        let max_request_body_bytes = match vars.get("MAX_REQUEST_BODY_BYTES") {
            Some(value_str) => {
                let value: usize = value_str.parse().map_err(|e| {
                    ConfigError::InvalidBodyLimit(format!(
                        "MAX_REQUEST_BODY_BYTES must be a valid integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if value == 0 {
                    return Err(ConfigError::InvalidBodyLimit(
                        "MAX_REQUEST_BODY_BYTES must be greater than zero".to_string(),
                    ));
                }
                value
            }
            None => DEFAULT_MAX_REQUEST_BODY_BYTES,
        };

        let cors_allowed_origins =
            parse_cors_origins(vars.get("CORS_ALLOWED_ORIGINS").map(String::as_str).unwrap_or(""))?;

        let log_format = match vars.get("LOG_FORMAT") {
            Some(value) => value
                .parse()
                .map_err(|e: common::logging::InvalidLogFormat| {
                    ConfigError::InvalidLogFormat(e.to_string())
                })?,
            None => LogFormat::default(),
        };

        Ok(Config {
            bind_address,
            auth_public_key_url,
            public_key_fetch_timeout,
            public_key_stale_grace,
            backends,
            public_paths,
            proxy_timeout,
            proxy_max_retries,
            proxy_retry_delay,
            max_request_body_bytes,
            cors_allowed_origins,
            log_format,
        })
    }
}

fn parse_u64(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    allow_zero: bool,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidDuration(format!(
            "{} must be a valid integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 && !allow_zero {
        return Err(ConfigError::InvalidDuration(format!(
            "{} must be greater than zero",
            name
        )));
    }

    Ok(value)
}

fn parse_public_paths(list: &str) -> Result<Vec<String>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            if !p.starts_with('/') {
                return Err(ConfigError::InvalidPublicPath(format!(
                    "'{}' must start with '/'",
                    p
                )));
            }
            let trimmed = p.trim_end_matches('/');
            Ok(if trimmed.is_empty() { "/" } else { trimmed }.to_string())
        })
        .collect()
}

fn parse_cors_origins(list: &str) -> Result<Vec<HeaderValue>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| {
            if !(o.starts_with("http://") || o.starts_with("https://")) {
                return Err(ConfigError::InvalidCorsOrigin(format!(
                    "'{}' must start with http:// or https://",
                    o
                )));
            }
            HeaderValue::from_str(o.trim_end_matches('/'))
                .map_err(|e| ConfigError::InvalidCorsOrigin(format!("'{}': {}", o, e)))
        })
        .collect()
}
