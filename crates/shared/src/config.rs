use std::env;
use std::fmt;

use thiserror::Error;

use crate::config_env::{
    EnvLookup, optional_trimmed_env, parse_bool_env, parse_u16_env, parse_u64_env, require_env,
};


pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_GATEWAY_TIMEOUT_MS: u64 = 120_000;

#[derive(Clone)]
pub struct ServiceConfig {
    pub model_id: String,
    pub region: String,
    pub bind_host: String,
    pub port: u16,
    pub runtime_url: String,
    pub bearer_token: Option<String>,
    pub gateway_timeout_ms: u64,
    pub cors_enabled: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid boolean in env var {0}")]
    ParseBool(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let model_id = require_env(lookup, "MODEL_ID")?;
        let region = optional_trimmed_env(lookup, "AWS_REGION")
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let runtime_url = optional_trimmed_env(lookup, "BEDROCK_RUNTIME_URL")
            .unwrap_or_else(|| default_runtime_url(&region));
        if !runtime_url.starts_with("http://") && !runtime_url.starts_with("https://") {
            return Err(ConfigError::InvalidConfiguration(
                "BEDROCK_RUNTIME_URL must start with http:// or https://".to_string(),
            ));
        }

        let gateway_timeout_ms =
            parse_u64_env(lookup, "GATEWAY_TIMEOUT_MS", DEFAULT_GATEWAY_TIMEOUT_MS)?;
        if gateway_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "GATEWAY_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            model_id,
            region,
            bind_host: optional_trimmed_env(lookup, "BIND_HOST")
                .unwrap_or_else(|| DEFAULT_BIND_HOST.to_string()),
            port: parse_u16_env(lookup, "PORT", DEFAULT_PORT)?,
            runtime_url: runtime_url.trim_end_matches('/').to_string(),
            bearer_token: optional_trimmed_env(lookup, "AWS_BEARER_TOKEN_BEDROCK"),
            gateway_timeout_ms,
            cors_enabled: parse_bool_env(lookup, "CORS_ENABLED", false)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("model_id", &self.model_id)
            .field("region", &self.region)
            .field("bind_host", &self.bind_host)
            .field("port", &self.port)
            .field("runtime_url", &self.runtime_url)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "<redacted>"),
            )
            .field("gateway_timeout_ms", &self.gateway_timeout_ms)
            .field("cors_enabled", &self.cors_enabled)
            .finish()
    }
}

pub fn default_runtime_url(region: &str) -> String {
    format!("https://bedrock-runtime.{region}.amazonaws.com")
}

/// Loads a `.env` file from the working directory when one exists.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::InvalidConfiguration(format!(
            "failed to load .env file: {err}"
        ))),
    }
}
