//! Server configuration loaded from `HAKO_DEPLOY_*` environment variables.

use std::fmt;
use std::net::SocketAddr;

use serde::Deserialize;
use thiserror::Error;

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "HAKO_DEPLOY_";

/// Default upload cap: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 << 20;

/// Server configuration loaded via `envy`.
///
/// Each field maps to `HAKO_DEPLOY_<FIELD>`:
///   - `HAKO_DEPLOY_API_KEY`          (required, shared secret for `X-API-Key`)
///   - `HAKO_DEPLOY_LISTEN_ADDR`      (default `0.0.0.0:2002`)
///   - `HAKO_DEPLOY_MAX_UPLOAD_BYTES` (default 100 MiB)
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Shared secret every deploy request must present.
    pub api_key: String,

    /// Socket address to bind the HTTP server to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Largest request body accepted on the artifact endpoint.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 2002))
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

/// Errors raised while loading configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read HAKO_DEPLOY_* environment: {0}")]
    Env(#[from] envy::Error),

    #[error("HAKO_DEPLOY_API_KEY must not be empty")]
    EmptyApiKey,

    #[error("HAKO_DEPLOY_MAX_UPLOAD_BYTES must be greater than zero")]
    ZeroUploadLimit,
}

impl Config {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Fails if `HAKO_DEPLOY_API_KEY` is unset or empty, or a variable
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        envy::prefixed(ENV_PREFIX).from_env::<Self>()?.validate()
    }

    /// Load from an explicit list of `(name, value)` pairs.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars.into_iter().map(|(k, v)| (k.into(), v.into()));
        envy::prefixed(ENV_PREFIX).from_iter::<_, Self>(vars)?.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ZeroUploadLimit);
        }
        Ok(self)
    }
}

// The API key never goes into logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("listen_addr", &self.listen_addr)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}
