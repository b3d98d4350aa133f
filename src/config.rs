//! Runtime configuration for the connector.
//!
//! Everything here is read once at startup and injected into each handshake
//! session. The asset directory in particular is explicit configuration; there
//! is no fallback to the location of the source tree.
//!
//! 连接器的运行时配置。启动时读取一次，并注入每个握手会话。

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_ASSETS_DIR: &str = "KYMA_ASSETS_DIR";
pub const ENV_LISTEN_ADDR: &str = "KYMA_LISTEN_ADDR";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "KYMA_REQUEST_TIMEOUT_SECS";
pub const ENV_VERIFY_HOSTNAME: &str = "KYMA_VERIFY_HOSTNAME";
pub const ENV_DEFAULT_HOST_URL: &str = "KYMA_DEFAULT_HOST_URL";
pub const ENV_PLACEHOLDER_CERT: &str = "KYMA_PLACEHOLDER_CERT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine an assets directory: {0}")]
    AssetsDirUnavailable(#[source] std::io::Error),

    #[error("{name} has an invalid value {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Root for `kymacerts/` and `spec-docs/`.
    pub assets_dir: PathBuf,
    pub listen_addr: String,
    /// Upper bound for every outbound platform call, in seconds.
    pub request_timeout_secs: u64,
    /// Check the platform's certificate against its hostname.
    ///
    /// Off by default: the channel trusts the certificate the platform itself
    /// issued during the CSR exchange, whose names rarely match the endpoint.
    pub verify_hostname: bool,
    /// Target URL registered with an API spec when the caller supplies none.
    pub default_host_url: String,
    /// Also produce the legacy self-signed placeholder certificate.
    pub placeholder_certificate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            listen_addr: "0.0.0.0:8000".to_string(),
            request_timeout_secs: 30,
            verify_hostname: false,
            default_host_url: "https://localhost:8443".to_string(),
            placeholder_certificate: false,
        }
    }
}

impl Config {
    /// Builds a configuration rooted at `assets_dir`, everything else default.
    pub fn with_assets_dir(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            ..Self::default()
        }
    }

    /// Reads the configuration from `KYMA_*` environment variables.
    ///
    /// 从 `KYMA_*` 环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        config.assets_dir = match env::var_os(ENV_ASSETS_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_assets_dir()?,
        };
        if let Ok(addr) = env::var(ENV_LISTEN_ADDR) {
            config.listen_addr = addr;
        }
        if let Ok(value) = env::var(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout_secs =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    name: ENV_REQUEST_TIMEOUT_SECS,
                    value,
                })?;
        }
        if let Ok(value) = env::var(ENV_VERIFY_HOSTNAME) {
            config.verify_hostname = parse_flag(ENV_VERIFY_HOSTNAME, value)?;
        }
        if let Ok(url) = env::var(ENV_DEFAULT_HOST_URL) {
            config.default_host_url = url;
        }
        if let Ok(value) = env::var(ENV_PLACEHOLDER_CERT) {
            config.placeholder_certificate = parse_flag(ENV_PLACEHOLDER_CERT, value)?;
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn certs_dir(&self) -> PathBuf {
        self.assets_dir.join("kymacerts")
    }

    pub fn spec_docs_dir(&self) -> PathBuf {
        self.assets_dir.join("spec-docs")
    }
}

/// `<dir of the running executable>/assets`, or `./assets` when the
/// executable path is unknown.
fn default_assets_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = env::current_exe()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .map(|dir| dir.join("assets"))
        .filter(|dir| dir.is_dir())
    {
        return Ok(dir);
    }
    env::current_dir()
        .map(|cwd| cwd.join("assets"))
        .map_err(ConfigError::AssetsDirUnavailable)
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { name, value }),
    }
}
