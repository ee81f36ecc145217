//! Configuration loading and config file resolution
//!
//! Bootstrap configuration comes from an optional TOML file. Every section
//! and every key has a built-in default, so a missing file (or a file that
//! only sets one value) still yields a complete configuration.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. OS-dependent default location (`<config_dir>/packop/config.toml`)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "PACKOP_CONFIG";

/// Content-addressed scheme that gets translated into gateway URLs
pub const IPFS_SCHEME: &str = "ipfs://";

/// Complete bootstrap configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub gateways: GatewayConfig,
    pub audio: AudioConfig,
}

/// HTTP surface configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP server port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 5790 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Gateway fallback configuration for content-addressed artwork
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway base URLs in priority order; the content hash is appended
    pub mirrors: Vec<String>,

    /// Image used when every mirror fails
    pub placeholder_url: String,

    /// Delay before trying the next candidate after a failure
    pub backoff_ms: u64,

    /// HTTP client timeout for a single probe request
    pub request_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mirrors: vec![
                "https://cloudflare-ipfs.com/ipfs/".to_string(),
                "https://ipfs.io/ipfs/".to_string(),
                "https://dweb.link/ipfs/".to_string(),
            ],
            placeholder_url: "https://usdozf7pplhxfvrl.public.blob.vercel-storage.com/e4c98c23-f7cf-4747-ae59-b7c567098f35-FKOaQSUxyNqwdnYhrC08D8YoPQRvL0".to_string(),
            backoff_ms: 300,
            request_timeout_ms: 30_000,
        }
    }
}

impl GatewayConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Audio cue output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Play cues at all
    pub enabled: bool,

    /// Output device name (None = default device)
    pub device: Option<String>,

    /// Master cue volume (0.0-1.0)
    pub volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device: None,
            volume: 1.0,
        }
    }
}

impl TomlConfig {
    /// Load configuration from a TOML file
    ///
    /// A missing file is not an error: a warning is logged and built-in
    /// defaults are returned. A file that exists but cannot be parsed or
    /// fails validation is an `Error::Config`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using built-in defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from the resolved config file location, or defaults if none exists
    pub fn load_resolved(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg, CONFIG_ENV_VAR) {
            Some(path) => Self::load(&path),
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.gateways.placeholder_url.trim().is_empty() {
            return Err(Error::Config("gateways.placeholder_url must not be empty".to_string()));
        }
        if self.gateways.mirrors.iter().any(|m| m.trim().is_empty()) {
            return Err(Error::Config("gateways.mirrors must not contain empty entries".to_string()));
        }
        if !(0.0..=1.0).contains(&self.audio.volume) {
            return Err(Error::Config(format!(
                "audio.volume must be within 0.0-1.0, got {}",
                self.audio.volume
            )));
        }
        Ok(())
    }
}

/// Resolve the config file path following the priority order
///
/// Returns `None` when no argument or environment override is given and the
/// OS default location does not exist.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: OS-dependent default location
    default_config_path().filter(|p| p.exists())
}

/// Default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("packop").join("config.toml"))
}
