//! Configuration loading and resolution
//!
//! Bootstrap configuration comes from, in priority order:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables (`ADMIT_*`)
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! Secrets (webhook hash, QR key, admin secret) have no compiled default.
//! Startup fails with [`Error::Config`] if any of them is still missing after
//! resolution.

use crate::ids::DEFAULT_TICKET_ID_PREFIX;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ADMIT_CONFIG";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Default admin request timestamp window (ms, both directions)
pub const DEFAULT_ADMIN_WINDOW_MS: i64 = 30_000;

/// Default provider transaction listing endpoint used by reconciliation
pub const DEFAULT_PROVIDER_API_URL: &str = "https://api.flutterwave.com/v3/transactions";

/// Raw TOML file contents; every field optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub webhook_secret_hash: Option<String>,
    pub qr_secret: Option<String>,
    pub admin_secret: Option<String>,
    pub admin_request_window_ms: Option<i64>,
    pub ticket_id_prefix: Option<String>,
    pub cors_origin: Option<String>,
    pub provider_api_url: Option<String>,
    pub provider_secret_key: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
}

/// Payment provider API access (reconciliation only)
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_url: String,
    pub secret_key: String,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub database_path: PathBuf,
    pub bind_addr: String,
    pub port: u16,
    pub webhook_secret_hash: String,
    pub qr_secret: String,
    pub admin_secret: String,
    pub admin_request_window_ms: i64,
    pub ticket_id_prefix: String,
    pub cors_origin: Option<String>,
    pub provider: Option<ProviderConfig>,
    pub logging: LoggingConfig,
}

impl GateConfig {
    /// Resolve configuration against the process environment
    pub fn from_env(toml_config: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        Self::resolve(toml_config, overrides, |key| std::env::var(key).ok())
    }

    /// Layer TOML, environment (via `env`), and CLI overrides into a final config
    pub fn resolve<F>(toml_config: TomlConfig, overrides: ConfigOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = overrides
            .database_path
            .or_else(|| env("ADMIT_DATABASE_PATH").map(PathBuf::from))
            .or(toml_config.database_path)
            .unwrap_or_else(default_database_path);

        let port = match overrides.port {
            Some(port) => port,
            None => match env("ADMIT_PORT") {
                Some(raw) => raw
                    .parse::<u16>()
                    .map_err(|e| Error::Config(format!("ADMIT_PORT is not a valid port: {}", e)))?,
                None => toml_config.port.unwrap_or(DEFAULT_PORT),
            },
        };

        let bind_addr = overrides
            .bind_addr
            .or_else(|| env("ADMIT_BIND_ADDR"))
            .or(toml_config.bind_addr)
            .unwrap_or_else(|| "127.0.0.1".to_string());

        let webhook_secret_hash =
            require_secret("webhook_secret_hash", env("ADMIT_WEBHOOK_SECRET_HASH"), toml_config.webhook_secret_hash)?;
        let qr_secret = require_secret("qr_secret", env("ADMIT_QR_SECRET"), toml_config.qr_secret)?;
        let admin_secret =
            require_secret("admin_secret", env("ADMIT_ADMIN_SECRET"), toml_config.admin_secret)?;

        let admin_request_window_ms = toml_config
            .admin_request_window_ms
            .unwrap_or(DEFAULT_ADMIN_WINDOW_MS);
        if admin_request_window_ms <= 0 {
            return Err(Error::Config(
                "admin_request_window_ms must be positive".to_string(),
            ));
        }

        let ticket_id_prefix = toml_config
            .ticket_id_prefix
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TICKET_ID_PREFIX.to_string());

        let provider = env("ADMIT_PROVIDER_SECRET_KEY")
            .or(toml_config.provider_secret_key)
            .filter(|k| !k.is_empty())
            .map(|secret_key| ProviderConfig {
                api_url: toml_config
                    .provider_api_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PROVIDER_API_URL.to_string()),
                secret_key,
            });

        Ok(Self {
            database_path,
            bind_addr,
            port,
            webhook_secret_hash,
            qr_secret,
            admin_secret,
            admin_request_window_ms,
            ticket_id_prefix,
            cors_origin: toml_config.cors_origin,
            provider,
            logging: toml_config.logging,
        })
    }
}

fn require_secret(name: &str, from_env: Option<String>, from_toml: Option<String>) -> Result<String> {
    from_env
        .or(from_toml)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Config(format!("{} is not set", name)))
}

/// Locate and parse the config file, if any
///
/// Returns the path that was read alongside its contents; no file yields the
/// compiled defaults.
pub fn read_config_file(explicit: Option<&Path>) -> Result<(Option<PathBuf>, TomlConfig)> {
    match find_config_file(explicit) {
        Some(path) => {
            let config = load_toml_file(&path)?;
            Ok((Some(path), config))
        }
        None => Ok((None, TomlConfig::default())),
    }
}

/// Parse a TOML config file
pub fn load_toml_file(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Locate the config file
///
/// Explicit path first, then `ADMIT_CONFIG`, then the user config directory,
/// then `/etc/admit/config.toml` on Linux.
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("admit").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/admit/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    let folder = if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("admit"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/admit"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("admit"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/admit"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("admit"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\admit"))
    } else {
        PathBuf::from("./admit_data")
    };

    folder.join("tickets.db")
}
