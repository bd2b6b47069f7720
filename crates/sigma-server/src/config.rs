//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// TLS transport settings.
    #[serde(default)]
    pub tls: TlsConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "sigma_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// TLS configuration. When enabled the same router is served over TLS
/// instead of plaintext.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// PEM file holding the certificate chain.
    #[serde(default = "default_cert_path")]
    pub cert_path: PathBuf,

    /// PEM file holding the private key.
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "./db/sigma.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cert_path() -> PathBuf {
    PathBuf::from("./certs/server.crt")
}

fn default_key_path() -> PathBuf {
    PathBuf::from("./certs/server.key")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cert_path: default_cert_path(),
            key_path: default_key_path(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies overrides from the process environment.
///
/// See [`apply_env_overrides`] for the recognised variables.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies environment overrides using `lookup` to read variables.
///
/// - `PORT` / `SIGMA_PORT` override `server.port`
/// - `SIGMA_HOST` overrides `server.host`
/// - `DB_PATH` / `SIGMA_DB_PATH` override `database.path`
/// - `SIGMA_LOG_LEVEL` overrides `logging.level`
/// - `SIGMA_LOG_JSON` overrides `logging.json` ("true" or "1")
/// - `SIGMA_TLS_ENABLED` overrides `tls.enabled` ("true" or "1")
/// - `SIGMA_TLS_CERT_PATH` / `SIGMA_TLS_KEY_PATH` override the PEM paths
///
/// The `SIGMA_` form wins when both are set. Unparsable values are ignored.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let first = |keys: &[&str]| keys.iter().find_map(|&key| lookup(key));
    let flag = |value: String| value == "true" || value == "1";

    if let Some(host) = first(&["SIGMA_HOST"]) {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = first(&["SIGMA_PORT", "PORT"]) {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = first(&["SIGMA_DB_PATH", "DB_PATH"]) {
        config.database.path = db_path;
    }
    if let Some(level) = first(&["SIGMA_LOG_LEVEL"]) {
        config.logging.level = level;
    }
    if let Some(json) = first(&["SIGMA_LOG_JSON"]) {
        config.logging.json = flag(json);
    }
    if let Some(enabled) = first(&["SIGMA_TLS_ENABLED"]) {
        config.tls.enabled = flag(enabled);
    }
    if let Some(cert) = first(&["SIGMA_TLS_CERT_PATH"]) {
        config.tls.cert_path = PathBuf::from(cert);
    }
    if let Some(key) = first(&["SIGMA_TLS_KEY_PATH"]) {
        config.tls.key_path = PathBuf::from(key);
    }
}
