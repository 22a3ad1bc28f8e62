use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cylinders: CylinderConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub email: EmailConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: Option<u16>,
    pub unix_socket: Option<PathBuf>,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_wal_path")]
    pub wal_path: PathBuf,
    /// Rewrite the WAL with one record per profile after replay
    #[serde(default = "default_compact_on_startup")]
    pub compact_on_startup: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CylinderConfig {
    /// Sizes accepted by the add endpoint; empty accepts any positive size
    #[serde(default = "default_allowed_sizes")]
    pub allowed_sizes: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Used by the email channel when a stored threshold is unusable
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
    #[serde(default = "default_keep_alive_seconds")]
    pub stream_keep_alive_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// One of: log, smtp, relay
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default)]
    pub relay_endpoint: String,
    #[serde(default)]
    pub relay_api_key: String,
    #[serde(default = "default_relay_timeout")]
    pub relay_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_console")]
    pub console: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            wal_path: default_wal_path(),
            compact_on_startup: default_compact_on_startup(),
        }
    }
}

impl Default for CylinderConfig {
    fn default() -> Self {
        Self {
            allowed_sizes: default_allowed_sizes(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            stream_keep_alive_seconds: default_keep_alive_seconds(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            from_address: default_from_address(),
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            relay_endpoint: String::new(),
            relay_api_key: String::new(),
            relay_timeout_seconds: default_relay_timeout(),
        }
    }
}

// Default value functions
fn default_num_threads() -> usize {
    num_cpus::get()
}

fn default_wal_path() -> PathBuf {
    PathBuf::from("gasmon.wal")
}

fn default_compact_on_startup() -> bool {
    true
}

fn default_allowed_sizes() -> Vec<f64> {
    crate::models::cylinder::STANDARD_SIZES.to_vec()
}

fn default_threshold() -> f64 {
    crate::models::profile::DEFAULT_THRESHOLD_KG
}

fn default_keep_alive_seconds() -> u64 {
    15
}

fn default_transport() -> String {
    "log".to_string()
}

fn default_from_address() -> String {
    "Gas Usage Monitor <noreply@gasusage.com>".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_relay_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_console() -> bool {
    false
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port.is_none() && self.server.unix_socket.is_none() {
            bail!("Either port or unix_socket must be specified in server config");
        }

        if let Some(port) = self.server.port {
            if port == 0 {
                bail!("Server port must be greater than 0");
            }
        }

        if self.server.num_threads == 0 {
            bail!("num_threads must be greater than 0");
        }

        if self.storage.wal_path.as_os_str().is_empty() {
            bail!("wal_path must not be empty");
        }

        if let Some(size) = self.cylinders.allowed_sizes.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            bail!("allowed_sizes must only contain positive sizes, found {}", size);
        }

        if !self.alerts.default_threshold.is_finite() || self.alerts.default_threshold <= 0.0 {
            bail!("default_threshold must be greater than 0");
        }

        if self.alerts.stream_keep_alive_seconds == 0 {
            bail!("stream_keep_alive_seconds must be greater than 0");
        }

        match self.email.transport.as_str() {
            "log" => {}
            "smtp" => {
                if self.email.smtp_host.is_empty() {
                    bail!("smtp_host must not be empty when transport is smtp");
                }
            }
            "relay" => {
                if self.email.relay_endpoint.is_empty() {
                    bail!("relay_endpoint must not be empty when transport is relay");
                }
                if self.email.relay_timeout_seconds == 0 {
                    bail!("relay_timeout_seconds must be greater than 0");
                }
            }
            other => bail!(
                "Invalid email transport '{}'. Must be one of: log, smtp, relay",
                other
            ),
        }

        if self.admin.api_key.is_empty() {
            bail!("api_key must not be empty");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }

        let valid_formats = ["json", "console"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: json, console",
                self.logging.format
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        port = 8080

        [admin]
        api_key = "secret"

        [logging]
        level = "info"
    "#;

    #[test]
    fn test_load_example_config() {
        let path = PathBuf::from("config.example.toml");
        let config = Config::from_file(&path).expect("Failed to load config");

        assert_eq!(config.server.port, Some(8080));
        assert_eq!(config.email.transport, "log");
        assert_eq!(config.cylinders.allowed_sizes, vec![3.0, 6.0, 13.0]);
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();

        assert_eq!(config.storage.wal_path, PathBuf::from("gasmon.wal"));
        assert!(config.storage.compact_on_startup);
        assert_eq!(config.alerts.default_threshold, 3.0);
        assert_eq!(config.email.transport, "log");
        assert_eq!(config.logging.format, "json");
        assert!(config.server.num_threads > 0);
    }

    #[test]
    fn test_requires_listener() {
        let toml = r#"
            [server]
            [admin]
            api_key = "secret"
            [logging]
        "#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_smtp_requires_host() {
        let toml = format!("{}\n[email]\ntransport = \"smtp\"\n", MINIMAL);
        let err = Config::from_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("smtp_host"));
    }

    #[test]
    fn test_rejects_unknown_transport() {
        let toml = format!("{}\n[email]\ntransport = \"pigeon\"\n", MINIMAL);
        assert!(Config::from_toml(&toml).is_err());
    }

    #[test]
    fn test_rejects_non_positive_sizes() {
        let toml = format!("{}\n[cylinders]\nallowed_sizes = [3.0, 0.0]\n", MINIMAL);
        assert!(Config::from_toml(&toml).is_err());
    }

    #[test]
    fn test_rejects_bad_log_level() {
        let toml = MINIMAL.replace("level = \"info\"", "level = \"loud\"");
        assert!(Config::from_toml(&toml).is_err());
    }
}
