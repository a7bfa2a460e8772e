/// Service configuration.
///
/// Settings are layered, later layers winning:
///   1. built-in defaults
///   2. a TOML file (`--config`, `$HMPI_CONFIG`, or `./hmpi.toml` if present)
///   3. environment variables, after `.env` is loaded
///
/// Example `hmpi.toml`:
///
/// ```toml
/// [server]
/// port = 8080
/// upload_dir = "/var/tmp/hmpi"
///
/// [logging]
/// level = "debug"
/// file = "hmpi.log"
///
/// [ingest]
/// invalid_value_policy = "skip_metal"
/// ```

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ingest::InvalidValuePolicy;
use crate::logging::{self, Component, LogLevel};

pub const DEFAULT_CONFIG_FILE: &str = "hmpi.toml";

/// 16 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub ingest: IngestConfig,
    /// File the settings were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request body cap for uploads, in bytes.
    pub max_upload_bytes: usize,
    /// Where uploads are staged while being processed. Created on startup.
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            console_timestamps: false,
        }
    }
}

impl LoggingConfig {
    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        self.level.parse().map_err(|_| ConfigError::InvalidValue {
            key: "logging.level".to_string(),
            value: self.level.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    pub invalid_value_policy: InvalidValuePolicy,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    Io { path: String, message: String },
    /// The config file is not valid TOML or has unknown keys.
    Parse(String),
    /// A setting has a value outside its allowed range.
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "Cannot read config file {}: {}", path, message)
            }
            ConfigError::Parse(msg) => write!(f, "Invalid config file: {}", msg),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value for {}: '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl ServiceConfig {
    /// Parses a TOML document. Missing sections and keys fall back to
    /// defaults; unknown keys are rejected so typos don't go unnoticed.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Applies environment overrides. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value })
        }

        // PORT is the conventional name on most hosting platforms.
        if let Some(v) = lookup("PORT") {
            self.server.port = parsed("PORT", v)?;
        }
        if let Some(v) = lookup("HMPI_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("HMPI_UPLOAD_DIR") {
            self.server.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("HMPI_MAX_UPLOAD_BYTES") {
            self.server.max_upload_bytes = parsed("HMPI_MAX_UPLOAD_BYTES", v)?;
        }
        if let Some(v) = lookup("HMPI_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("HMPI_LOG_FILE") {
            self.logging.file = Some(v);
        }
        if let Some(v) = lookup("HMPI_INVALID_VALUE_POLICY") {
            self.ingest.invalid_value_policy = parsed("HMPI_INVALID_VALUE_POLICY", v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.log_level()?;
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "server.max_upload_bytes".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Reports where the settings came from. Call once the logger is up.
    pub fn log_loaded(&self) {
        let origin = self.source.as_ref().map(|p| p.display().to_string());
        let message = format!(
            "{}; level={} policy={} max_upload_bytes={}",
            if origin.is_some() { "Loaded config file" } else { "No config file, using defaults" },
            self.logging.level,
            self.ingest.invalid_value_policy,
            self.server.max_upload_bytes,
        );
        logging::info(Component::Config, origin.as_deref(), &message);
    }

    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Resolves which config file to read, if any.
fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = env::var("HMPI_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.exists().then_some(default)
}

/// Loads the full layered configuration.
pub fn load(explicit: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    dotenv::dotenv().ok();

    let mut config = match resolve_config_path(explicit) {
        Some(path) => ServiceConfig::from_file(&path)?,
        None => ServiceConfig::default(),
    };
    config.apply_env(|key| env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.ingest.invalid_value_policy, InvalidValuePolicy::RejectBatch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = ServiceConfig::from_toml_str(
            r#"
            [server]
            port = 8080

            [ingest]
            invalid_value_policy = "skip_metal"
            "#,
        )
        .expect("valid partial config should parse");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.ingest.invalid_value_policy, InvalidValuePolicy::SkipMetal);
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let config = ServiceConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = ServiceConfig::from_toml_str("[server]\nprot = 1\n");
        assert!(
            matches!(result, Err(ConfigError::Parse(_))),
            "typo'd key should fail to parse, got {:?}",
            result
        );
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result = ServiceConfig::from_toml_str("[ingest]\ninvalid_value_policy = \"nan\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = ServiceConfig::from_toml_str("[server]\nport = 8080\n").unwrap();
        config
            .apply_env(env_from(&[
                ("PORT", "9090"),
                ("HMPI_HOST", "127.0.0.1"),
                ("HMPI_LOG_LEVEL", "debug"),
                ("HMPI_INVALID_VALUE_POLICY", "skip_metal"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.bind_address(), "127.0.0.1:9090");
        assert_eq!(config.logging.log_level(), Ok(LogLevel::Debug));
        assert_eq!(config.ingest.invalid_value_policy, InvalidValuePolicy::SkipMetal);
    }

    #[test]
    fn test_non_numeric_port_is_reported_with_its_key() {
        let mut config = ServiceConfig::default();
        let err = config.apply_env(env_from(&[("PORT", "http")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "PORT".to_string(),
                value: "http".to_string(),
            }
        );
    }

    #[test]
    fn test_validate_rejects_bad_log_level_and_zero_upload_cap() {
        let mut config = ServiceConfig::default();
        config.logging.level = "chatty".to_string();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.server.max_upload_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_path_is_recorded() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 7000").unwrap();

        let config = ServiceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.source.as_deref(), Some(file.path()));
        assert_eq!(ServiceConfig::from_toml_str("").unwrap().source, None);
    }

    #[test]
    fn test_missing_config_file_is_an_io_error() {
        let result = ServiceConfig::from_file(Path::new("/nonexistent/hmpi.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
