//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pairing::PairingOptions;
use crate::standings::ByeBuchholzPolicy;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to load layered config: {0}")]
    LayerError(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pairing and standings behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Buchholz credit for a bye round
    #[serde(default)]
    pub bye_buchholz: ByeBuchholzPolicy,

    /// Backtracking steps before a round is declared impossible
    #[serde(default = "default_max_search_steps")]
    pub max_search_steps: u64,

    /// Complete the tournament once the last round's results are in
    #[serde(default = "default_auto_complete")]
    pub auto_complete: bool,
}

fn default_max_search_steps() -> u64 {
    200_000
}

fn default_auto_complete() -> bool {
    true
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            bye_buchholz: ByeBuchholzPolicy::default(),
            max_search_steps: default_max_search_steps(),
            auto_complete: default_auto_complete(),
        }
    }
}

impl PairingConfig {
    pub fn options(&self) -> PairingOptions {
        PairingOptions {
            max_search_steps: self.max_search_steps,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub pairing: PairingConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            server: ServerConfig::default(),
            pairing: PairingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults, then an optional TOML file, then `SWISS_*` environment
    /// variables (`SWISS_SERVER__PORT=9000` sets `server.port`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix("SWISS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.pairing.max_search_steps == 0 {
            return Err(ConfigError::ValidationError(
                "Pairing search budget must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pairing.bye_buchholz, ByeBuchholzPolicy::OwnScore);
        assert_eq!(config.pairing.max_search_steps, 200_000);
        assert!(config.pairing.auto_complete);
    }

    #[test]
    fn test_config_validation_bad_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_budget() {
        let mut config = AppConfig::default();
        config.pairing.max_search_steps = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("swiss.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/srv/club"

[pairing]
bye_buchholz = "field_median"
"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/club"));
        assert_eq!(config.pairing.bye_buchholz, ByeBuchholzPolicy::FieldMedian);
        assert_eq!(config.pairing.max_search_steps, 200_000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "[server]\nport = 0\n").unwrap();

        assert!(matches!(
            AppConfig::from_file(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_load_layers_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("swiss.toml");
        std::fs::write(&path, "[pairing]\nauto_complete = false\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(!config.pairing.auto_complete);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.data_dir, parsed.data_dir);
        assert_eq!(config.pairing.bye_buchholz, parsed.pairing.bye_buchholz);
    }
}
