//! rfchat CLI Configuration Management
//!
//! Configuration is layered, highest priority first:
//! - Command line arguments (`--name`, `--bind`, `--data-dir`)
//! - Configuration file given with `--config` (TOML)
//! - Default values
//!
//! Every section is `#[serde(default)]`, so a file only needs the keys it
//! changes.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use rfchat_core::LinkConfig;
use rfchat_tcp::TcpTransportConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

/// Directory name used under the platform data directory
const DATA_DIR_NAME: &str = "rfchat";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the rfchat CLI application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Connection runtime configuration
    pub link: LinkConfig,

    /// TCP transport configuration
    pub tcp: TcpTransportConfig,

    /// CLI-specific configuration
    pub cli: CliConfig,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Where conversation and message history is kept
    pub data_dir: Option<PathBuf>,

    /// Whether history is written at all
    pub persist_history: bool,

    /// Prompt shown by the interactive interface
    pub prompt: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            persist_history: true,
            prompt: "rfchat> ".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Loading and Saving
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply command line overrides
    pub fn apply_overrides(
        &mut self,
        name: Option<String>,
        bind: Option<SocketAddr>,
        data_dir: Option<String>,
    ) {
        if let Some(name) = name {
            self.tcp.display_name = name;
        }
        if let Some(bind) = bind {
            self.tcp.bind_addr = bind;
        }
        if let Some(data_dir) = data_dir {
            self.cli.data_dir = Some(data_dir.into());
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.link.validate()?;
        self.tcp.validate()?;
        if self.cli.prompt.is_empty() {
            return Err(CliError::Config("Prompt must not be empty".to_string()));
        }
        Ok(())
    }

    /// Effective history directory
    pub fn data_dir(&self) -> PathBuf {
        match &self.cli.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .map(|dir| dir.join(DATA_DIR_NAME))
                .unwrap_or_else(|| PathBuf::from(".").join(DATA_DIR_NAME)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfchat_core::Framing;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [link]
            framing = "length_delimited"

            [tcp]
            display_name = "Alice"
            "#,
        )
        .unwrap();

        assert_eq!(config.link.framing, Framing::LengthDelimited);
        assert_eq!(config.link.read_buffer_size, 1024);
        assert_eq!(config.tcp.display_name, "Alice");
        assert!(config.cli.persist_history);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = AppConfig::from_toml("[link]\nread_buffer_size = 0\n");
        assert!(matches!(result, Err(CliError::Chat(_))));
    }

    #[test]
    fn test_default_config_survives_toml() {
        let config = AppConfig::default();
        let parsed = AppConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AppConfig::default();
        config.apply_overrides(
            Some("Bob".to_string()),
            Some("127.0.0.1:9100".parse().unwrap()),
            Some("/tmp/rfchat-test".to_string()),
        );
        assert_eq!(config.tcp.display_name, "Bob");
        assert_eq!(config.tcp.bind_addr.port(), 9100);
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/rfchat-test"));
    }
}
