//! Settings management for `~/.relayhost/config.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [deploy] [network] [serve]
//! ├── types/         # ConfigError, ConfigDiagnostics
//! ├── paths.rs       # settings directory layout
//! ├── relays.rs      # relay endpoint list
//! ├── keystore.rs    # signing key file
//! └── mod.rs         # Settings (this file)
//! ```
//!
//! # Sections
//!
//! | Section     | Purpose                                            |
//! |-------------|----------------------------------------------------|
//! | `[deploy]`  | Upload endpoint, publish/upload concurrency        |
//! | `[network]` | Request and health-probe timeouts                  |
//! | `[serve]`   | Resolver server interface, port, routing mode      |

pub mod keystore;
mod paths;
pub mod relays;
pub mod section;
pub mod types;

pub use paths::SettingsPaths;
pub use relays::EndpointSet;
pub use section::{DeployConfig, NetworkConfig, ServeConfig};
pub use types::{ConfigDiagnostics, ConfigError};

use crate::cli::Cli;
use crate::log;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Settings directory layout (internal use only)
    #[serde(skip)]
    pub paths: Option<SettingsPaths>,

    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub deploy: DeployConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub serve: ServeConfig,
}

impl Settings {
    /// Load settings for the given CLI invocation.
    ///
    /// A missing config file means defaults; an explicit `--config` that
    /// does not exist is an error.
    pub fn load(cli: &Cli) -> Result<Self> {
        let paths = SettingsPaths::from_env();
        let (config_path, explicit) = match &cli.config {
            Some(path) => (path.clone(), true),
            None => (paths.config(), false),
        };

        let mut settings = if config_path.exists() {
            Self::from_path(&config_path)?
        } else if explicit {
            bail!(ConfigError::Io(
                config_path,
                std::io::Error::from(std::io::ErrorKind::NotFound)
            ));
        } else {
            Self::default()
        };

        settings.validate()?;
        settings.config_path = config_path;
        settings.paths = Some(paths);
        Ok(settings)
    }

    /// Settings directory layout.
    pub fn paths(&self) -> SettingsPaths {
        self.paths.clone().unwrap_or_else(SettingsPaths::from_env)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
            if !crate::cli::prompt::confirm("Continue?")? {
                bail!("Aborted due to unknown config fields");
            }
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        eprintln!();
        log!("warning"; "unknown fields in {}:", path.display());
        log!("warning"; "ignoring:");
        for field in fields {
            eprintln!("- {}", field);
        }
        eprintln!();
    }

    /// Check every section, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        self.deploy.validate(&mut diag);
        self.network.validate(&mut diag);
        diag.into_result()
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> Settings {
    let (parsed, ignored) = Settings::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
