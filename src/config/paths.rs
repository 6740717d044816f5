//! Settings directory layout.
//!
//! ```text
//! ~/.relayhost/
//! ├── config.toml   # [deploy] [network] [serve]
//! ├── relays        # one relay URL per line
//! └── secret        # signing key, hex
//! ```

use std::path::PathBuf;

/// Default settings directory, tilde expanded.
const DEFAULT_DIR: &str = "~/.relayhost";

/// Environment variable overriding the settings directory.
pub const HOME_ENV: &str = "RELAYHOST_HOME";

/// Resolved locations of the persisted settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsPaths {
    dir: PathBuf,
}

impl SettingsPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$RELAYHOST_HOME` if set, else `~/.relayhost`.
    pub fn from_env() -> Self {
        let dir = std::env::var(HOME_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DIR.to_string());
        Self::new(shellexpand::tilde(&dir).into_owned())
    }

    pub fn config(&self) -> PathBuf {
        self.dir.join("config.toml")
    }

    pub fn relays(&self) -> PathBuf {
        self.dir.join("relays")
    }

    pub fn secret(&self) -> PathBuf {
        self.dir.join("secret")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = SettingsPaths::new("/home/u/.relayhost");
        assert_eq!(paths.config(), PathBuf::from("/home/u/.relayhost/config.toml"));
        assert_eq!(paths.relays(), PathBuf::from("/home/u/.relayhost/relays"));
        assert_eq!(paths.secret(), PathBuf::from("/home/u/.relayhost/secret"));
    }
}
