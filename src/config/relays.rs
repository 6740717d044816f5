//! Relay endpoint list.
//!
//! `RELAY_URLS` (comma separated) takes precedence over the persisted list.

use std::fs;
use std::path::{Path, PathBuf};

use super::ConfigError;

/// Environment variable with a comma-separated relay list.
pub const RELAY_URLS_ENV: &str = "RELAY_URLS";

/// Where an endpoint set was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSource {
    Env,
    File(PathBuf),
}

/// Ordered, de-duplicated relay URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSet {
    urls: Vec<String>,
    source: EndpointSource,
}

impl EndpointSet {
    /// Load from `RELAY_URLS` if set and non-empty, else from `file`.
    pub fn load(file: &Path) -> Result<Self, ConfigError> {
        match std::env::var(RELAY_URLS_ENV) {
            Ok(value) if !value.trim().is_empty() => Ok(Self::from_env_value(&value)),
            _ => Self::from_file(file),
        }
    }

    /// Parse the comma-separated env form: entries trimmed, empties dropped.
    pub fn from_env_value(value: &str) -> Self {
        let mut urls = Vec::new();
        for url in value.split(',').map(str::trim).filter(|u| !u.is_empty()) {
            push_unique(&mut urls, url);
        }
        Self {
            urls,
            source: EndpointSource::Env,
        }
    }

    /// Read the persisted list. A missing file is an empty list; any line
    /// that is not a `ws://`/`wss://` URL is fatal.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(ConfigError::Io(path.to_path_buf(), e)),
        };

        let mut urls = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !is_relay_url(line) {
                return Err(ConfigError::MalformedRelay {
                    path: path.to_path_buf(),
                    line: index + 1,
                    value: line.to_string(),
                });
            }
            push_unique(&mut urls, line);
        }

        Ok(Self {
            urls,
            source: EndpointSource::File(path.to_path_buf()),
        })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn into_urls(self) -> Vec<String> {
        self.urls
    }

    pub fn source(&self) -> &EndpointSource {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Append `url` to the persisted list. Returns `false` if already present.
pub fn add_relay(path: &Path, url: &str) -> Result<bool, ConfigError> {
    let url = url.trim();
    if !is_relay_url(url) {
        return Err(ConfigError::MalformedRelay {
            path: path.to_path_buf(),
            line: 0,
            value: url.to_string(),
        });
    }
    let mut urls = EndpointSet::from_file(path)?.into_urls();
    if urls.iter().any(|u| u == url) {
        return Ok(false);
    }
    urls.push(url.to_string());
    write_list(path, &urls)?;
    Ok(true)
}

/// Remove `url` from the persisted list. Returns `false` if it was absent.
pub fn remove_relay(path: &Path, url: &str) -> Result<bool, ConfigError> {
    let url = url.trim();
    let mut urls = EndpointSet::from_file(path)?.into_urls();
    let before = urls.len();
    urls.retain(|u| u != url);
    if urls.len() == before {
        return Ok(false);
    }
    write_list(path, &urls)?;
    Ok(true)
}

fn write_list(path: &Path, urls: &[String]) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::Io(parent.to_path_buf(), e))?;
    }
    let mut content = urls.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
}

fn push_unique(urls: &mut Vec<String>, url: &str) {
    if !urls.iter().any(|u| u == url) {
        urls.push(url.to_string());
    }
}

/// `ws://` or `wss://` URL with a host.
pub fn is_relay_url(value: &str) -> bool {
    url::Url::parse(value)
        .is_ok_and(|url| matches!(url.scheme(), "ws" | "wss") && url.host_str().is_some())
}
