//! Signing key storage.

use std::fs;
use std::path::Path;

use super::ConfigError;
use crate::record::Keys;

/// Load the stored signing key.
pub fn load_keys(path: &Path) -> Result<Keys, ConfigError> {
    let secret = match fs::read_to_string(path) {
        Ok(secret) => secret,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::MissingKey(path.to_path_buf()));
        }
        Err(e) => return Err(ConfigError::Io(path.to_path_buf(), e)),
    };
    Keys::parse(&secret).map_err(|e| ConfigError::InvalidKey(e.to_string()))
}

/// Store `keys` as hex, readable only by the owner on unix.
pub fn save_keys(path: &Path, keys: &Keys) -> Result<(), ConfigError> {
    let io_err = |e| ConfigError::Io(path.to_path_buf(), e);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::Io(parent.to_path_buf(), e))?;
    }
    fs::write(path, keys.secret_hex()).map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(io_err)?;
    }
    Ok(())
}
