//! Signing key commands.

use anyhow::{Context, Result, bail};

use crate::config::Settings;
use crate::config::keystore::{load_keys, save_keys};
use crate::log;
use crate::record::Keys;
use crate::record::address::{encode_npub, encode_nsec};

/// Store a hex or `nsec` secret key.
pub fn set_private(settings: &Settings, input: &str) -> Result<()> {
    let keys = Keys::parse(input.trim()).context("Invalid private key")?;
    let path = settings.paths().secret();
    save_keys(&path, &keys)?;
    log!("keys"; "saved private key to {}", path.display());
    print_public(&keys)
}

/// Print the public key of the stored secret.
pub fn show_public(settings: &Settings) -> Result<()> {
    let keys = load_keys(&settings.paths().secret())?;
    print_public(&keys)
}

/// Generate and store a new key.
pub fn generate(settings: &Settings, force: bool) -> Result<()> {
    let path = settings.paths().secret();
    if path.exists()
        && !force
        && !super::prompt::confirm(&format!("{} exists. Overwrite?", path.display()))?
    {
        bail!("Aborted, existing key kept");
    }

    let keys = Keys::generate();
    save_keys(&path, &keys)?;
    log!("keys"; "saved new private key to {}", path.display());
    println!("nsec: {}", encode_nsec(&keys.secret_bytes())?);
    print_public(&keys)
}

fn print_public(keys: &Keys) -> Result<()> {
    println!("npub: {}", encode_npub(&keys.public_bytes())?);
    println!("hex:  {}", keys.public_hex());
    Ok(())
}
