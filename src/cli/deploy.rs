//! `deploy` command.

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::common::{relay_pool, runtime};
use crate::config::keystore::load_keys;
use crate::config::{ServeConfig, Settings};
use crate::core::shutdown_token;
use crate::deploy::{
    DeployOptions, DeploySession, HttpUploader, PublishOutcome, RootAddress, normalize_identifier,
};
use crate::log;
use crate::record::address::{encode_note, encode_npub};

pub fn deploy_site(
    settings: &Settings,
    site: &Path,
    mutable: bool,
    identifier: Option<&str>,
) -> Result<()> {
    let keys = load_keys(&settings.paths().secret())?;
    let pool = relay_pool(settings)?;

    let identifier = match (mutable, identifier.and_then(normalize_identifier)) {
        (true, None) => Some(super::prompt::ask("Identifier")?),
        (_, given) => given,
    };
    let options = DeployOptions {
        site: site.to_path_buf(),
        mutable,
        identifier,
    };

    let session = DeploySession::new(
        keys,
        pool,
        Arc::new(HttpUploader::new()),
        settings.deploy.clone(),
        settings.network.clone(),
        shutdown_token(),
    );
    let outcome = runtime()?
        .block_on(session.run(&options))
        .with_context(|| format!("Failed to deploy {}", site.display()))?;

    log!("deploy"; "root record {}", encode_note(&outcome.root_id)?);
    let (default_url, secure_url) = access_urls(&outcome, &settings.serve)?;
    println!("{default_url}");
    println!("{secure_url}");
    Ok(())
}

/// Default-mode and secure-mode URLs under which `serve` exposes the site.
fn access_urls(outcome: &PublishOutcome, serve: &ServeConfig) -> Result<(String, String)> {
    let author = crate::record::decode_hex32(&outcome.author).context("Invalid author key")?;
    let npub = encode_npub(&author)?;
    let host = match serve.interface {
        IpAddr::V4(ip) if ip.is_loopback() || ip.is_unspecified() => "localhost".to_owned(),
        ip => ip.to_string(),
    };
    let port = serve.port;

    Ok(match &outcome.address {
        RootAddress::Pointer(pointer) => (
            format!("http://{host}:{port}/e/{pointer}"),
            format!("http://{npub}.{host}:{port}/e/{pointer}"),
        ),
        RootAddress::Identifier(identifier) => (
            format!("http://{host}:{port}/p/{npub}/d/{identifier}"),
            format!("http://{npub}.{host}:{port}/d/{identifier}"),
        ),
    })
}
