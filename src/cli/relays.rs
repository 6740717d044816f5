//! Relay list commands.

use anyhow::{Result, bail};

use crate::config::Settings;
use crate::config::relays::{self, EndpointSet, EndpointSource, RELAY_URLS_ENV};
use crate::log;

pub fn add(settings: &Settings, url: &str) -> Result<()> {
    let url = url.trim();
    if !relays::is_relay_url(url) {
        bail!("`{url}` is not a ws:// or wss:// URL");
    }
    let path = settings.paths().relays();
    if relays::add_relay(&path, url)? {
        log!("relay"; "added {}", url);
    } else {
        log!("relay"; "{} is already listed", url);
    }
    Ok(())
}

pub fn remove(settings: &Settings, url: &str) -> Result<()> {
    let path = settings.paths().relays();
    if relays::remove_relay(&path, url.trim())? {
        log!("relay"; "removed {}", url);
    } else {
        log!("relay"; "{} was not listed", url);
    }
    Ok(())
}

pub fn list(settings: &Settings) -> Result<()> {
    let set = EndpointSet::load(&settings.paths().relays())?;
    match set.source() {
        EndpointSource::Env => log!("relay"; "using ${}", RELAY_URLS_ENV),
        EndpointSource::File(path) => crate::debug!("relay"; "reading {}", path.display()),
    }
    if set.is_empty() {
        log!("relay"; "no relays configured, add one with `relayhost add-relay <url>`");
    }
    for url in set.urls() {
        println!("{url}");
    }
    Ok(())
}
