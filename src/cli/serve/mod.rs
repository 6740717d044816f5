//! Resolver HTTP server.
//!
//! ```text
//! tiny_http accept loop ──> rayon pool (4 threads)
//!                              └─ block_on(Resolver::resolve) on the tokio runtime
//! ```

mod lifecycle;
mod response;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tiny_http::{Method, Request, Server};
use tokio::runtime::Handle;

use super::common::{relay_pool, runtime};
use crate::config::Settings;
use crate::resolve::{Resolver, Route, RoutingMode};
use crate::{debug, log};

/// Request worker threads.
const WORKERS: usize = 4;

/// Command-line overrides of the `[serve]` section.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServeOverrides {
    pub port: Option<u16>,
    pub interface: Option<IpAddr>,
    pub mode: Option<RoutingMode>,
}

/// Shared per-request state.
struct ServeState {
    resolver: Resolver,
    runtime: Handle,
    probe_timeout: Duration,
}

/// Bind and run the server until Ctrl+C.
pub fn serve(settings: &Settings, overrides: ServeOverrides) -> Result<()> {
    let interface = overrides.interface.unwrap_or(settings.serve.interface);
    let port = overrides.port.unwrap_or(settings.serve.port);
    let mode = overrides.mode.unwrap_or(settings.serve.mode);

    let pool = relay_pool(settings)?;
    let runtime = runtime()?;

    let (server, addr) = lifecycle::bind_with_retry(interface, port)?;
    let server = Arc::new(server);
    lifecycle::register_for_shutdown(&server);

    log!("serve"; "http://{} ({} mode, {})", addr, mode.name(),
        crate::utils::plural_count(pool.urls().len(), "relay"));

    let state = Arc::new(ServeState {
        resolver: Resolver::new(Arc::clone(&pool), mode),
        runtime: runtime.handle().clone(),
        probe_timeout: settings.network.probe_timeout(),
    });
    run_request_loop(&server, &state)?;

    runtime.block_on(pool.close());
    Ok(())
}

fn run_request_loop(server: &Server, state: &Arc<ServeState>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(WORKERS)
        .build()
        .context("Failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let state = Arc::clone(state);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &state) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, state: &ServeState) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }
    if request.method() != &Method::Get && !response::is_head_request(&request) {
        return response::respond_method_not_allowed(request);
    }

    let url = request.url().to_owned();
    if Route::parse(&url) == Route::Health {
        return respond_health(request, state);
    }

    let host = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Host"))
        .map(|h| h.value.as_str().to_owned());

    match state
        .runtime
        .block_on(state.resolver.resolve(&url, host.as_deref()))
    {
        Ok(resolved) => {
            debug!("serve"; "{} -> {}", url, resolved.record_id);
            response::respond_resolved(request, resolved)
        }
        Err(e) => {
            debug!("serve"; "{} -> {}", url, e);
            response::respond_error(request, &e)
        }
    }
}

/// Reachability of every configured relay; 200 when at least one answers.
fn respond_health(request: Request, state: &ServeState) -> Result<()> {
    let probes = state
        .runtime
        .block_on(state.resolver.pool().probe(state.probe_timeout));
    let healthy = probes.iter().any(|(_, reachable)| *reachable);
    let relays: Vec<_> = probes
        .into_iter()
        .map(|(url, reachable)| json!({ "url": url, "reachable": reachable }))
        .collect();
    let body = json!({
        "mode": state.resolver.mode().name(),
        "relays": relays,
    });
    response::respond_json(request, if healthy { 200 } else { 503 }, &body)
}
