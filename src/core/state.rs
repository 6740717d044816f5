//! Process-wide shutdown state.
//!
//! Ctrl+C sets `SHUTDOWN`, cancels the root token handed out to deploy
//! sessions, and unblocks the HTTP server if one is registered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, OnceLock};

use tiny_http::Server;
use tokio_util::sync::CancellationToken;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Root cancellation token, children are given to async work.
static CANCEL: LazyLock<CancellationToken> = LazyLock::new(CancellationToken::new);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        // Second Ctrl+C while shutting down exits immediately.
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        CANCEL.cancel();

        if let Some(server) = SERVER.get() {
            crate::log!("serve"; "shutting down...");
            server.unblock();
        } else {
            crate::log!("deploy"; "cancelling, waiting for pending requests...");
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the HTTP server for graceful shutdown.
pub fn register_server(server: Arc<Server>) {
    let _ = SERVER.set(server);
}

/// Token cancelled when the user interrupts the process.
pub fn shutdown_token() -> CancellationToken {
    CANCEL.child_token()
}

/// Check if shutdown has been requested.
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
