//! Logging utilities with colored output and progress display.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` for output gated on `--verbose`
//! - `ProgressBar` for concurrent phases (publish, upload)
//!
//! # Example
//!
//! ```ignore
//! log!("deploy"; "publishing {} records", count);
//!
//! let bar = ProgressBar::start("upload", jobs.len());
//! *bar.counter().lock() += 1;
//! bar.finish().await;
//! ```

use crossterm::{
    cursor, execute,
    terminal::{self, Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::Arc,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Active progress bar count (for log coordination)
static BAR_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Refresh interval of the progress display.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Columns reserved next to the bar for prefix and counts.
const BAR_MARGIN: u16 = 12;

/// Widest bar ever drawn.
const BAR_MAX_WIDTH: usize = 100;

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
#[allow(clippy::cast_possible_truncation)] // Safe: bars count is always small
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);

    let mut stdout = stdout().lock();

    // Print above the progress bar, then redraw space for it.
    let bar_count = BAR_COUNT.load(Ordering::SeqCst);
    if bar_count > 0 {
        execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
    } else {
        execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    }

    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str) -> String {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "serve" => prefix.bright_blue().bold().to_string(),
        "deploy" => prefix.bright_green().bold().to_string(),
        "relay" => prefix.bright_cyan().bold().to_string(),
        "upload" => prefix.bright_magenta().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Progress Bar
// ============================================================================

/// Bar width for a terminal of `columns` columns.
fn bar_width(columns: u16) -> usize {
    usize::from(columns.saturating_sub(BAR_MARGIN)).min(BAR_MAX_WIDTH)
}

/// Render `[#####-----] done/total` into `width` bar cells.
fn render_bar(done: usize, total: usize, width: usize) -> String {
    let done = done.min(total);
    let filled = if total == 0 { width } else { width * done / total };
    format!(
        "[{}{}] {done}/{total}",
        "#".repeat(filled),
        "-".repeat(width - filled)
    )
}

/// Completion bar for one concurrent phase.
///
/// Workers bump a shared counter; a background task polls it and redraws
/// the line every 20ms until [`finish`](Self::finish) is awaited.
///
/// ```ignore
/// let bar = ProgressBar::start("publish", records.len());
/// let counter = bar.counter();
/// // in workers:
/// *counter.lock() += 1;
/// bar.finish().await;
/// ```
pub struct ProgressBar {
    label: &'static str,
    total: usize,
    done: Arc<Mutex<usize>>,
    stop: CancellationToken,
    painter: Option<JoinHandle<()>>,
}

impl ProgressBar {
    /// Start drawing a bar for `total` items. Must be called inside a tokio runtime.
    pub fn start(label: &'static str, total: usize) -> Self {
        BAR_COUNT.fetch_add(1, Ordering::SeqCst);
        let done = Arc::new(Mutex::new(0usize));
        let stop = CancellationToken::new();

        let painter = tokio::spawn({
            let done = Arc::clone(&done);
            let stop = stop.clone();
            async move {
                let mut ticker = tokio::time::interval(POLL_INTERVAL);
                loop {
                    tokio::select! {
                        () = stop.cancelled() => break,
                        _ = ticker.tick() => {
                            let current = *done.lock();
                            paint(label, current, total, false);
                            if current >= total {
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self {
            label,
            total,
            done,
            stop,
            painter: Some(painter),
        }
    }

    /// Shared completion counter for worker tasks.
    pub fn counter(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.done)
    }

    pub fn completed(&self) -> usize {
        *self.done.lock()
    }

    /// Stop polling and leave the final state on its own line.
    pub async fn finish(mut self) {
        self.stop.cancel();
        if let Some(painter) = self.painter.take() {
            painter.await.ok();
        }
        paint(self.label, self.completed(), self.total, true);
    }
}

impl Drop for ProgressBar {
    fn drop(&mut self) {
        self.stop.cancel();
        BAR_COUNT.fetch_sub(1, Ordering::SeqCst);
    }
}

fn paint(label: &str, done: usize, total: usize, last: bool) {
    let columns = terminal::size().map(|(cols, _)| cols).unwrap_or(80);
    let line = render_bar(done, total, bar_width(columns));
    let prefix = colorize_prefix(label);

    let mut stdout = stdout().lock();
    execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
    if last {
        writeln!(stdout, "{prefix} {line}").ok();
    } else {
        write!(stdout, "{prefix} {line}").ok();
    }
    stdout.flush().ok();
}

// ============================================================================
// Tests
// ============================================================================
