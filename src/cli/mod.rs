//! Command-line interface module.

mod args;
mod common;
pub mod deploy;
pub mod keys;
pub mod prompt;
pub mod relays;
pub mod serve;

pub use args::{Cli, Commands};
