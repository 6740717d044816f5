//! Core types - pure abstractions shared across the codebase.

mod category;
mod kind;
mod link;
mod state;

pub use category::FileKind;
pub use kind::{ContentTypeSource, PayloadEncoding, RecordKind};
pub use link::LinkKind;
pub use state::{is_shutdown, register_server, setup_shutdown_handler, shutdown_token};
