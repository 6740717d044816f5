//! Configuration sections.

mod deploy;
mod network;
mod serve;

pub use deploy::DeployConfig;
pub use network::NetworkConfig;
pub use serve::ServeConfig;
