pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod launcher;
pub mod loader;
pub mod port;
pub mod server;
pub mod session;

pub use client::ModelClient;
pub use config::{PortRange, ServerConfig, SnapshotSource};
pub use context::ServerContext;
pub use error::{ClientErr, ServerErr, SessionErr};
pub use launcher::{ServerProcess, SnapshotInput};
pub use server::ModelServer;
pub use session::{Dispatcher, Flow, SessionConfig};
