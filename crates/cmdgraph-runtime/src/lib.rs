//! # Cmdgraph Runtime
//!
//! Everything a cmdgraph bot process needs around the command engine:
//!
//! - Layered configuration ([`config`])
//! - Logging setup ([`logging`])
//! - The JSON-file graph store ([`JsonFileRepository`])
//! - The transport boundary ([`Gateway`], [`deliver`])
//! - The auto-dispatch loop ([`Scheduler`])
//! - Process orchestration ([`BotRuntime`])
//!
//! ```rust,ignore
//! use cmdgraph_runtime::BotRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = BotRuntime::builder().config_file("cmdgraph.toml").build().await?;
//!     let (_tx, rx) = tokio::sync::mpsc::channel(64);
//!     runtime.run(rx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod runtime;
pub mod scheduler;
pub mod store;

pub use config::{CmdGraphConfig, ConfigError, ConfigLoader, ConfigResult};
pub use error::{GatewayError, GatewayResult, RuntimeError, RuntimeResult};
pub use gateway::{ConsoleGateway, Delivery, Gateway, Recipient, RecordingGateway, deliver};
pub use logging::init_from_config;
pub use runtime::{BotRuntime, RuntimeBuilder, registry_from_config};
pub use scheduler::{Scheduler, TickReport};
pub use store::JsonFileRepository;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for plugin and binary authors.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
