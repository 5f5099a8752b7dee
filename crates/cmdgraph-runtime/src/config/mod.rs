//! Configuration module for the cmdgraph runtime.
//!
//! Layered loading (defaults, TOML/YAML files, `CMDGRAPH_*` environment
//! variables) and validation of the settings a bot process needs: logging,
//! the served session, graph storage, plugin discovery and the auto scheduler.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, load_config, load_config_from_file};
pub use schema::{
    BotConfig, CmdGraphConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, PluginsConfig,
    SchedulerConfig, SpanEventConfig, StorageConfig,
};
pub use validation::validate_config;
