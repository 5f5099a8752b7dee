//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CmdGraphConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to compact otherwise.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, used when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-module levels, e.g. `cmdgraph_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line of each event.
    #[serde(default)]
    pub file_location: bool,

    /// Log files are rotated daily; older files beyond this count are removed.
    #[serde(default = "default_max_files")]
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            filters: HashMap::new(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            max_files: default_max_files(),
        }
    }
}

fn default_max_files() -> u32 {
    5
}

// =============================================================================
// Bot
// =============================================================================

/// Which declared connection this process serves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    /// Session name of the connection to look up at startup.
    #[serde(default = "default_session")]
    pub session: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            session: default_session(),
        }
    }
}

fn default_session() -> String {
    "tg_cmd_bot".to_string()
}

// =============================================================================
// Storage
// =============================================================================

/// Graph storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// JSON file holding the persisted declaration.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./db/cmdgraph.json")
}

// =============================================================================
// Plugins
// =============================================================================

/// Plugin discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginsConfig {
    /// Directory scanned for external plugin manifests.
    #[serde(default = "default_plugin_dir")]
    pub dir: PathBuf,

    /// Whether compiled-in plugins are offered.
    #[serde(default = "default_true")]
    pub builtin: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: default_plugin_dir(),
            builtin: true,
        }
    }
}

fn default_plugin_dir() -> PathBuf {
    PathBuf::from("./plugins")
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Scheduler
// =============================================================================

/// Auto-dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Seconds to pause after a tick that failed as a whole.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

fn default_interval_secs() -> u64 {
    5
}

fn default_retry_delay_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = CmdGraphConfig::default();
        assert_eq!(config.bot.session, "tg_cmd_bot");
        assert_eq!(config.storage.path, PathBuf::from("./db/cmdgraph.json"));
        assert!(config.plugins.builtin);
        assert_eq!(config.scheduler.interval(), Duration::from_secs(5));
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: CmdGraphConfig = serde_json::from_value(json!({
            "scheduler": { "interval_secs": 60 },
            "logging": { "level": "debug", "filters": { "cmdgraph_framework": "trace" } }
        }))
        .unwrap();
        assert_eq!(config.scheduler.interval_secs, 60);
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.retry_delay_secs, 5);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filters["cmdgraph_framework"], LogLevel::Trace);
        assert_eq!(config.logging.max_files, 5);
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        let result: Result<CmdGraphConfig, _> =
            serde_json::from_value(json!({ "logging": { "level": "loud" } }));
        assert!(result.is_err());
    }
}
