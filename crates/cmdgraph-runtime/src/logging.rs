//! Logging setup for cmdgraph processes.
//!
//! One `tracing-subscriber` registry is installed from [`LoggingConfig`]:
//! an `EnvFilter` built from `RUST_LOG` (or the configured level) plus the
//! per-module `filters`, and one `fmt` layer whose layout and writer follow
//! `format` and `output`.
//!
//! ```rust,ignore
//! let config = cmdgraph_runtime::config::load_config()?;
//! cmdgraph_runtime::logging::init_from_config(&config.logging);
//! ```
//!
//! File output rotates daily and keeps `max_files` files. When the log
//! directory cannot be opened the subscriber falls back to stdout.

use std::ffi::OsStr;
use std::path::Path;

use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Installs the global subscriber described by `config`.
///
/// A second call is a no-op: the first installed subscriber stays.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = try_init(config);
}

/// Installs the global subscriber, failing if one is already set.
pub fn try_init(config: &LoggingConfig) -> Result<(), TryInitError> {
    let (writer, file_fallback) = match config.output {
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), false),
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), false),
        LogOutput::File => match config
            .file_path
            .as_deref()
            .and_then(|path| file_appender(path, config.max_files))
        {
            Some(appender) => (BoxMakeWriter::new(appender), false),
            None => (BoxMakeWriter::new(std::io::stdout), true),
        },
    };

    tracing_subscriber::registry()
        .with(fmt_layer(config, writer))
        .with(env_filter(config))
        .try_init()?;

    if file_fallback {
        warn!("File output unavailable, logging to stdout");
    }
    if config.format == LogFormat::Json && cfg!(not(feature = "json-log")) {
        warn!("JSON logging requires the `json-log` feature, using compact");
    }
    Ok(())
}

fn fmt_layer(config: &LoggingConfig, writer: BoxMakeWriter) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(writer)
        .with_span_events(span_events(&config.span_events))
        .with_thread_ids(config.thread_ids)
        .with_file(config.file_location)
        .with_line_number(config.file_location);

    match config.format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Full => layer.boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        #[cfg(feature = "json-log")]
        LogFormat::Json => layer.json().boxed(),
        #[cfg(not(feature = "json-log"))]
        LogFormat::Json => layer.compact().boxed(),
    }
}

/// `RUST_LOG` wins over the configured level; module filters apply on top.
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    for directive in directives(config) {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Ignoring invalid log directive '{directive}': {e}"),
        }
    }
    filter
}

/// `module=level` directives, sorted by module.
fn directives(config: &LoggingConfig) -> Vec<String> {
    let mut filters: Vec<_> = config.filters.iter().collect();
    filters.sort_by(|a, b| a.0.cmp(b.0));
    filters
        .into_iter()
        .map(|(module, level)| format!("{module}={level}"))
        .collect()
}

fn span_events(config: &SpanEventConfig) -> FmtSpan {
    [
        (config.new, FmtSpan::NEW),
        (config.enter, FmtSpan::ENTER),
        (config.exit, FmtSpan::EXIT),
        (config.close, FmtSpan::CLOSE),
    ]
    .into_iter()
    .filter(|(on, _)| *on)
    .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
}

/// Daily-rotated appender writing `<file name>.<date>` beside `path`.
fn file_appender(path: &Path, max_files: u32) -> Option<RollingFileAppender> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .unwrap_or_else(|| OsStr::new("cmdgraph.log"))
        .to_string_lossy()
        .into_owned();

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(max_files.max(1) as usize)
        .build(dir)
        .map_err(|e| eprintln!("Cannot open log file {}: {e}", path.display()))
        .ok()
}
