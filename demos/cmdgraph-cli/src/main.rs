//! cmdgraph operator tool.
//!
//! ```bash
//! cmdgraph check  config.json      # validate, print every violation
//! cmdgraph load   config.json      # validate, then store as the live graph
//! cmdgraph export backup.json      # write the stored graph back out
//! cmdgraph plugins                 # list available plugins
//! cmdgraph run --user alice        # console bot: stdin lines are signals
//! ```
//!
//! `check` and `load` exit with 1 when the declaration has violations and
//! with 2 when it cannot be read at all.

// Links the compiled-in sample plugins into this binary.
extern crate sample_plugins;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cmdgraph::core::{Graph, Signal, from_declaration_str, to_declaration_string};
use cmdgraph::framework::{PluginRegistry, Repository, check_with};
use cmdgraph::runtime::config::CmdGraphConfig;
use cmdgraph::runtime::{
    BotRuntime, ConfigLoader, JsonFileRepository, logging, registry_from_config,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "cmdgraph", author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Configuration profile (development, production, ...)
    #[arg(short, long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a declaration without storing it
    Check { file: PathBuf },
    /// Validate a declaration and store it as the live graph
    Load { file: PathBuf },
    /// Write the stored graph as a declaration (`-` for stdout)
    Export { file: PathBuf },
    /// List available plugins
    Plugins,
    /// Serve the stored graph on the console
    Run {
        /// Sender of every console signal
        #[arg(short, long)]
        user: String,
        /// Chat id of every console signal
        #[arg(long, default_value_t = 1)]
        chat: i64,
    },
}

/// Outcome of reading and checking a declaration file.
enum Checked {
    Valid(Graph),
    Violations(Vec<String>),
    Unreadable(String),
}

impl Checked {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Valid(_) => ExitCode::SUCCESS,
            Self::Violations(_) => ExitCode::from(1),
            Self::Unreadable(_) => ExitCode::from(2),
        }
    }
}

fn load_config(cli: &Cli) -> Result<CmdGraphConfig> {
    let mut loader = ConfigLoader::new().with_current_dir();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &cli.profile {
        loader = loader.profile(profile);
    }
    Ok(loader.load()?)
}

async fn check_file(path: &Path, registry: &dyn PluginRegistry) -> Checked {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => return Checked::Unreadable(format!("Cannot read {}: {e}", path.display())),
    };
    let graph = match from_declaration_str(&text) {
        Ok(graph) => graph,
        Err(e) => return Checked::Unreadable(e.to_string()),
    };

    let violations = check_with(&graph, registry);
    if violations.is_empty() {
        Checked::Valid(graph)
    } else {
        Checked::Violations(violations.iter().map(ToString::to_string).collect())
    }
}

fn report(checked: &Checked) {
    match checked {
        Checked::Valid(graph) => println!(
            "OK: {} menu(s), {} button(s), {} text command(s), {} auto job(s)",
            graph.menus.len(),
            graph.button_count(),
            graph.text_commands.len(),
            graph.auto_jobs.len()
        ),
        Checked::Violations(lines) => lines.iter().for_each(|line| println!("{line}")),
        Checked::Unreadable(message) => eprintln!("Error: {message}"),
    }
}

/// Turns one console line into a signal: `!TOKEN` presses a button,
/// anything else is typed text. Blank lines are skipped.
fn console_signal(line: &str, chat_id: i64, message_id: i64, user: &str) -> Option<Signal> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(match line.strip_prefix('!') {
        Some(token) => Signal::button(chat_id, message_id, user, token.trim().to_uppercase()),
        None => Signal::text(chat_id, message_id, user, line),
    })
}

async fn run_console(config: CmdGraphConfig, user: String, chat_id: i64) -> Result<()> {
    let runtime = BotRuntime::from_config(config)
        .await
        .context("Bot failed to start")?;

    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut message_id = 0;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    message_id += 1;
                    let Some(signal) = console_signal(&line, chat_id, message_id, &user) else {
                        continue;
                    };
                    if tx.send(signal).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Cannot read stdin");
                    break;
                }
            }
        }
        debug!("Console input closed");
    });

    runtime.run(rx).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init_from_config(&config.logging);

    let bundled = [
        sample_plugins::ECHO.uid,
        sample_plugins::PLUGIN_2.uid,
        sample_plugins::PLUGIN_ARGV.uid,
    ];
    debug!(plugins = ?bundled, "Sample plugins linked");

    let registry = Arc::new(registry_from_config(&config.plugins));

    match cli.command {
        Command::Check { file } => {
            let checked = check_file(&file, registry.as_ref()).await;
            report(&checked);
            Ok(checked.exit_code())
        }
        Command::Load { file } => {
            let checked = check_file(&file, registry.as_ref()).await;
            report(&checked);
            let code = checked.exit_code();
            let Checked::Valid(graph) = checked else {
                return Ok(code);
            };

            let repository = JsonFileRepository::open(&config.storage.path).await?;
            repository.replace_all(graph).await?;
            info!(path = %config.storage.path.display(), "Declaration stored");
            Ok(ExitCode::SUCCESS)
        }
        Command::Export { file } => {
            let repository = JsonFileRepository::open(&config.storage.path).await?;
            let text = to_declaration_string(&*repository.snapshot().await?);
            if file.as_os_str() == "-" {
                println!("{text}");
            } else {
                tokio::fs::write(&file, text)
                    .await
                    .with_context(|| format!("Cannot write {}", file.display()))?;
                info!(path = %file.display(), "Declaration exported");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Plugins => {
            for handle in registry.handles() {
                match handle.info() {
                    Some(info) => println!("{}\t{info}", handle.uid()),
                    None => println!("{}", handle.uid()),
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { user, chat } => {
            run_console(config, user, chat).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdgraph::core::SignalKind;
    use cmdgraph::framework::BuiltinRegistry;

    const DECLARATION: &str = r#"{
        "connect": [{ "api_id": 1, "api_hash": "h", "session": "tg_cmd_bot", "token": "t" }],
        "users": [{ "user_uid": "alice" }],
        "menu": [{ "title": "ROOT", "buttons": [
            { "text": "Echo", "target": { "to_plugin": "echo" } },
            { "text": "Argv", "target": { "to_plugin": "plugin_argv" } }
        ] }],
        "text_command": [{ "text": "START", "target": { "to_menu": "ROOT" } }]
    }"#;

    #[test]
    fn test_console_signal() {
        let signal = console_signal("  !ab12cd34 ", 1, 2, "alice").unwrap();
        assert_eq!(signal.kind, SignalKind::Button);
        assert_eq!(signal.payload, "AB12CD34");

        let signal = console_signal("start now", 1, 3, "alice").unwrap();
        assert_eq!(signal.kind, SignalKind::Text);
        assert_eq!(signal.payload, "start now");

        assert!(console_signal("   ", 1, 4, "alice").is_none());
    }

    #[tokio::test]
    async fn test_check_file_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let registry = BuiltinRegistry::new();

        let good = dir.path().join("good.json");
        std::fs::write(&good, DECLARATION).unwrap();
        let checked = check_file(&good, &registry).await;
        assert!(matches!(checked, Checked::Valid(_)));
        assert_eq!(checked.exit_code(), ExitCode::SUCCESS);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, DECLARATION.replace("plugin_argv", "nope")).unwrap();
        let checked = check_file(&bad, &registry).await;
        match &checked {
            Checked::Violations(lines) => assert_eq!(
                lines,
                &["Error: Button <ROOT> -> <Argv> calls up non-existent plugin <nope>"]
            ),
            _ => panic!("expected violations"),
        }
        assert_eq!(checked.exit_code(), ExitCode::from(1));

        let checked = check_file(&dir.path().join("missing.json"), &registry).await;
        assert_eq!(checked.exit_code(), ExitCode::from(2));
    }
}
