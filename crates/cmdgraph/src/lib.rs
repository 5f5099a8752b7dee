//! # cmdgraph
//!
//! A configuration-driven command router for chat bots.
//!
//! ## Overview
//!
//! A bot's whole command surface is declared as data: connections, the users
//! allowed to talk to it, menus of buttons, text commands and scheduled jobs.
//! Every button and command points at a target, either another menu or a
//! plugin. Before a declaration goes live it must pass an integrity check
//! that rejects any dangling reference.
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌────────────┐   ┌────────┐   ┌─────────┐
//! │ declaration │──▶│  check   │──▶│ Repository │──▶│ Router │──▶│ Gateway │
//! └─────────────┘   └──────────┘   └────────────┘   └────────┘   └─────────┘
//!                        ▲                              │
//!                        └─────── PluginRegistry ◀──────┘
//! ```
//!
//! - **core**: graph model, targets, tokens, the declaration codec, signals
//!   and replies
//! - **framework**: plugins and registries, the validator, the repository
//!   abstraction, the router and auto-job evaluation
//! - **runtime**: configuration, logging, JSON storage, the gateway boundary,
//!   the scheduler and the bot runtime
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cmdgraph::prelude::*;
//!
//! struct Echo(Vec<String>);
//!
//! impl FromArgs for Echo {
//!     fn from_args(args: PluginArgs) -> PluginResult<Self> {
//!         Ok(Echo(args.args))
//!     }
//! }
//!
//! #[async_trait]
//! impl Plugin for Echo {
//!     async fn run(&self) -> PluginResult<Option<Reply>> {
//!         Ok(Some(Reply::message([self.0.join(" ")])))
//!     }
//! }
//!
//! register_plugin! {
//!     static ECHO = PluginDescriptor::of::<Echo>("echo");
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = BotRuntime::builder().build().await?;
//!     let (_tx, rx) = tokio::sync::mpsc::channel(64);
//!     runtime.run(rx).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use cmdgraph_core as core;
pub use cmdgraph_framework as framework;
pub use cmdgraph_runtime as runtime;

pub use cmdgraph_framework::register_plugin;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use cmdgraph::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use cmdgraph_runtime::{BotRuntime, CmdGraphConfig, ConfigLoader, Gateway, Recipient};

    // Graph model
    pub use cmdgraph_core::{
        Graph, Params, Reply, Signal, SignalKind, Target, from_declaration, to_declaration,
    };

    // Plugin system
    pub use cmdgraph_framework::{
        FromArgs, Plugin, PluginArgs, PluginDescriptor, PluginError, PluginRegistry,
        PluginResult, register_plugin,
    };

    // Routing
    pub use cmdgraph_framework::{Repository, Router, Violation, check_with};

    pub use cmdgraph_framework::async_trait;
    pub use cmdgraph_runtime::prelude::*;
}
