//! Plugin system for cmdgraph.
//!
//! # Architecture
//!
//! A plugin is an opaque unit of logic identified by a stable `uid`. The graph
//! never owns plugins; buttons, text commands and auto jobs refer to them by
//! uid, and a [`PluginRegistry`] maps uids to loadable [`PluginHandle`]s.
//!
//! Each invocation builds a fresh instance from [`PluginArgs`] and calls its
//! single entry point, [`Plugin::run`]:
//!
//! ```text
//! PluginRegistry::load(uid) ──▶ PluginHandle
//!     ──instantiate(args, params)──▶ Box<dyn Plugin> ──run()──▶ Option<Reply>
//! ```
//!
//! Two kinds of plugin exist:
//!
//! - **Built-in** plugins are compiled into the binary and registered at link
//!   time with [`register_plugin!`](crate::register_plugin).
//! - **External** plugins are child processes described by JSON manifests in a
//!   plugin directory; see [`DirectoryRegistry`]. Dropping a new manifest into
//!   the directory makes the plugin available without a restart.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use cmdgraph_framework::plugin::{FromArgs, Plugin, PluginArgs, PluginDescriptor};
//! use cmdgraph_framework::{PluginResult, register_plugin};
//!
//! struct Echo;
//!
//! impl FromArgs for Echo {
//!     fn from_args(_: PluginArgs) -> PluginResult<Self> {
//!         Ok(Echo)
//!     }
//! }
//!
//! #[async_trait::async_trait]
//! impl Plugin for Echo {
//!     async fn run(&self) -> PluginResult<Option<Reply>> {
//!         Ok(Some(Reply::message(["pong"])))
//!     }
//! }
//!
//! register_plugin! {
//!     pub static ECHO = PluginDescriptor::of::<Echo>("echo").with_info("Replies pong");
//! }
//! ```

// ─── Submodules ──────────────────────────────────────────────────────────────
pub mod external;
pub mod macros;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cmdgraph_core::{Params, Reply};
use linkme::distributed_slice;

use crate::error::PluginResult;

// ─── Re-exports from submodules ──────────────────────────────────────────────
pub use external::{DirectoryRegistry, PluginManifest};
pub use registry::{
    BuiltinRegistry, LayeredRegistry, PluginRegistry, StaticRegistry, list_plugins, load_plugin,
};

// ─── Plugin trait ────────────────────────────────────────────────────────────

/// A constructed plugin instance.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Runs the plugin once.
    ///
    /// `Ok(None)` means the plugin had nothing to say; auto-dispatch skips it
    /// and the request path sends an empty message.
    async fn run(&self) -> PluginResult<Option<Reply>>;
}

/// A type-erased plugin instance.
pub type BoxedPlugin = Box<dyn Plugin>;

/// Construction input of a plugin instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginArgs {
    /// Words following the command word of a text signal; empty otherwise.
    pub args: Vec<String>,
    /// The `params` of the command that triggered the plugin.
    pub params: Params,
}

impl PluginArgs {
    pub fn new(args: Vec<String>, params: Params) -> Self {
        Self { args, params }
    }

    /// Returns a string parameter, if present.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// Constructs a plugin from its invocation arguments.
pub trait FromArgs: Plugin + Sized + 'static {
    fn from_args(args: PluginArgs) -> PluginResult<Self>;
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Something that can build plugin instances.
pub trait PluginLoader: Send + Sync {
    fn instantiate(&self, args: PluginArgs) -> PluginResult<BoxedPlugin>;
}

/// A loadable plugin, as returned by [`PluginRegistry::load`].
#[derive(Clone)]
pub struct PluginHandle {
    uid: String,
    info: Option<String>,
    loader: Arc<dyn PluginLoader>,
}

impl PluginHandle {
    pub fn new(
        uid: impl Into<String>,
        info: Option<String>,
        loader: Arc<dyn PluginLoader>,
    ) -> Self {
        Self {
            uid: uid.into(),
            info,
            loader,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }

    /// Builds a fresh instance.
    pub fn instantiate(&self, args: PluginArgs) -> PluginResult<BoxedPlugin> {
        self.loader.instantiate(args)
    }

    /// Builds an instance and runs it once.
    pub async fn invoke(&self, args: PluginArgs) -> PluginResult<Option<Reply>> {
        self.instantiate(args)?.run().await
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("uid", &self.uid)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

// ─── PluginDescriptor ────────────────────────────────────────────────────────

/// A static, `Copy` descriptor of a compiled-in plugin.
#[derive(Debug, Clone, Copy)]
pub struct PluginDescriptor {
    /// Stable identifier referenced by the graph.
    pub uid: &'static str,
    /// Free-text description shown by tooling.
    pub info: Option<&'static str>,
    /// Factory that builds a live instance.
    pub create: fn(PluginArgs) -> PluginResult<BoxedPlugin>,
}

impl PluginDescriptor {
    /// Describes plugin type `P` under `uid`.
    pub const fn of<P: FromArgs>(uid: &'static str) -> Self {
        Self {
            uid,
            info: None,
            create: create_boxed::<P>,
        }
    }

    pub const fn with_info(mut self, info: &'static str) -> Self {
        self.info = Some(info);
        self
    }

    /// Wraps the descriptor in a registry handle.
    pub fn handle(&self) -> PluginHandle {
        PluginHandle::new(self.uid, self.info.map(str::to_string), Arc::new(*self))
    }
}

impl PluginLoader for PluginDescriptor {
    fn instantiate(&self, args: PluginArgs) -> PluginResult<BoxedPlugin> {
        (self.create)(args)
    }
}

fn create_boxed<P: FromArgs>(args: PluginArgs) -> PluginResult<BoxedPlugin> {
    Ok(Box::new(P::from_args(args)?))
}

// =============================================================================
// Compiled-in registry (linkme distributed slice)
// =============================================================================

/// Every plugin registered with [`register_plugin!`](crate::register_plugin)
/// in any crate linked into the binary.
#[distributed_slice]
pub static PLUGIN_REGISTRY: [PluginDescriptor];
