//! # Cmdgraph Framework
//!
//! The command engine of cmdgraph.
//!
//! This layer provides:
//! - Plugin contract and registries (compiled-in, directory-backed, layered)
//! - The integrity validator that gates a graph before it goes live
//! - The [`Repository`] abstraction and an in-memory implementation
//! - The [`Router`] that resolves one signal into one reply
//! - Auto-job evaluation for the scheduler
//!
//! ```text
//! declaration ──▶ Graph ──▶ check() ──▶ Repository ──▶ Router::resolve(Signal) ──▶ Reply
//!                              ▲                          │
//!                              └──── PluginRegistry ◀─────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cmdgraph_framework::{BuiltinRegistry, MemoryRepository, Repository, Router};
//!
//! let repo = Arc::new(MemoryRepository::new());
//! repo.replace_all(graph).await?;
//!
//! let router = Router::activate(repo, Arc::new(BuiltinRegistry::new())).await?;
//! let reply = router.resolve(&Signal::text(chat_id, message_id, "alice", "start")).await;
//! ```

pub mod auto;
pub mod error;
pub mod plugin;
pub mod repository;
pub mod router;
pub mod validator;

pub use auto::collect_auto_replies;
pub use error::{
    PluginError, PluginResult, RepositoryError, RepositoryResult, RouterError, RouterResult,
};
pub use plugin::{
    BoxedPlugin, BuiltinRegistry, DirectoryRegistry, FromArgs, LayeredRegistry, Plugin,
    PluginArgs, PluginDescriptor, PluginHandle, PluginLoader, PluginManifest, PluginRegistry,
    StaticRegistry, list_plugins, load_plugin,
};
pub use repository::{GraphView, MemoryRepository, Repository};
pub use router::{INTERNAL_ERROR, Router};
pub use validator::{Violation, check, check_with};

// Plugin implementations need the same attribute the trait is declared with.
pub use async_trait::async_trait;

// ─── Macro-internal re-export (needed by register_plugin! at call sites) ─────
#[doc(hidden)]
pub use linkme;
