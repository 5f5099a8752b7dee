//! # Cmdgraph Core
//!
//! Data model of the cmdgraph command router.
//!
//! This crate knows nothing about plugins, storage or transports. It provides:
//!
//! - **Graph model**: menus, buttons, text commands and auto jobs ([`Graph`], [`Target`])
//! - **Tokens**: opaque button callback payloads ([`TokenGenerator`])
//! - **Declarations**: the JSON document a graph is loaded from and exported to
//!   ([`from_declaration`], [`to_declaration`])
//! - **Signals and replies**: the router's input and output ([`Signal`], [`Reply`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use cmdgraph_core::{from_declaration_str, to_declaration_string};
//!
//! let graph = from_declaration_str(r#"{
//!     "menu": [{
//!         "title": "ROOT",
//!         "buttons": [{ "text": "Ping", "target": { "to_plugin": "echo" } }]
//!     }],
//!     "text_command": [{ "text": "start", "target": { "to_menu": "ROOT" } }]
//! }"#)?;
//!
//! assert_eq!(graph.text_command("START").unwrap().text, "START");
//! println!("{}", to_declaration_string(&graph));
//! ```

pub mod declaration;
pub mod error;
pub mod model;
pub mod signal;
pub mod token;

pub use declaration::{
    from_declaration, from_declaration_str, from_declaration_with, to_declaration,
    to_declaration_string,
};
pub use error::{DeclarationError, DeclarationResult};
pub use model::{
    AutoJob, Button, Connection, Graph, Menu, Params, Target, TargetKind, TextCommand, User,
    normalize_command,
};
pub use signal::{MenuEntry, Reply, ReplyKind, Signal, SignalKind};
pub use token::{TOKEN_LEN, TokenGenerator, generate_token, generate_unique_token, is_well_formed};
