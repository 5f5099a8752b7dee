//! Example plugins for cmdgraph.
//!
//! Linking this crate into a binary registers its plugins with the
//! compiled-in registry:
//!
//! | uid | Behaviour |
//! |-----|-----------|
//! | `echo` | Replies `pong`, or repeats its arguments |
//! | `plugin_2` | Replies with a fixed test message |
//! | `plugin_argv` | Parses `-t/--test` and `-h/--help` from its arguments |
//!
//! ```rust,ignore
//! // Make sure the linker keeps the registrations.
//! extern crate sample_plugins;
//! ```

mod argv;
mod echo;
mod fixed;

pub use argv::{PLUGIN_ARGV, PluginArgv};
pub use echo::{ECHO, Echo};
pub use fixed::{PLUGIN_2, Fixed};
