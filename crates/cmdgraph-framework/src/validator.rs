//! Graph integrity check.
//!
//! [`check`] proves that every reference in a [`Graph`] resolves before the
//! graph may be served. It never stops at the first problem: all checks run
//! and every violation is returned, in this order:
//!
//! 1. at least one connection
//! 2. at least one user
//! 3. per menu: buttons present, each button target resolves
//! 4. at least one text command, each command target resolves
//! 5. each auto job's plugin exists
//! 6. button tokens are unique (second and later holders are reported)
//!
//! A graph is live iff the result is empty.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use cmdgraph_core::{Graph, Target};

use crate::plugin::PluginRegistry;

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MissingConnection,
    MissingUsers,
    EmptyMenu {
        menu: String,
    },
    DanglingButton {
        menu: String,
        button: String,
        target: Target,
    },
    MissingTextCommand,
    DanglingCommand {
        command: String,
        target: Target,
    },
    DanglingAutoJob {
        plugin: String,
    },
    DuplicateToken {
        token: String,
        menu: String,
        button: String,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingConnection => write!(f, "Error: Connect config not found"),
            Self::MissingUsers => write!(f, "Error: Users not found"),
            Self::EmptyMenu { menu } => write!(f, "Error: Buttons not found in menu <{menu}>"),
            Self::DanglingButton {
                menu,
                button,
                target,
            } => write!(
                f,
                "Error: Button <{menu}> -> <{button}> calls up non-existent {target}"
            ),
            Self::MissingTextCommand => write!(f, "Error: Text command not found"),
            Self::DanglingCommand { command, target } => {
                write!(f, "Error: Command <{command}> calls up non-existent {target}")
            }
            Self::DanglingAutoJob { plugin } => {
                write!(f, "Error: Auto command calls up non-existent plugin <{plugin}>")
            }
            Self::DuplicateToken {
                token,
                menu,
                button,
            } => write!(
                f,
                "Error: Button token <{token}> of <{menu}> -> <{button}> is already in use"
            ),
        }
    }
}

/// Checks `graph` against the plugin uids in `plugins`.
pub fn check(graph: &Graph, plugins: &BTreeSet<String>) -> Vec<Violation> {
    let menus: HashSet<&str> = graph.menus.iter().map(|m| m.title.as_str()).collect();
    let resolves = |target: &Target| match target {
        Target::ToMenu(title) => menus.contains(title.as_str()),
        Target::ToPlugin(uid) => plugins.contains(uid),
    };

    let mut violations = Vec::new();

    if graph.connections.is_empty() {
        violations.push(Violation::MissingConnection);
    }

    if graph.users.is_empty() {
        violations.push(Violation::MissingUsers);
    }

    for menu in &graph.menus {
        if menu.buttons.is_empty() {
            violations.push(Violation::EmptyMenu {
                menu: menu.title.clone(),
            });
        }
        for button in &menu.buttons {
            if let Some(target) = button.target.as_ref().filter(|t| !resolves(t)) {
                violations.push(Violation::DanglingButton {
                    menu: menu.title.clone(),
                    button: button.text.clone(),
                    target: target.clone(),
                });
            }
        }
    }

    if graph.text_commands.is_empty() {
        violations.push(Violation::MissingTextCommand);
    }
    for command in &graph.text_commands {
        if let Some(target) = command.target.as_ref().filter(|t| !resolves(t)) {
            violations.push(Violation::DanglingCommand {
                command: command.text.clone(),
                target: target.clone(),
            });
        }
    }

    for job in &graph.auto_jobs {
        if !plugins.contains(&job.plugin_ref) {
            violations.push(Violation::DanglingAutoJob {
                plugin: job.plugin_ref.clone(),
            });
        }
    }

    let mut tokens = HashSet::new();
    for (menu, button) in graph.buttons() {
        if !tokens.insert(button.token.as_str()) {
            violations.push(Violation::DuplicateToken {
                token: button.token.clone(),
                menu: menu.title.clone(),
                button: button.text.clone(),
            });
        }
    }

    violations
}

/// Checks `graph` against the plugins currently in `registry`.
pub fn check_with(graph: &Graph, registry: &dyn PluginRegistry) -> Vec<Violation> {
    check(graph, &registry.list())
}
