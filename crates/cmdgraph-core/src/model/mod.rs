//! In-memory command graph.
//!
//! The graph is a set of menus, buttons, text commands and auto jobs whose
//! [`Target`]s reference either another menu (by title) or a plugin (by uid).
//! Nothing in this module checks that those references resolve; that is the
//! integrity validator's job. Construction from a declaration document lives
//! in [`crate::declaration`].

mod graph;
mod target;

use rand::Rng;
use serde_json::{Map, Value};

pub use graph::Graph;
pub use target::{Target, TargetKind};

use crate::token::generate_token;

/// Free-form parameters attached to a command and handed to its plugin.
pub type Params = Map<String, Value>;

/// How the bot authenticates against the messaging transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Numeric application id.
    pub api_id: i64,
    /// Application secret.
    pub api_hash: String,
    /// Session name; unique per graph.
    pub session: String,
    /// Bot token.
    pub token: String,
    pub info: Option<String>,
}

/// An entry of the authorization allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_uid: String,
    /// Whether auto-dispatch output is pushed to this user.
    pub auto_subscribed: bool,
    pub info: Option<String>,
}

impl User {
    pub fn new(user_uid: impl Into<String>) -> Self {
        Self {
            user_uid: user_uid.into(),
            auto_subscribed: false,
            info: None,
        }
    }

    pub fn subscribed(mut self, auto_subscribed: bool) -> Self {
        self.auto_subscribed = auto_subscribed;
        self
    }
}

/// A button inside a [`Menu`].
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    /// Display label; unique within the owning menu.
    pub text: String,
    /// Opaque callback payload; unique across the whole graph.
    pub token: String,
    pub target: Option<Target>,
    pub params: Params,
    pub info: Option<String>,
}

impl Button {
    /// Creates a button with an explicit token.
    pub fn new(text: impl Into<String>, token: impl Into<String>, target: Target) -> Self {
        Self {
            text: text.into(),
            token: token.into(),
            target: Some(target),
            params: Params::new(),
            info: None,
        }
    }

    /// Creates a button whose token is drawn from `rng`.
    ///
    /// The token is only unique with respect to the RNG stream. Graph-wide
    /// uniqueness is established by [`TokenGenerator`](crate::TokenGenerator)
    /// during declaration parsing, or reported by the integrity check.
    pub fn with_rng<R: Rng>(text: impl Into<String>, target: Target, rng: &mut R) -> Self {
        Self::new(text, generate_token(rng), target)
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// A titled, ordered list of buttons.
#[derive(Debug, Clone, PartialEq)]
pub struct Menu {
    /// Unique per graph.
    pub title: String,
    pub info: Option<String>,
    /// Display order; position `i` has sorting `i + 1`.
    pub buttons: Vec<Button>,
}

impl Menu {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            info: None,
            buttons: Vec::new(),
        }
    }

    pub fn button(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }

    /// Looks a button up by its display text.
    pub fn find_button(&self, text: &str) -> Option<&Button> {
        self.buttons.iter().find(|b| b.text == text)
    }

    /// Returns `(label, token)` pairs in display order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.buttons
            .iter()
            .map(|b| (b.text.clone(), b.token.clone()))
            .collect()
    }
}

/// A command matched against the first word of a typed message.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCommand {
    /// Upper-cased command word.
    pub text: String,
    pub target: Option<Target>,
    pub params: Params,
    pub info: Option<String>,
}

impl TextCommand {
    /// Creates a command; `text` is upper-cased.
    pub fn new(text: &str, target: Target) -> Self {
        Self {
            text: normalize_command(text),
            target: Some(target),
            params: Params::new(),
            info: None,
        }
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// A plugin run on every scheduler tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoJob {
    pub plugin_ref: String,
    pub params: Params,
    pub info: Option<String>,
}

impl AutoJob {
    pub fn new(plugin_ref: impl Into<String>) -> Self {
        Self {
            plugin_ref: plugin_ref.into(),
            params: Params::new(),
            info: None,
        }
    }
}

/// Case-normalizes a command word.
pub fn normalize_command(text: &str) -> String {
    text.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_text_command_is_normalized() {
        let cmd = TextCommand::new(" start ", Target::menu("ROOT"));
        assert_eq!(cmd.text, "START");
    }

    #[test]
    fn test_menu_entries_keep_order() {
        let menu = Menu::new("ROOT")
            .button(Button::new("b", "TOKEN0002", Target::menu("ROOT")))
            .button(Button::new("a", "TOKEN0001", Target::menu("ROOT")));
        assert_eq!(
            menu.entries(),
            vec![
                ("b".to_string(), "TOKEN0002".to_string()),
                ("a".to_string(), "TOKEN0001".to_string())
            ]
        );
        assert!(menu.find_button("a").is_some());
        assert!(menu.find_button("c").is_none());
    }

    #[test]
    fn test_button_with_same_seed_collides() {
        let a = Button::with_rng("a", Target::menu("M"), &mut StdRng::seed_from_u64(3));
        let b = Button::with_rng("b", Target::menu("M"), &mut StdRng::seed_from_u64(3));
        assert_eq!(a.token, b.token);
    }
}
