//! Declaration document codec.
//!
//! A declaration is a JSON document with five top-level lists:
//!
//! ```json
//! {
//!   "connect": [{ "api_id": 1, "api_hash": "…", "session": "tg_cmd_bot", "token": "…" }],
//!   "users": [{ "user_uid": "alice", "auto_subscribed": true }],
//!   "menu": [{
//!     "title": "ROOT",
//!     "buttons": [{ "text": "Ping", "target": { "to_plugin": "echo" } }]
//!   }],
//!   "text_command": [{ "text": "start", "target": { "to_menu": "ROOT" } }],
//!   "auto": [{ "to_plugin": "echo", "params": { "every": "tick" } }]
//! }
//! ```
//!
//! Identity keys (`session`, `user_uid`, `title`, `text`, …) are required and
//! reported by name when absent. `target`, `params` and `info` default to
//! empty; a button without `token` gets a generated one. Missing top-level
//! sections are empty lists.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DeclarationError, DeclarationResult};
use crate::model::{
    AutoJob, Button, Connection, Graph, Menu, Params, Target, TextCommand, User, normalize_command,
};
use crate::token::TokenGenerator;

// =============================================================================
// Wire form
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawDeclaration {
    #[serde(default)]
    connect: Vec<RawConnection>,
    #[serde(default)]
    users: Vec<RawUser>,
    #[serde(default)]
    menu: Vec<RawMenu>,
    #[serde(default)]
    text_command: Vec<RawTextCommand>,
    #[serde(default)]
    auto: Vec<RawAuto>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawConnection {
    api_id: Option<i64>,
    api_hash: Option<String>,
    session: Option<String>,
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawUser {
    user_uid: Option<String>,
    #[serde(default, alias = "auto_msg", skip_serializing_if = "is_false")]
    auto_subscribed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawMenu {
    title: Option<String>,
    #[serde(default)]
    buttons: Vec<RawButton>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawButton {
    text: Option<String>,
    #[serde(default, alias = "data", skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<Target>,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawTextCommand {
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<Target>,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawAuto {
    to_plugin: Option<String>,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn require<T>(
    value: Option<T>,
    section: impl FnOnce() -> String,
    field: &'static str,
) -> DeclarationResult<T> {
    value.ok_or_else(|| DeclarationError::missing_field(section(), field))
}

/// Tracks identity keys of one entity kind.
struct Unique {
    entity: &'static str,
    seen: HashSet<String>,
}

impl Unique {
    fn new(entity: &'static str) -> Self {
        Self {
            entity,
            seen: HashSet::new(),
        }
    }

    fn insert(&mut self, key: &str) -> DeclarationResult<()> {
        if self.seen.insert(key.to_string()) {
            Ok(())
        } else {
            Err(DeclarationError::duplicate(self.entity, key))
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Builds a graph from a parsed declaration document.
pub fn from_declaration(doc: &Value) -> DeclarationResult<Graph> {
    from_declaration_with(doc, &mut TokenGenerator::new())
}

/// Builds a graph from declaration text.
pub fn from_declaration_str(text: &str) -> DeclarationResult<Graph> {
    let doc: Value = serde_json::from_str(text)?;
    from_declaration(&doc)
}

/// Builds a graph, drawing missing button tokens from `tokens`.
///
/// Explicit tokens are reserved before any are generated, so a generated
/// token never shadows one written in the document.
pub fn from_declaration_with(doc: &Value, tokens: &mut TokenGenerator) -> DeclarationResult<Graph> {
    let raw = RawDeclaration::deserialize(doc)?;

    for token in raw.menu.iter().flat_map(|m| m.buttons.iter()).filter_map(|b| b.token.as_deref()) {
        tokens.reserve(token);
    }

    let mut graph = Graph::new();

    let mut sessions = Unique::new("session");
    for (i, c) in raw.connect.into_iter().enumerate() {
        let section = || format!("connect[{i}]");
        let connection = Connection {
            api_id: require(c.api_id, section, "api_id")?,
            api_hash: require(c.api_hash, section, "api_hash")?,
            session: require(c.session, section, "session")?,
            token: require(c.token, section, "token")?,
            info: c.info,
        };
        sessions.insert(&connection.session)?;
        graph.connections.push(connection);
    }

    let mut users = Unique::new("user");
    for (i, u) in raw.users.into_iter().enumerate() {
        let user = User {
            user_uid: require(u.user_uid, || format!("users[{i}]"), "user_uid")?,
            auto_subscribed: u.auto_subscribed,
            info: u.info,
        };
        users.insert(&user.user_uid)?;
        graph.users.push(user);
    }

    let mut titles = Unique::new("menu");
    for (i, m) in raw.menu.into_iter().enumerate() {
        let title = require(m.title, || format!("menu[{i}]"), "title")?;
        titles.insert(&title)?;

        let mut labels = Unique::new("button");
        let mut buttons = Vec::with_capacity(m.buttons.len());
        for (j, b) in m.buttons.into_iter().enumerate() {
            let text = require(b.text, || format!("menu[{i}].buttons[{j}]"), "text")?;
            labels
                .insert(&text)
                .map_err(|_| DeclarationError::duplicate("button", format!("{title} -> {text}")))?;
            buttons.push(Button {
                text,
                token: b.token.unwrap_or_else(|| tokens.next_token()),
                target: b.target,
                params: b.params,
                info: b.info,
            });
        }

        graph.menus.push(Menu {
            title,
            info: m.info,
            buttons,
        });
    }

    let mut commands = Unique::new("text command");
    for (i, c) in raw.text_command.into_iter().enumerate() {
        let text = require(c.text, || format!("text_command[{i}]"), "text")?;
        let text = normalize_command(&text);
        commands.insert(&text)?;
        graph.text_commands.push(TextCommand {
            text,
            target: c.target,
            params: c.params,
            info: c.info,
        });
    }

    for (i, a) in raw.auto.into_iter().enumerate() {
        graph.auto_jobs.push(AutoJob {
            plugin_ref: require(a.to_plugin, || format!("auto[{i}]"), "to_plugin")?,
            params: a.params,
            info: a.info,
        });
    }

    Ok(graph)
}

// =============================================================================
// Serialization
// =============================================================================

/// Renders a graph back into declaration form, tokens included.
pub fn to_declaration(graph: &Graph) -> Value {
    let raw = RawDeclaration {
        connect: graph
            .connections
            .iter()
            .map(|c| RawConnection {
                api_id: Some(c.api_id),
                api_hash: Some(c.api_hash.clone()),
                session: Some(c.session.clone()),
                token: Some(c.token.clone()),
                info: c.info.clone(),
            })
            .collect(),
        users: graph
            .users
            .iter()
            .map(|u| RawUser {
                user_uid: Some(u.user_uid.clone()),
                auto_subscribed: u.auto_subscribed,
                info: u.info.clone(),
            })
            .collect(),
        menu: graph
            .menus
            .iter()
            .map(|m| RawMenu {
                title: Some(m.title.clone()),
                buttons: m
                    .buttons
                    .iter()
                    .map(|b| RawButton {
                        text: Some(b.text.clone()),
                        token: Some(b.token.clone()),
                        target: b.target.clone(),
                        params: b.params.clone(),
                        info: b.info.clone(),
                    })
                    .collect(),
                info: m.info.clone(),
            })
            .collect(),
        text_command: graph
            .text_commands
            .iter()
            .map(|c| RawTextCommand {
                text: Some(c.text.clone()),
                target: c.target.clone(),
                params: c.params.clone(),
                info: c.info.clone(),
            })
            .collect(),
        auto: graph
            .auto_jobs
            .iter()
            .map(|a| RawAuto {
                to_plugin: Some(a.plugin_ref.clone()),
                params: a.params.clone(),
                info: a.info.clone(),
            })
            .collect(),
    };

    // Plain structs of strings, maps and numbers always serialize.
    serde_json::to_value(raw).unwrap_or(Value::Null)
}

/// Renders a graph as pretty-printed declaration text.
pub fn to_declaration_string(graph: &Graph) -> String {
    serde_json::to_string_pretty(&to_declaration(graph)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::is_well_formed;
    use serde_json::json;

    fn full_doc() -> Value {
        json!({
            "connect": [{
                "api_id": 12345,
                "api_hash": "hash",
                "session": "tg_cmd_bot",
                "token": "bot-token",
                "info": "main"
            }],
            "users": [
                { "user_uid": "alice", "auto_subscribed": true },
                { "user_uid": "bob", "info": "read only" }
            ],
            "menu": [
                {
                    "title": "ROOT",
                    "buttons": [
                        { "text": "Sub", "token": "AAAA0001", "target": { "to_menu": "SUB" } },
                        { "text": "Ping", "token": "AAAA0002", "target": { "to_plugin": "echo" },
                          "params": { "greeting": "hi" } }
                    ]
                },
                {
                    "title": "SUB",
                    "info": "second level",
                    "buttons": [
                        { "text": "Back", "token": "AAAA0003", "target": { "to_menu": "ROOT" } }
                    ]
                }
            ],
            "text_command": [
                { "text": "START", "target": { "to_menu": "ROOT" } }
            ],
            "auto": [
                { "to_plugin": "echo", "params": { "n": 1 } }
            ]
        })
    }

    #[test]
    fn test_round_trip_is_identity_for_complete_doc() {
        let doc = full_doc();
        let graph = from_declaration(&doc).unwrap();
        assert_eq!(to_declaration(&graph), doc);
    }

    #[test]
    fn test_parse_populates_model() {
        let graph = from_declaration(&full_doc()).unwrap();
        assert_eq!(graph.connections[0].api_id, 12345);
        assert!(graph.user("alice").unwrap().auto_subscribed);
        assert!(!graph.user("bob").unwrap().auto_subscribed);
        assert_eq!(graph.menus.len(), 2);
        assert_eq!(
            graph.button("AAAA0002").unwrap().target,
            Some(Target::plugin("echo"))
        );
        assert_eq!(graph.auto_jobs[0].plugin_ref, "echo");
    }

    #[test]
    fn test_missing_field_is_named() {
        let doc = json!({ "menu": [{ "buttons": [] }] });
        let err = from_declaration(&doc).unwrap_err();
        assert_eq!(err.field(), Some("title"));
        assert_eq!(err.to_string(), "Key not found <title> in <menu[0]>");

        let doc = json!({ "connect": [{ "api_hash": "h", "session": "s", "token": "t" }] });
        assert_eq!(from_declaration(&doc).unwrap_err().field(), Some("api_id"));

        let doc = json!({ "menu": [{ "title": "M", "buttons": [{ "token": "AAAAAAAA" }] }] });
        let err = from_declaration(&doc).unwrap_err();
        assert_eq!(err.to_string(), "Key not found <text> in <menu[0].buttons[0]>");

        let doc = json!({ "auto": [{ "params": {} }] });
        assert_eq!(from_declaration(&doc).unwrap_err().field(), Some("to_plugin"));
    }

    #[test]
    fn test_optional_fields_default() {
        let doc = json!({
            "menu": [{ "title": "M", "buttons": [{ "text": "b" }] }],
            "text_command": [{ "text": "go" }]
        });
        let graph = from_declaration(&doc).unwrap();
        let button = &graph.menus[0].buttons[0];
        assert!(button.target.is_none());
        assert!(button.params.is_empty());
        assert!(button.info.is_none());
        assert!(is_well_formed(&button.token));
        assert_eq!(graph.text_commands[0].text, "GO");
        assert!(graph.connections.is_empty());
    }

    #[test]
    fn test_generated_tokens_avoid_explicit_ones() {
        let doc = json!({
            "menu": [{
                "title": "M",
                "buttons": [
                    { "text": "a" },
                    { "text": "b", "token": "ZZZZ9999" },
                    { "text": "c" }
                ]
            }]
        });
        let graph = from_declaration_with(&doc, &mut TokenGenerator::seeded(5)).unwrap();
        let tokens: HashSet<&str> = graph.buttons().map(|(_, b)| b.token.as_str()).collect();
        assert_eq!(tokens.len(), 3);
        assert!(tokens.contains("ZZZZ9999"));
    }

    #[test]
    fn test_duplicate_explicit_tokens_survive_parsing() {
        let doc = json!({
            "menu": [
                { "title": "A", "buttons": [{ "text": "x", "token": "SAME0000" }] },
                { "title": "B", "buttons": [{ "text": "y", "token": "SAME0000" }] }
            ]
        });
        let graph = from_declaration(&doc).unwrap();
        assert_eq!(graph.button_count(), 2);
    }

    #[test]
    fn test_duplicate_identity_keys_rejected() {
        let doc = json!({ "users": [{ "user_uid": "a" }, { "user_uid": "a" }] });
        assert!(matches!(
            from_declaration(&doc),
            Err(DeclarationError::Duplicate { entity: "user", .. })
        ));

        let doc = json!({ "text_command": [{ "text": "go" }, { "text": "GO" }] });
        assert!(matches!(
            from_declaration(&doc),
            Err(DeclarationError::Duplicate { entity: "text command", .. })
        ));

        let doc = json!({
            "menu": [{ "title": "M", "buttons": [{ "text": "a" }, { "text": "a" }] }]
        });
        let err = from_declaration(&doc).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate button <M -> a>");
    }

    #[test]
    fn test_legacy_aliases() {
        let doc = json!({
            "users": [{ "user_uid": "a", "auto_msg": true }],
            "menu": [{ "title": "M", "buttons": [{ "text": "b", "data": "LEGACY01" }] }]
        });
        let graph = from_declaration(&doc).unwrap();
        assert!(graph.users[0].auto_subscribed);
        assert_eq!(graph.menus[0].buttons[0].token, "LEGACY01");
    }

    #[test]
    fn test_malformed_target() {
        let doc = json!({ "text_command": [{ "text": "go", "target": { "to_space": "x" } }] });
        assert!(matches!(from_declaration(&doc), Err(DeclarationError::Malformed(_))));
    }

    #[test]
    fn test_from_str() {
        let graph = from_declaration_str(r#"{ "users": [{ "user_uid": "alice" }] }"#).unwrap();
        assert_eq!(graph.users.len(), 1);
        assert!(from_declaration_str("not json").is_err());
    }
}
