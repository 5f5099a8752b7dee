//! Inbound signals and outbound replies.
//!
//! A [`Signal`] is one event to route: a typed message, a button press, or a
//! scheduler tick. Routing a signal yields exactly one [`Reply`], which may
//! itself carry several message lines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What produced a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// A typed message; the payload is the message text.
    Text,
    /// A button press; the payload is the button token.
    Button,
    /// A scheduler tick.
    AutoTick,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Button => "BUTTON",
            Self::AutoTick => "AUTO_TICK",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub chat_id: i64,
    pub message_id: i64,
    pub user_uid: String,
    pub payload: String,
}

impl Signal {
    pub fn text(
        chat_id: i64,
        message_id: i64,
        user_uid: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            kind: SignalKind::Text,
            chat_id,
            message_id,
            user_uid: user_uid.into(),
            payload: payload.into(),
        }
    }

    pub fn button(
        chat_id: i64,
        message_id: i64,
        user_uid: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            kind: SignalKind::Button,
            chat_id,
            message_id,
            user_uid: user_uid.into(),
            payload: token.into(),
        }
    }

    /// One-line description used in error replies and logs.
    pub fn summary(&self) -> String {
        format!("<{}> <{}> <{}>", self.user_uid, self.kind, self.payload)
    }
}

/// A `(label, token)` pair of a rendered menu.
pub type MenuEntry = (String, String);

/// Discriminant of a [`Reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    Message,
    Menu,
    Error,
}

/// What the transport should show in response to a signal.
///
/// The serialized form is the one external plugins print on stdout:
///
/// ```json
/// { "kind": "message", "data": ["pong"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    /// Plain message lines, sent one by one.
    Message {
        #[serde(default)]
        text: String,
        #[serde(default)]
        data: Vec<String>,
    },
    /// A menu with inline buttons.
    Menu {
        text: String,
        data: Vec<MenuEntry>,
        /// Edit the message that carried the pressed button instead of
        /// sending a new one.
        #[serde(default)]
        rewrite: bool,
    },
    /// A user-facing error; `data` holds diagnostic lines for the log.
    Error {
        text: String,
        #[serde(default)]
        data: Vec<String>,
    },
}

impl Reply {
    pub fn message<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Message {
            text: String::new(),
            data: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn menu(title: impl Into<String>, entries: Vec<MenuEntry>, rewrite: bool) -> Self {
        Self::Menu {
            text: title.into(),
            data: entries,
            rewrite,
        }
    }

    pub fn error<I, S>(text: impl Into<String>, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Error {
            text: text.into(),
            data: details.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> ReplyKind {
        match self {
            Self::Message { .. } => ReplyKind::Message,
            Self::Menu { .. } => ReplyKind::Menu,
            Self::Error { .. } => ReplyKind::Error,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Message { text, .. } | Self::Menu { text, .. } | Self::Error { text, .. } => text,
        }
    }

    /// Message lines of a MESSAGE or ERROR reply; empty for menus.
    pub fn lines(&self) -> &[String] {
        match self {
            Self::Message { data, .. } | Self::Error { data, .. } => data,
            Self::Menu { .. } => &[],
        }
    }

    pub fn rewrite(&self) -> bool {
        matches!(self, Self::Menu { rewrite: true, .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary() {
        let signal = Signal::text(1, 2, "alice", "start now");
        assert_eq!(signal.summary(), "<alice> <TEXT> <start now>");
    }

    #[test]
    fn test_reply_wire_form() {
        let reply: Reply = serde_json::from_value(json!({
            "kind": "message",
            "data": ["pong"]
        }))
        .unwrap();
        assert_eq!(reply, Reply::message(["pong"]));

        let menu = Reply::menu("ROOT", vec![("Go".into(), "AAAAAAAA".into())], true);
        assert_eq!(
            serde_json::to_value(&menu).unwrap(),
            json!({ "kind": "menu", "text": "ROOT", "data": [["Go", "AAAAAAAA"]], "rewrite": true })
        );
    }

    #[test]
    fn test_accessors() {
        let reply = Reply::error("Access Denied", ["x"]);
        assert_eq!(reply.kind(), ReplyKind::Error);
        assert_eq!(reply.text(), "Access Denied");
        assert_eq!(reply.lines(), ["x".to_string()]);
        assert!(!reply.rewrite());
        assert!(reply.is_error());
    }
}
