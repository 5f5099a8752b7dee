//! The destination of a button press or text command.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a [`Button`](super::Button) or [`TextCommand`](super::TextCommand) leads.
///
/// Encoded externally tagged, so the declaration form is a single-key mapping:
///
/// ```json
/// { "to_menu": "ROOT" }
/// { "to_plugin": "echo" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Re-render the menu with this title.
    ToMenu(String),
    /// Run the plugin with this uid.
    ToPlugin(String),
}

/// Discriminant of a [`Target`], used in log fields and violation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Menu,
    Plugin,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Plugin => "plugin",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Target {
    pub fn menu(title: impl Into<String>) -> Self {
        Self::ToMenu(title.into())
    }

    pub fn plugin(uid: impl Into<String>) -> Self {
        Self::ToPlugin(uid.into())
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            Self::ToMenu(_) => TargetKind::Menu,
            Self::ToPlugin(_) => TargetKind::Plugin,
        }
    }

    /// The menu title or plugin uid this target points at.
    pub fn reference(&self) -> &str {
        match self {
            Self::ToMenu(r) | Self::ToPlugin(r) => r,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.kind(), self.reference())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_encoding() {
        assert_eq!(
            serde_json::to_value(Target::menu("ROOT")).unwrap(),
            json!({ "to_menu": "ROOT" })
        );
        assert_eq!(
            serde_json::to_value(Target::plugin("echo")).unwrap(),
            json!({ "to_plugin": "echo" })
        );
    }

    #[test]
    fn test_target_decoding_rejects_unknown_key() {
        let result: Result<Target, _> = serde_json::from_value(json!({ "to_file": "x" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_target_display() {
        assert_eq!(Target::plugin("echo").to_string(), "plugin <echo>");
        assert_eq!(Target::menu("ROOT").kind(), TargetKind::Menu);
    }
}
