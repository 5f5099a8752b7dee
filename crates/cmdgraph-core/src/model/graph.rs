use super::{AutoJob, Button, Connection, Menu, TextCommand, User, normalize_command};

/// The whole declaration as one value.
///
/// Collections keep declaration order. Lookups are linear; stores that serve
/// traffic build their own indexes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub connections: Vec<Connection>,
    pub users: Vec<User>,
    pub menus: Vec<Menu>,
    pub text_commands: Vec<TextCommand>,
    pub auto_jobs: Vec<AutoJob>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self, session: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.session == session)
    }

    pub fn user(&self, user_uid: &str) -> Option<&User> {
        self.users.iter().find(|u| u.user_uid == user_uid)
    }

    pub fn menu(&self, title: &str) -> Option<&Menu> {
        self.menus.iter().find(|m| m.title == title)
    }

    /// Looks a command up by its word; the word is normalized first.
    pub fn text_command(&self, text: &str) -> Option<&TextCommand> {
        let text = normalize_command(text);
        self.text_commands.iter().find(|c| c.text == text)
    }

    /// Looks a button up by exact token.
    pub fn button(&self, token: &str) -> Option<&Button> {
        self.buttons().map(|(_, b)| b).find(|b| b.token == token)
    }

    /// Iterates every button together with its owning menu.
    pub fn buttons(&self) -> impl Iterator<Item = (&Menu, &Button)> {
        self.menus
            .iter()
            .flat_map(|m| m.buttons.iter().map(move |b| (m, b)))
    }

    pub fn button_count(&self) -> usize {
        self.menus.iter().map(|m| m.buttons.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
            && self.users.is_empty()
            && self.menus.is_empty()
            && self.text_commands.is_empty()
            && self.auto_jobs.is_empty()
    }
}
