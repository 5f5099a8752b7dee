//! Transport boundary.
//!
//! The router produces [`Reply`] values; a [`Gateway`] turns them into
//! messages on a concrete chat transport. [`deliver`] is the single place
//! where reply kinds are mapped onto gateway calls.

use std::fmt;
use std::io::Write;

use async_trait::async_trait;
use cmdgraph_core::{MenuEntry, Reply, Signal};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{GatewayError, GatewayResult};

/// Where a plain message goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// The chat a signal came from.
    Chat(i64),
    /// A declared user, addressed by uid.
    User(String),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(id) => write!(f, "chat {id}"),
            Self::User(uid) => write!(f, "user {uid}"),
        }
    }
}

/// A chat transport.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send_message(&self, recipient: &Recipient, text: &str) -> GatewayResult<()>;

    /// Sends a new message with inline buttons.
    async fn send_menu(&self, chat_id: i64, title: &str, buttons: &[MenuEntry])
    -> GatewayResult<()>;

    /// Replaces the text and buttons of an existing message.
    async fn edit_menu(
        &self,
        chat_id: i64,
        message_id: i64,
        title: &str,
        buttons: &[MenuEntry],
    ) -> GatewayResult<()>;
}

/// Delivers the reply to `signal` through `gateway`.
///
/// - MESSAGE: the text (if any) and then every line, each as its own message.
/// - ERROR: the text goes to the chat, the details only to the log.
/// - MENU: edits the pressed message when `rewrite` is set, otherwise sends.
pub async fn deliver(gateway: &dyn Gateway, signal: &Signal, reply: &Reply) -> GatewayResult<()> {
    let chat = Recipient::Chat(signal.chat_id);
    match reply {
        Reply::Message { text, data } => {
            if !text.is_empty() {
                gateway.send_message(&chat, text).await?;
            }
            for line in data {
                gateway.send_message(&chat, line).await?;
            }
            debug!(chat_id = signal.chat_id, lines = data.len(), "Message delivered");
        }
        Reply::Error { text, data } => {
            for detail in data {
                error!(chat_id = signal.chat_id, reply = %text, "{detail}");
            }
            gateway.send_message(&chat, text).await?;
        }
        Reply::Menu {
            text,
            data,
            rewrite: true,
        } => {
            gateway
                .edit_menu(signal.chat_id, signal.message_id, text, data)
                .await?;
        }
        Reply::Menu { text, data, .. } => {
            gateway.send_menu(signal.chat_id, text, data).await?;
        }
    }
    Ok(())
}

// =============================================================================
// ConsoleGateway
// =============================================================================

/// Prints every delivery to stdout.
///
/// Menu buttons are shown as `[label] !TOKEN`, the form the console bot
/// accepts back as a button press.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleGateway;

impl ConsoleGateway {
    pub fn new() -> Self {
        Self
    }

    fn print(lines: &[String]) -> GatewayResult<()> {
        let mut out = std::io::stdout().lock();
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(())
    }

    fn render_menu(header: String, title: &str, buttons: &[MenuEntry]) -> Vec<String> {
        let mut lines = Vec::with_capacity(buttons.len() + 1);
        lines.push(format!("{header} {title}"));
        lines.extend(
            buttons
                .iter()
                .map(|(label, token)| format!("    [{label}] !{token}")),
        );
        lines
    }
}

#[async_trait]
impl Gateway for ConsoleGateway {
    async fn send_message(&self, recipient: &Recipient, text: &str) -> GatewayResult<()> {
        Self::print(&[format!("[{recipient}] {text}")])
    }

    async fn send_menu(
        &self,
        chat_id: i64,
        title: &str,
        buttons: &[MenuEntry],
    ) -> GatewayResult<()> {
        Self::print(&Self::render_menu(format!("[chat {chat_id}]"), title, buttons))
    }

    async fn edit_menu(
        &self,
        chat_id: i64,
        message_id: i64,
        title: &str,
        buttons: &[MenuEntry],
    ) -> GatewayResult<()> {
        Self::print(&Self::render_menu(
            format!("[chat {chat_id} #{message_id} edited]"),
            title,
            buttons,
        ))
    }
}

// =============================================================================
// RecordingGateway
// =============================================================================

/// One call made on a [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Message(Recipient, String),
    Menu {
        chat_id: i64,
        title: String,
        buttons: Vec<MenuEntry>,
    },
    Edit {
        chat_id: i64,
        message_id: i64,
        title: String,
        buttons: Vec<MenuEntry>,
    },
}

/// Keeps deliveries in memory; recipients listed as unreachable fail.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    deliveries: Mutex<Vec<Delivery>>,
    unreachable: Vec<Recipient>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send to `recipient` fail.
    pub fn unreachable(mut self, recipient: Recipient) -> Self {
        self.unreachable.push(recipient);
        self
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Texts sent to `recipient`, in order.
    pub fn messages_to(&self, recipient: &Recipient) -> Vec<String> {
        self.deliveries
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Message(r, text) if r == recipient => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn send_message(&self, recipient: &Recipient, text: &str) -> GatewayResult<()> {
        if self.unreachable.contains(recipient) {
            return Err(GatewayError::send(recipient, "unreachable"));
        }
        self.deliveries
            .lock()
            .push(Delivery::Message(recipient.clone(), text.to_string()));
        Ok(())
    }

    async fn send_menu(
        &self,
        chat_id: i64,
        title: &str,
        buttons: &[MenuEntry],
    ) -> GatewayResult<()> {
        self.deliveries.lock().push(Delivery::Menu {
            chat_id,
            title: title.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(())
    }

    async fn edit_menu(
        &self,
        chat_id: i64,
        message_id: i64,
        title: &str,
        buttons: &[MenuEntry],
    ) -> GatewayResult<()> {
        self.deliveries.lock().push(Delivery::Edit {
            chat_id,
            message_id,
            title: title.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(())
    }
}
