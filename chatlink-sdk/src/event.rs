//! Events emitted by the connection for the consumer (bot, UI, logger) to render.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// Username carried by events the connection synthesizes itself.
pub const SYSTEM_USER: &str = "system";

/// Lifecycle state of a [`ChatConnection`](crate::client::ChatConnection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Never connected.
    #[default]
    Idle,
    /// Opening the socket.
    Connecting,
    /// Handshake written, waiting for the server welcome.
    /// Only entered with [`ReadyOn::Welcome`](crate::client::ReadyOn::Welcome).
    Authenticating,
    /// Link usable; sends are accepted.
    Connected,
    /// Socket closed, either by the remote side or by `disconnect()`.
    Disconnected,
    /// The transport reported an error. A close normally follows.
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatEventKind {
    Message,
    Join,
    Part,
    System,
}

/// A structured record derived from one inbound protocol line, or synthesized
/// by the connection (own-message echo, lifecycle notices).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub channel: String,
    pub text: String,
    pub kind: ChatEventKind,
    /// IRCv3 tags of the source line (empty if none).
    pub tags: HashMap<String, String>,
}

impl ChatEvent {
    /// A connection-generated notice for `channel`.
    pub fn system(channel: &str, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            username: SYSTEM_USER.to_string(),
            channel: channel.to_string(),
            text: text.into(),
            kind: ChatEventKind::System,
            tags: HashMap::new(),
        }
    }

    /// Local echo of a message we sent; the relay never echoes our own lines.
    pub fn own_message(nickname: &str, channel: &str, text: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            username: nickname.to_string(),
            channel: channel.to_string(),
            text: text.to_string(),
            kind: ChatEventKind::Message,
            tags: HashMap::new(),
        }
    }

    /// Twitch display name when the `display-name` tag is present, else the login.
    pub fn display_name(&self) -> &str {
        self.tags
            .get("display-name")
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }
}
