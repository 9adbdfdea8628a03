//! Classification of one protocol line into what the connection acts on.
//!
//! [`classify`] is pure: the same line always yields the same [`Inbound`].
//! Receive-time stamping happens later, when the connection turns a
//! [`ChatLine`] into a [`ChatEvent`].

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use crate::event::{ChatEvent, ChatEventKind};
use crate::irc::Message;

pub const JOIN_TEXT: &str = "joined";
pub const PART_TEXT: &str = "left";

/// What one inbound line means to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Server liveness check; must be answered with `PONG`.
    Ping { token: Option<String> },
    /// A chat message, join or part.
    Chat(ChatLine),
    /// `001` registration welcome.
    Welcome { nick: String },
    /// Server `NOTICE` (login failures, moderation notices, ...).
    Notice { channel: Option<String>, text: String },
    /// Server asks the client to reconnect (maintenance restart).
    Reconnect,
    CapAck(String),
    CapNak(String),
    /// Anything else; dropped silently.
    Ignored,
}

/// A user-sourced chat line, before it is stamped into a [`ChatEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub kind: ChatEventKind,
    pub username: String,
    pub channel: String,
    pub text: String,
    pub tags: HashMap<String, String>,
    /// From the `tmi-sent-ts` tag, if present and valid.
    pub sent_at: Option<DateTime<Utc>>,
}

impl ChatLine {
    /// Stamp with the server send time, or `received_at` when the line had none.
    pub fn into_event(self, received_at: DateTime<Utc>) -> ChatEvent {
        ChatEvent {
            timestamp: self.sent_at.unwrap_or(received_at),
            username: self.username,
            channel: self.channel,
            text: self.text,
            kind: self.kind,
            tags: self.tags,
        }
    }
}

pub fn classify(line: &str) -> Inbound {
    let Some(msg) = Message::parse(line) else {
        return Inbound::Ignored;
    };

    match msg.command.as_str() {
        "PING" => Inbound::Ping {
            token: msg.params.first().filter(|t| !t.is_empty()).cloned(),
        },
        "PRIVMSG" => {
            if msg.params.len() < 2 || msg.params[1].is_empty() {
                return Inbound::Ignored;
            }
            let text = msg.params[1].clone();
            chat_line(msg, ChatEventKind::Message, text)
        }
        "JOIN" => chat_line(msg, ChatEventKind::Join, JOIN_TEXT.to_string()),
        "PART" => chat_line(msg, ChatEventKind::Part, PART_TEXT.to_string()),
        "001" => Inbound::Welcome {
            nick: msg.params.first().cloned().unwrap_or_default(),
        },
        "NOTICE" => {
            let text = match msg.params.last() {
                Some(text) if msg.params.len() >= 2 => text.clone(),
                _ => return Inbound::Ignored,
            };
            let channel = msg.params.first().filter(|t| t.starts_with('#')).cloned();
            Inbound::Notice { channel, text }
        }
        "RECONNECT" => Inbound::Reconnect,
        "CAP" => {
            let caps = msg.params.last().cloned().unwrap_or_default();
            match msg.params.get(1).map(|s| s.to_ascii_uppercase()).as_deref() {
                Some("ACK") => Inbound::CapAck(caps),
                Some("NAK") => Inbound::CapNak(caps),
                _ => Inbound::Ignored,
            }
        }
        _ => Inbound::Ignored,
    }
}

fn chat_line(msg: Message, kind: ChatEventKind, text: String) -> Inbound {
    let Some(username) = msg.user_nick().map(str::to_string) else {
        return Inbound::Ignored;
    };
    let Some(channel) = msg.params.first().filter(|c| c.starts_with('#')).cloned() else {
        return Inbound::Ignored;
    };
    let sent_at = msg
        .tags
        .get("tmi-sent-ts")
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

    Inbound::Chat(ChatLine {
        kind,
        username,
        channel,
        text,
        tags: msg.tags,
        sent_at,
    })
}
