//! Bot account credentials and the login handshake built from them.

use std::fmt;

/// Credentials and target channel for one connection.
///
/// Fields are passed to the relay verbatim; an empty nickname or a bad token
/// is rejected upstream and surfaces as a close, not as a local error.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub nickname: String,
    /// OAuth bearer token, with or without the `oauth:` prefix.
    pub token: String,
    /// Channel name, with or without a leading `#`.
    pub channel: String,
}

impl Account {
    pub fn new(
        nickname: impl Into<String>,
        token: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            nickname: nickname.into(),
            token: token.into(),
            channel: channel.into(),
        }
    }

    /// The channel with exactly one leading `#`.
    pub fn channel_name(&self) -> String {
        normalize_channel(&self.channel)
    }
}

// Tokens never end up in logs.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("nickname", &self.nickname)
            .field("token", &"<redacted>")
            .field("channel", &self.channel)
            .finish()
    }
}

/// Strip any leading `#` characters and re-add exactly one.
pub fn normalize_channel(channel: &str) -> String {
    format!("#{}", channel.trim_start_matches('#'))
}

/// Lines written immediately after the socket opens, in wire order:
/// `PASS`, `NICK`, `JOIN`, then one `CAP REQ` per capability.
pub fn handshake_lines(account: &Account, capabilities: &[String]) -> Vec<String> {
    let token = account
        .token
        .strip_prefix("oauth:")
        .unwrap_or(&account.token);

    let mut lines = Vec::with_capacity(3 + capabilities.len());
    lines.push(format!("PASS oauth:{token}"));
    lines.push(format!("NICK {}", account.nickname));
    lines.push(format!("JOIN {}", account.channel_name()));
    for cap in capabilities {
        lines.push(format!("CAP REQ :{cap}"));
    }
    lines
}

/// Outbound chat line for `channel` (normalized).
pub fn privmsg_line(channel: &str, text: &str) -> String {
    format!("PRIVMSG {} :{text}", normalize_channel(channel))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> Vec<String> {
        ["twitch.tv/membership", "twitch.tv/tags", "twitch.tv/commands"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn channel_normalization() {
        assert_eq!(normalize_channel("mychan"), "#mychan");
        assert_eq!(normalize_channel("#mychan"), "#mychan");
        assert_eq!(normalize_channel("##mychan"), "#mychan");
        assert_eq!(normalize_channel(""), "#");
    }

    #[test]
    fn handshake_order() {
        let account = Account::new("bot", "abc", "mychan");
        assert_eq!(
            handshake_lines(&account, &caps()),
            vec![
                "PASS oauth:abc",
                "NICK bot",
                "JOIN #mychan",
                "CAP REQ :twitch.tv/membership",
                "CAP REQ :twitch.tv/tags",
                "CAP REQ :twitch.tv/commands",
            ]
        );
    }

    #[test]
    fn handshake_does_not_double_oauth_prefix() {
        let account = Account::new("bot", "oauth:abc", "#mychan");
        let lines = handshake_lines(&account, &[]);
        assert_eq!(lines, vec!["PASS oauth:abc", "NICK bot", "JOIN #mychan"]);
    }

    #[test]
    fn privmsg_prefixes_channel() {
        assert_eq!(privmsg_line("c", "hi"), "PRIVMSG #c :hi");
        assert_eq!(privmsg_line("#c", "two words"), "PRIVMSG #c :two words");
    }

    #[test]
    fn debug_redacts_token() {
        let account = Account::new("bot", "secret-token", "c");
        let dbg = format!("{account:?}");
        assert!(!dbg.contains("secret-token"));
        assert!(dbg.contains("bot"));
    }
}
