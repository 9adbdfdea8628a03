//! Tokenizer for IRC protocol lines as spoken by the Twitch chat relay.
//!
//! Splits a line into its optional IRCv3 tag block, optional source prefix,
//! command and parameters: `@key=value;key2=value2 :prefix COMMAND params :trailing`

use std::collections::HashMap;

/// One tokenized protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// IRCv3 message tags (key=value pairs, values unescaped).
    pub tags: HashMap<String, String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl Message {
    /// Tokenize a raw line. Returns `None` for empty lines and for lines whose
    /// tag block or prefix is not followed by a command.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return None;
        }

        let mut rest = line;

        let tags = if let Some(tagged) = rest.strip_prefix('@') {
            let (tag_str, after) = tagged.split_once(' ')?;
            rest = after.trim_start_matches(' ');
            parse_tags(tag_str)
        } else {
            HashMap::new()
        };

        let prefix = if let Some(sourced) = rest.strip_prefix(':') {
            let (pfx, after) = sourced.split_once(' ')?;
            rest = after.trim_start_matches(' ');
            Some(pfx.to_string())
        } else {
            None
        };

        let mut params = Vec::new();
        let command;

        if let Some((cmd, after)) = rest.split_once(' ') {
            command = cmd.to_ascii_uppercase();
            rest = after;

            while !rest.is_empty() {
                if let Some(trailing) = rest.strip_prefix(':') {
                    params.push(trailing.to_string());
                    break;
                }
                if let Some((param, after)) = rest.split_once(' ') {
                    if !param.is_empty() {
                        params.push(param.to_string());
                    }
                    rest = after;
                } else {
                    params.push(rest.to_string());
                    break;
                }
            }
        } else {
            command = rest.to_ascii_uppercase();
        }

        if command.is_empty() {
            return None;
        }

        Some(Message {
            tags,
            prefix,
            command,
            params,
        })
    }

    /// Nick of a user-sourced line (`nick!ident@host`).
    ///
    /// Server-sourced prefixes such as `tmi.twitch.tv` yield `None`.
    pub fn user_nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let (nick, mask) = prefix.split_once('!')?;
        if nick.is_empty() || !mask.contains('@') {
            return None;
        }
        Some(nick)
    }
}

/// Split a tag block (without the leading `@`) into unescaped key/value pairs.
/// Valueless keys such as `badge-info` or `badge-info=` map to an empty string.
fn parse_tags(block: &str) -> HashMap<String, String> {
    block
        .split(';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (key, value) = entry.split_once('=').unwrap_or((entry, ""));
            (key.to_string(), unescape_tag_value(value))
        })
        .collect()
}

// `\:` is `;` and `\s` is a space. Unknown escapes keep the escaped char;
// a trailing lone backslash is dropped.
fn unescape_tag_value(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut escaped = false;
    for c in raw.chars() {
        if escaped {
            out.push(match c {
                ':' => ';',
                's' => ' ',
                'r' => '\r',
                'n' => '\n',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let msg = Message::parse("PING :tmi.twitch.tv").unwrap();
        assert!(msg.tags.is_empty());
        assert!(msg.prefix.is_none());
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["tmi.twitch.tv"]);
    }

    #[test]
    fn parse_privmsg_with_prefix() {
        let msg =
            Message::parse(":alice!alice@alice.tmi.twitch.tv PRIVMSG #mychan :hello there\r\n")
                .unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("alice!alice@alice.tmi.twitch.tv"));
        assert_eq!(msg.user_nick(), Some("alice"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#mychan", "hello there"]);
    }

    #[test]
    fn parse_with_tags() {
        let msg = Message::parse(
            "@badge-info=;color=#1E90FF;display-name=Alice;tmi-sent-ts=1700000000000 :alice!alice@alice.tmi.twitch.tv PRIVMSG #mychan :hi",
        )
        .unwrap();
        assert_eq!(msg.tags.get("display-name").unwrap(), "Alice");
        assert_eq!(msg.tags.get("color").unwrap(), "#1E90FF");
        assert_eq!(msg.tags.get("badge-info").unwrap(), "");
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#mychan", "hi"]);
    }

    #[test]
    fn parse_tags_with_escapes() {
        let msg = Message::parse(
            "@system-msg=5\\sgift\\ssubs\\:\\sthanks :tmi.twitch.tv USERNOTICE #mychan",
        )
        .unwrap();
        assert_eq!(msg.tags.get("system-msg").unwrap(), "5 gift subs; thanks");
        assert_eq!(msg.user_nick(), None);
    }

    #[test]
    fn unescape_edge_cases() {
        assert_eq!(unescape_tag_value(r"a\\b"), r"a\b");
        assert_eq!(unescape_tag_value(r"line\r\nnext"), "line\r\nnext");
        assert_eq!(unescape_tag_value(r"\q"), "q");
        assert_eq!(unescape_tag_value("trailing\\"), "trailing");
        let tags = parse_tags("flag;empty=;k=v;;");
        assert_eq!(tags.len(), 3);
        assert_eq!(tags["flag"], "");
        assert_eq!(tags["empty"], "");
        assert_eq!(tags["k"], "v");
    }

    #[test]
    fn parse_server_numeric() {
        let msg = Message::parse(":tmi.twitch.tv 001 bot :Welcome, GLHF!").unwrap();
        assert_eq!(msg.command, "001");
        assert_eq!(msg.params, vec!["bot", "Welcome, GLHF!"]);
        assert_eq!(msg.user_nick(), None);
    }

    #[test]
    fn parse_cap_ack() {
        let msg = Message::parse(":tmi.twitch.tv CAP * ACK :twitch.tv/membership").unwrap();
        assert_eq!(msg.command, "CAP");
        assert_eq!(msg.params, vec!["*", "ACK", "twitch.tv/membership"]);
    }

    #[test]
    fn parse_rejects_dangling_prefix() {
        assert!(Message::parse(":only-a-prefix").is_none());
        assert!(Message::parse("@a=b").is_none());
        assert!(Message::parse("\r\n").is_none());
    }

    #[test]
    fn command_is_uppercased() {
        let msg = Message::parse("ping :x").unwrap();
        assert_eq!(msg.command, "PING");
    }
}
