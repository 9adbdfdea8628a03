//! chatlink SDK
//!
//! Client library for the Twitch chat relay (IRC over WebSocket or TCP).
//!
//! # Modules
//!
//! - [`client`]: `ChatConnection`: handshake, keep-alive, reconnect, send
//! - [`event`]: Status and chat events emitted to subscribers
//! - [`account`]: Credentials, channel normalization, handshake lines
//! - [`parse`]: Classification of inbound protocol lines
//! - [`irc`]: IRC line tokenizer with IRCv3 tags
//! - [`framing`]: Line reassembly across transport frames
//! - [`backoff`]: Reconnect delay policy
//! - [`transport`]: WebSocket and TCP/TLS sockets
//!
//! # Example
//!
//! ```rust,no_run
//! use chatlink_sdk::account::Account;
//! use chatlink_sdk::client::{ChatConnection, ConnectionConfig};
//!
//! # async fn run() {
//! let conn = ChatConnection::new(ConnectionConfig::default());
//! let mut events = conn.subscribe_events();
//! conn.connect(Account::new("mybot", "oauth-token", "mychannel"));
//! while let Some(event) = events.recv().await {
//!     println!("{}: {}", event.display_name(), event.text);
//! }
//! # }
//! ```

pub mod account;
pub mod backoff;
pub mod client;
pub mod error;
pub mod event;
pub mod framing;
pub mod irc;
pub mod parse;
pub mod subscribers;
pub mod transport;
