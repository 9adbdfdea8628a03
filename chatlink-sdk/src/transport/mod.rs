//! Sockets to the chat relay.
//!
//! A transport is reduced to a pair of channels: protocol lines go out, raw
//! text frames and lifecycle signals come in. Each concrete connector spawns a
//! pump task that owns the real stream and shuttles between it and a
//! [`SocketPeer`]. Dropping the [`Socket`] closes the stream.

pub mod tcp;
pub mod ws;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

pub use tcp::TcpConnector;
pub use ws::WsConnector;

/// What the relay side of a socket reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketSignal {
    /// A text frame; may hold zero, one or many lines, or part of one.
    Frame(String),
    /// Transport-level error. A `Closed` normally follows.
    Error(String),
    /// The stream ended, with the close reason if the transport gave one.
    Closed(Option<String>),
}

/// The connection-facing end of an open socket.
#[derive(Debug)]
pub struct Socket {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<SocketSignal>,
}

/// The transport-facing end of an open socket.
#[derive(Debug)]
pub struct SocketPeer {
    /// Protocol lines to write, without terminators. `None` once the
    /// [`Socket`] is dropped.
    pub lines: mpsc::UnboundedReceiver<String>,
    pub signals: mpsc::UnboundedSender<SocketSignal>,
}

impl Socket {
    pub fn pair() -> (Socket, SocketPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Socket {
                outbound: out_tx,
                inbound: in_rx,
            },
            SocketPeer {
                lines: out_rx,
                signals: in_tx,
            },
        )
    }

    /// Queue one protocol line. Returns `false` if the transport is gone.
    pub fn send(&self, line: impl Into<String>) -> bool {
        self.outbound.send(line.into()).is_ok()
    }

    pub async fn recv(&mut self) -> Option<SocketSignal> {
        self.inbound.recv().await
    }

    /// A detached writer, valid until the transport goes away.
    pub fn writer(&self) -> mpsc::UnboundedSender<String> {
        self.outbound.clone()
    }
}

impl SocketPeer {
    /// Forward a signal to the connection. Returns `false` once the
    /// connection has dropped its socket.
    pub fn signal(&self, signal: SocketSignal) -> bool {
        self.signals.send(signal).is_ok()
    }
}

/// Opens sockets to a relay endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, endpoint: &str) -> Result<Socket, TransportError>;
}

/// Chooses the transport from the endpoint scheme:
/// `ws://`/`wss://` use WebSocket, `irc://`/`ircs://` use raw TCP/TLS.
#[derive(Debug, Default)]
pub struct DefaultConnector {
    ws: WsConnector,
    tcp: TcpConnector,
}

impl DefaultConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Connector for DefaultConnector {
    async fn open(&self, endpoint: &str) -> Result<Socket, TransportError> {
        match scheme(endpoint) {
            Some("ws") | Some("wss") => self.ws.open(endpoint).await,
            Some("irc") | Some("ircs") => self.tcp.open(endpoint).await,
            _ => Err(TransportError::UnsupportedScheme(endpoint.to_string())),
        }
    }
}

fn scheme(endpoint: &str) -> Option<&str> {
    endpoint.split_once("://").map(|(scheme, _)| scheme)
}
