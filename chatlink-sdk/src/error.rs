/// Failure to open a socket to the relay.
///
/// Never crosses the `ChatConnection` API; it is logged and surfaced as an
/// `Error` status followed by `Disconnected`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unsupported endpoint scheme in {0} (expected ws, wss, irc or ircs)")]
    UnsupportedScheme(String),

    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("TCP connect to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS handshake with {endpoint} failed: {source}")]
    Tls {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("WebSocket handshake with {endpoint} failed: {source}")]
    WebSocket {
        endpoint: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
}
