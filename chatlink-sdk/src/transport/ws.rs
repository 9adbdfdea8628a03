//! IRC over WebSocket, as served by `wss://irc-ws.chat.twitch.tv`.
//!
//! Each outbound line is sent as its own text frame. Inbound text frames are
//! forwarded untouched; the relay batches `\r\n`-terminated lines into them.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use super::{Connector, Socket, SocketPeer, SocketSignal};
use crate::error::TransportError;

#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, endpoint: &str) -> Result<Socket, TransportError> {
        tracing::debug!(%endpoint, "Opening WebSocket");
        let (stream, _response) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|source| TransportError::WebSocket {
                endpoint: endpoint.to_string(),
                source,
            })?;
        tracing::debug!(%endpoint, "WebSocket open");

        let (socket, peer) = Socket::pair();
        tokio::spawn(pump(stream, peer));
        Ok(socket)
    }
}

async fn pump<S>(stream: WebSocketStream<S>, mut peer: SocketPeer)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut frames) = stream.split();

    loop {
        tokio::select! {
            line = peer.lines.recv() => {
                match line {
                    Some(line) => {
                        if let Err(e) = sink.send(Message::Text(line)).await {
                            peer.signal(SocketSignal::Error(e.to_string()));
                            peer.signal(SocketSignal::Closed(None));
                            break;
                        }
                    }
                    None => {
                        // Owner dropped the socket.
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            frame = frames.next() => {
                let delivered = match frame {
                    Some(Ok(Message::Text(text))) => peer.signal(SocketSignal::Frame(text)),
                    Some(Ok(Message::Binary(data))) => {
                        peer.signal(SocketSignal::Frame(String::from_utf8_lossy(&data).into_owned()))
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty());
                        peer.signal(SocketSignal::Closed(reason));
                        break;
                    }
                    // Control frames are answered by tungstenite itself.
                    Some(Ok(_)) => true,
                    Some(Err(e)) => {
                        peer.signal(SocketSignal::Error(e.to_string()));
                        peer.signal(SocketSignal::Closed(None));
                        break;
                    }
                    None => {
                        peer.signal(SocketSignal::Closed(None));
                        break;
                    }
                };
                if !delivered {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }
}
