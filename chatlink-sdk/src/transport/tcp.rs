//! IRC over raw TCP (`irc://host:port`) or TLS (`ircs://host:port`).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::rustls;
use tokio_rustls::TlsConnector;

use super::{Connector, Socket, SocketPeer, SocketSignal};
use crate::error::TransportError;

pub const DEFAULT_PLAIN_PORT: u16 = 6667;
pub const DEFAULT_TLS_PORT: u16 = 6697;

#[derive(Debug, Default, Clone)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn open(&self, endpoint: &str) -> Result<Socket, TransportError> {
        let target = Target::parse(endpoint)?;
        let addr = format!("{}:{}", target.host, target.port);
        let mode = if target.tls { "TLS" } else { "plain" };

        tracing::debug!(%addr, mode, "Opening TCP connection");
        let tcp = TcpStream::connect(&addr)
            .await
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;

        if !target.tls {
            return Ok(spawn_pump(tcp));
        }

        let connector = TlsConnector::from(Arc::new(rustls_default_config()));
        let dns_name = rustls::pki_types::ServerName::try_from(target.host.clone()).map_err(|e| {
            TransportError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
        })?;
        let tls_stream = connector
            .connect(dns_name, tcp)
            .await
            .map_err(|source| TransportError::Tls {
                endpoint: endpoint.to_string(),
                source,
            })?;
        tracing::debug!(%addr, "TLS handshake complete");
        Ok(spawn_pump(tls_stream))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    tls: bool,
}

impl Target {
    fn parse(endpoint: &str) -> Result<Self, TransportError> {
        let invalid = |reason: &str| TransportError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        let (tls, rest) = if let Some(rest) = endpoint.strip_prefix("ircs://") {
            (true, rest)
        } else if let Some(rest) = endpoint.strip_prefix("irc://") {
            (false, rest)
        } else {
            return Err(TransportError::UnsupportedScheme(endpoint.to_string()));
        };

        let authority = rest.split('/').next().unwrap_or_default();
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| invalid("bad port"))?;
                (host, port)
            }
            None if tls => (authority, DEFAULT_TLS_PORT),
            None => (authority, DEFAULT_PLAIN_PORT),
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            tls,
        })
    }
}

fn rustls_default_config() -> rustls::ClientConfig {
    // Only ring is compiled in; installing it is a no-op after the first call.
    let _ = rustls::crypto::ring::default_provider().install_default();
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

fn spawn_pump<S>(stream: S) -> Socket
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (socket, peer) = Socket::pair();
    let (reader, writer) = tokio::io::split(stream);
    tokio::spawn(pump(BufReader::new(reader), writer, peer));
    socket
}

async fn pump<R, W>(mut reader: R, mut writer: W, mut peer: SocketPeer)
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Partial lines stay here across select iterations.
    let mut line_buf: Vec<u8> = Vec::new();

    loop {
        tokio::select! {
            line = peer.lines.recv() => {
                let Some(line) = line else {
                    let _ = writer.shutdown().await;
                    break;
                };
                if let Err(e) = writer.write_all(format!("{line}\r\n").as_bytes()).await {
                    peer.signal(SocketSignal::Error(e.to_string()));
                    peer.signal(SocketSignal::Closed(None));
                    break;
                }
            }
            result = reader.read_until(b'\n', &mut line_buf) => {
                match result {
                    Ok(0) => {
                        if !line_buf.is_empty() {
                            let tail = String::from_utf8_lossy(&line_buf).into_owned();
                            peer.signal(SocketSignal::Frame(tail));
                        }
                        peer.signal(SocketSignal::Closed(Some("EOF".to_string())));
                        break;
                    }
                    Ok(_) => {
                        let frame = String::from_utf8_lossy(&line_buf).into_owned();
                        line_buf.clear();
                        if !peer.signal(SocketSignal::Frame(frame)) {
                            let _ = writer.shutdown().await;
                            break;
                        }
                    }
                    Err(e) => {
                        peer.signal(SocketSignal::Error(e.to_string()));
                        peer.signal(SocketSignal::Closed(None));
                        break;
                    }
                }
            }
        }
    }
}
