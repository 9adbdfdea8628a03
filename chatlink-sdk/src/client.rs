//! Chat connection client.
//!
//! A [`ChatConnection`] owns one socket to the chat relay at a time. It writes
//! the login handshake on open, answers server pings, sends its own keep-alive
//! pings, turns inbound lines into [`ChatEvent`]s and reconnects on its own
//! after an unexpected close, until [`ChatConnection::disconnect`] is called.
//!
//! Each `connect()` starts a new *generation*: a spawned task that runs the
//! socket, the keep-alive timer and the reconnect timer. All emissions are
//! checked against the current generation under the shared lock, so once a
//! generation is torn down nothing it produces reaches subscribers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::account::{self, Account};
use crate::backoff::ReconnectPolicy;
use crate::event::{ChatEvent, ConnectionState};
use crate::framing::LineBuffer;
use crate::parse::{self, Inbound};
use crate::subscribers::Subscribers;
use crate::transport::{Connector, DefaultConnector, Socket, SocketSignal};

pub const DEFAULT_ENDPOINT: &str = "wss://irc-ws.chat.twitch.tv:443";
pub const DEFAULT_SERVER_NAME: &str = "tmi.twitch.tv";
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Capabilities requested during the handshake, one `CAP REQ` each.
pub const DEFAULT_CAPABILITIES: [&str; 3] = [
    "twitch.tv/membership",
    "twitch.tv/tags",
    "twitch.tv/commands",
];

/// When a freshly opened socket counts as `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyOn {
    /// As soon as the handshake is written.
    #[default]
    SocketOpen,
    /// After the server's `001` welcome; `Authenticating` until then.
    Welcome,
}

/// Configuration for a [`ChatConnection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Relay URL (`wss://`, `ws://`, `irc://` or `ircs://`).
    pub endpoint: String,
    /// Name used in keep-alive `PING`s and in `PONG`s to token-less pings.
    pub server_name: String,
    pub keepalive_interval: Duration,
    pub reconnect: ReconnectPolicy,
    pub ready_on: ReadyOn,
    pub capabilities: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            reconnect: ReconnectPolicy::default(),
            ready_on: ReadyOn::default(),
            capabilities: DEFAULT_CAPABILITIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A self-reconnecting connection to one channel on the chat relay.
///
/// `connect`, `disconnect` and `send_message` return immediately; progress is
/// observed through [`subscribe_status`](Self::subscribe_status) and
/// [`subscribe_events`](Self::subscribe_events). `connect` spawns onto the
/// current Tokio runtime; without one it reports `Error` and does nothing else.
pub struct ChatConnection {
    config: Arc<ConnectionConfig>,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ChatConnection {
    /// A connection using the transport matching `config.endpoint`.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(config, Arc::new(DefaultConnector::new()))
    }

    pub fn with_connector(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
            shared: Arc::new(Shared::default()),
            task: Mutex::new(None),
        }
    }

    /// Tear down any previous socket and timers, then start connecting
    /// `account`. Reconnects indefinitely until [`disconnect`](Self::disconnect).
    pub fn connect(&self, account: Account) {
        let mut task = lock(&self.task);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("connect() called outside a Tokio runtime: {e}");
                let generation = self.shared.begin_generation();
                if let Some(previous) = task.take() {
                    previous.abort();
                }
                self.shared.set_state(generation, ConnectionState::Error);
                self.shared.emit(
                    generation,
                    ChatEvent::system(
                        &account.channel_name(),
                        "Connection error: no async runtime available",
                    ),
                );
                return;
            }
        };

        let generation = self.shared.begin_generation();
        if let Some(previous) = task.take() {
            previous.abort();
        }

        tracing::info!(
            generation,
            endpoint = %self.config.endpoint,
            channel = %account.channel_name(),
            nick = %account.nickname,
            "Connecting"
        );
        self.shared.set_state(generation, ConnectionState::Connecting);

        let actor = Actor {
            generation,
            account,
            config: Arc::clone(&self.config),
            connector: Arc::clone(&self.connector),
            shared: Arc::clone(&self.shared),
        };
        *task = Some(runtime.spawn(actor.run()));
    }

    /// Stop for good: cancel any pending reconnect, stop keep-alive, close the
    /// socket and report `Disconnected`. Idempotent.
    pub fn disconnect(&self) {
        let mut task = lock(&self.task);
        let generation = self.shared.stop();
        if let Some(handle) = task.take() {
            handle.abort();
            tracing::info!(generation, "Disconnected by request");
        }
    }

    /// Send `text` to `channel` (a leading `#` is added if missing).
    ///
    /// Returns `false`, writing nothing, unless the connection is `Connected`.
    /// On success a local echo event is emitted, since the relay does not echo
    /// our own messages back.
    pub fn send_message(&self, channel: &str, text: &str) -> bool {
        self.shared.send_message(channel, text)
    }

    /// Point-in-time connection state.
    pub fn status(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Receive every subsequent state transition.
    pub fn subscribe_status(&self) -> mpsc::UnboundedReceiver<ConnectionState> {
        self.shared.lock().status_subs.subscribe()
    }

    /// Receive every subsequent chat event.
    pub fn subscribe_events(&self) -> mpsc::UnboundedReceiver<ChatEvent> {
        self.shared.lock().event_subs.subscribe()
    }
}

impl Drop for ChatConnection {
    fn drop(&mut self) {
        let task = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = task {
            self.shared.stop();
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer for the live socket, present only while `Connected`.
struct Writer {
    lines: mpsc::UnboundedSender<String>,
    nickname: String,
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    generation: u64,
    writer: Option<Writer>,
    status_subs: Subscribers<ConnectionState>,
    event_subs: Subscribers<ChatEvent>,
}

impl Inner {
    fn transition(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.status_subs.publish(&state);
        }
    }
}

#[derive(Default)]
struct Shared {
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    /// Invalidate the running generation and return the new one.
    fn begin_generation(&self) -> u64 {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.writer = None;
        if matches!(
            inner.state,
            ConnectionState::Connecting
                | ConnectionState::Authenticating
                | ConnectionState::Connected
                | ConnectionState::Error
        ) {
            inner.transition(ConnectionState::Disconnected);
        }
        inner.generation
    }

    fn stop(&self) -> u64 {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.writer = None;
        inner.transition(ConnectionState::Disconnected);
        inner.generation
    }

    /// Returns `false` if `generation` is stale.
    fn set_state(&self, generation: u64, state: ConnectionState) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.transition(state);
        true
    }

    fn mark_connected(&self, generation: u64, writer: Writer) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.writer = Some(writer);
        inner.transition(ConnectionState::Connected);
        true
    }

    fn close_writer(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.writer = None;
        }
    }

    fn emit(&self, generation: u64, event: ChatEvent) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.event_subs.publish(&event);
        }
    }

    fn send_message(&self, channel: &str, text: &str) -> bool {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Connected {
            return false;
        }
        let Some(writer) = inner.writer.as_ref() else {
            return false;
        };

        let channel = account::normalize_channel(channel);
        let line = account::privmsg_line(&channel, text);
        if writer.lines.send(line).is_err() {
            return false;
        }
        let echo = ChatEvent::own_message(&writer.nickname, &channel, text);
        inner.event_subs.publish(&echo);
        true
    }
}

/// How a socket session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The socket closed or failed.
    Closed { was_connected: bool },
    /// The server sent `RECONNECT`.
    ServerRequested { was_connected: bool },
    /// This generation was superseded.
    Stale,
}

/// Runs one generation: connect, session, back off, repeat.
struct Actor {
    generation: u64,
    account: Account,
    config: Arc<ConnectionConfig>,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
}

impl Actor {
    async fn run(self) {
        let generation = self.generation;
        let channel = self.account.channel_name();
        let mut attempt: u32 = 0;

        loop {
            if !self.shared.set_state(generation, ConnectionState::Connecting) {
                return;
            }

            match self.connector.open(&self.config.endpoint).await {
                Ok(socket) => match self.session(socket, &channel).await {
                    SessionEnd::Stale => return,
                    SessionEnd::Closed { was_connected } => {
                        if was_connected {
                            attempt = 0;
                        }
                        self.shared
                            .emit(generation, ChatEvent::system(&channel, "Connection lost"));
                    }
                    SessionEnd::ServerRequested { was_connected } => {
                        if was_connected {
                            attempt = 0;
                        }
                        self.shared.emit(
                            generation,
                            ChatEvent::system(&channel, "Server requested reconnect"),
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(generation, "Connection failed: {e}");
                    if !self.shared.set_state(generation, ConnectionState::Error) {
                        return;
                    }
                    self.shared.emit(
                        generation,
                        ChatEvent::system(&channel, format!("Connection error: {e}")),
                    );
                }
            }

            if !self.shared.set_state(generation, ConnectionState::Disconnected) {
                return;
            }

            let delay = self.config.reconnect.delay_for(attempt);
            attempt = attempt.saturating_add(1);
            tracing::info!(generation, attempt, "Reconnecting in {delay:?}");
            tokio::time::sleep(delay).await;
        }
    }

    async fn session(&self, mut socket: Socket, channel: &str) -> SessionEnd {
        let generation = self.generation;

        for line in account::handshake_lines(&self.account, &self.config.capabilities) {
            if line.starts_with("PASS ") {
                tracing::debug!(generation, "-> PASS oauth:***");
            } else {
                tracing::debug!(generation, "-> {line}");
            }
            if !socket.send(line) {
                return SessionEnd::Closed {
                    was_connected: false,
                };
            }
        }

        let mut connected = false;
        match self.config.ready_on {
            ReadyOn::SocketOpen => {
                if !self.become_connected(&socket, channel) {
                    return SessionEnd::Stale;
                }
                connected = true;
            }
            ReadyOn::Welcome => {
                if !self
                    .shared
                    .set_state(generation, ConnectionState::Authenticating)
                {
                    return SessionEnd::Stale;
                }
            }
        }

        // interval_at panics on a zero period.
        let period = self.config.keepalive_interval.max(Duration::from_millis(1));
        let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut framer = LineBuffer::new();

        let end = loop {
            tokio::select! {
                signal = socket.recv() => {
                    match signal {
                        Some(SocketSignal::Frame(frame)) => {
                            let mut reconnect = false;
                            for line in framer.push(&frame) {
                                match self.handle_line(&socket, &line, channel, &mut connected) {
                                    LineOutcome::Continue => {}
                                    LineOutcome::BecameConnected => keepalive.reset(),
                                    LineOutcome::Reconnect => {
                                        reconnect = true;
                                        break;
                                    }
                                    LineOutcome::Stale => return SessionEnd::Stale,
                                }
                            }
                            if reconnect {
                                break SessionEnd::ServerRequested { was_connected: connected };
                            }
                        }
                        Some(SocketSignal::Error(reason)) => {
                            tracing::warn!(generation, "Transport error: {reason}");
                            if !self.shared.set_state(generation, ConnectionState::Error) {
                                return SessionEnd::Stale;
                            }
                            self.shared.emit(
                                generation,
                                ChatEvent::system(channel, format!("Connection error: {reason}")),
                            );
                        }
                        Some(SocketSignal::Closed(reason)) => {
                            tracing::info!(generation, reason = ?reason, "Connection closed");
                            break SessionEnd::Closed { was_connected: connected };
                        }
                        None => {
                            tracing::info!(generation, "Transport went away");
                            break SessionEnd::Closed { was_connected: connected };
                        }
                    }
                }
                _ = keepalive.tick(), if connected => {
                    let ping = format!("PING :{}", self.config.server_name);
                    tracing::trace!(generation, "-> {ping}");
                    socket.send(ping);
                }
            }
        };

        self.shared.close_writer(generation);
        end
    }

    fn become_connected(&self, socket: &Socket, channel: &str) -> bool {
        let writer = Writer {
            lines: socket.writer(),
            nickname: self.account.nickname.clone(),
        };
        if !self.shared.mark_connected(self.generation, writer) {
            return false;
        }
        tracing::info!(generation = self.generation, %channel, "Connected");
        self.shared.emit(
            self.generation,
            ChatEvent::system(channel, format!("Connected to {channel}")),
        );
        true
    }

    fn handle_line(
        &self,
        socket: &Socket,
        line: &str,
        channel: &str,
        connected: &mut bool,
    ) -> LineOutcome {
        let generation = self.generation;
        tracing::trace!(generation, "<- {line}");

        match parse::classify(line) {
            Inbound::Ping { token } => {
                let token = token.as_deref().unwrap_or(&self.config.server_name);
                socket.send(format!("PONG :{token}"));
            }
            Inbound::Chat(chat) => {
                self.shared.emit(generation, chat.into_event(Utc::now()));
            }
            Inbound::Welcome { nick } => {
                tracing::debug!(generation, %nick, "Welcome received");
                if !*connected {
                    if !self.become_connected(socket, channel) {
                        return LineOutcome::Stale;
                    }
                    *connected = true;
                    return LineOutcome::BecameConnected;
                }
            }
            Inbound::Notice {
                channel: notice_channel,
                text,
            } => {
                tracing::info!(generation, "Server notice: {text}");
                let target = notice_channel.as_deref().unwrap_or(channel);
                self.shared.emit(generation, ChatEvent::system(target, text));
            }
            Inbound::Reconnect => {
                tracing::info!(generation, "Server requested reconnect");
                return LineOutcome::Reconnect;
            }
            Inbound::CapAck(caps) => tracing::debug!(generation, "Capabilities acknowledged: {caps}"),
            Inbound::CapNak(caps) => tracing::warn!(generation, "Capabilities rejected: {caps}"),
            Inbound::Ignored => {}
        }
        LineOutcome::Continue
    }
}

enum LineOutcome {
    Continue,
    BecameConnected,
    Reconnect,
    Stale,
}
