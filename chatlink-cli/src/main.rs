//! Terminal front end for a chatlink connection.
//!
//! Connects a bot account to one channel, prints status changes and chat
//! events, and sends each line typed on stdin to the channel.
//!
//! Usage:
//!   TWITCH_OAUTH_TOKEN=... chatlink --nick mybot --channel mychannel
//!
//! Log verbosity follows `RUST_LOG` (defaults to `info` for chatlink crates).

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chatlink_sdk::account::Account;
use chatlink_sdk::backoff::ReconnectPolicy;
use chatlink_sdk::client::{
    ChatConnection, ConnectionConfig, ReadyOn, DEFAULT_ENDPOINT, DEFAULT_SERVER_NAME,
};
use chatlink_sdk::event::{ChatEvent, ChatEventKind};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chatlink", version, about = "Twitch chat bot connection")]
struct Args {
    /// Bot account login name
    #[arg(long)]
    nick: String,

    /// OAuth token (with or without the `oauth:` prefix)
    #[arg(long, env = "TWITCH_OAUTH_TOKEN", hide_env_values = true)]
    token: String,

    /// Channel to join (leading `#` optional)
    #[arg(long)]
    channel: String,

    /// Relay endpoint: wss://, ws://, irc:// or ircs://
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Server name used in keep-alive pings
    #[arg(long, default_value = DEFAULT_SERVER_NAME)]
    server_name: String,

    /// Seconds between keep-alive pings
    #[arg(long, default_value = "30")]
    keepalive_secs: u64,

    /// Seconds before the first reconnect attempt
    #[arg(long, default_value = "5")]
    reconnect_secs: u64,

    /// Back off exponentially (with jitter) up to this many seconds.
    /// Without it every reconnect waits --reconnect-secs.
    #[arg(long)]
    reconnect_max_secs: Option<u64>,

    /// Report Connected only after the server welcome instead of on socket open
    #[arg(long)]
    wait_for_welcome: bool,
}

impl Args {
    fn connection_config(&self) -> ConnectionConfig {
        let base = Duration::from_secs(self.reconnect_secs);
        let reconnect = match self.reconnect_max_secs {
            Some(max) => ReconnectPolicy::exponential(base, Duration::from_secs(max)),
            None => ReconnectPolicy::fixed(base),
        };
        ConnectionConfig {
            endpoint: self.endpoint.clone(),
            server_name: self.server_name.clone(),
            keepalive_interval: Duration::from_secs(self.keepalive_secs),
            reconnect,
            ready_on: if self.wait_for_welcome {
                ReadyOn::Welcome
            } else {
                ReadyOn::SocketOpen
            },
            ..Default::default()
        }
    }

    fn account(&self) -> Account {
        Account::new(&self.nick, &self.token, &self.channel)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("chatlink_cli=info".parse()?)
                .add_directive("chatlink_sdk=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let account = args.account();
    let channel = account.channel_name();

    let conn = ChatConnection::new(args.connection_config());

    tracing::info!(endpoint = %args.endpoint, %channel, "Starting");
    let stdin = BufReader::new(tokio::io::stdin());
    run(&conn, account, stdin, tokio::signal::ctrl_c()).await?;
    Ok(())
}

/// Drive `conn` until `shutdown` resolves: print status changes and events,
/// and send every non-empty input line to the account's channel.
async fn run<R, F>(conn: &ChatConnection, account: Account, input: R, shutdown: F) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    let channel = account.channel_name();
    let mut status = conn.subscribe_status();
    let mut events = conn.subscribe_events();
    conn.connect(account);

    let mut lines = input.lines();
    let mut input_open = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(state) = status.recv() => {
                println!("* {state}");
            }
            Some(event) = events.recv() => {
                print_event(&event);
            }
            line = lines.next_line(), if input_open => {
                match line? {
                    Some(line) => {
                        let text = line.trim();
                        if text.is_empty() {
                            continue;
                        }
                        if !conn.send_message(&channel, text) {
                            println!("* not connected ({}), message dropped", conn.status());
                        }
                    }
                    None => input_open = false,
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down, disconnecting");
                break;
            }
        }
    }

    conn.disconnect();
    Ok(())
}

fn print_event(event: &ChatEvent) {
    let time = event
        .timestamp
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S");
    match event.kind {
        ChatEventKind::Message => {
            println!("[{time}] {} <{}> {}", event.channel, event.display_name(), event.text)
        }
        ChatEventKind::Join | ChatEventKind::Part => {
            println!("[{time}] {} {} {}", event.channel, event.username, event.text)
        }
        ChatEventKind::System => println!("[{time}] -- {}", event.text),
    }
}
