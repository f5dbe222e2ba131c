//! rfchat CLI application
//!
//! Wires a `ConnectionService` to the TCP provider, the JSON lines store and
//! the terminal, then turns interactive input into service calls.

use std::io::Write;
use std::sync::Arc;

use rfchat_core::{NoOpPersistence, PersistenceGateway, RemoteDevice};
use rfchat_runtime::{ConnectionService, ConnectionState, ServiceBuilder};
use rfchat_tcp::TcpSocketProvider;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::console::{ConsoleListener, TerminalNotifier};
use crate::error::Result;
use crate::store::JsonlStore;

pub const HELP: &str = "\
Commands:
  /connect <host:port>  connect to a listening peer
  /listen               wait for a peer to connect
  /stop                 close the link and stop listening
  /status               show the link state
  /help                 show this help
  /quit                 leave
Anything else is sent to the connected peer.";

// ----------------------------------------------------------------------------
// Interactive Commands
// ----------------------------------------------------------------------------

/// One line of interactive input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Connect(String),
    Listen,
    Stop,
    Status,
    Help,
    Quit,
    Send(String),
    Empty,
    Invalid(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ChatCommand::Empty;
        }
        let Some(command) = trimmed.strip_prefix('/') else {
            return ChatCommand::Send(line.trim_end_matches(['\r', '\n']).to_string());
        };

        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("connect"), Some(address), None) => ChatCommand::Connect(address.to_string()),
            (Some("connect"), _, _) => ChatCommand::Invalid("usage: /connect <host:port>".into()),
            (Some("listen"), None, _) => ChatCommand::Listen,
            (Some("stop"), None, _) => ChatCommand::Stop,
            (Some("status"), None, _) => ChatCommand::Status,
            (Some("help"), None, _) => ChatCommand::Help,
            (Some("quit") | Some("exit"), None, _) => ChatCommand::Quit,
            _ => ChatCommand::Invalid(format!("unknown command: {}", trimmed)),
        }
    }
}

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

/// The chat client
pub struct ChatApp {
    config: AppConfig,
    service: ConnectionService,
    store: Option<JsonlStore>,
}

impl ChatApp {
    /// Build the application; must run inside the tokio runtime
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;

        let store = if config.cli.persist_history {
            let store = JsonlStore::open(config.data_dir())?;
            info!("Storing history in {}", store.dir().display());
            Some(store)
        } else {
            None
        };
        let persistence: Arc<dyn PersistenceGateway> = match &store {
            Some(store) => Arc::new(store.clone()),
            None => Arc::new(NoOpPersistence),
        };

        let console = Arc::new(ConsoleListener::new());
        let provider = Arc::new(TcpSocketProvider::new(config.tcp.clone()));
        let service = ServiceBuilder::new(provider)
            .with_config(config.link.clone())
            .with_persistence(persistence)
            .with_notifications(Arc::new(TerminalNotifier))
            .with_connection_listener(console.clone())
            .with_message_listener(console)
            .build()?;

        Ok(Self {
            config,
            service,
            store,
        })
    }

    pub fn service(&self) -> &ConnectionService {
        &self.service
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Execute one interactive command; returns `false` once the user quits
    pub async fn handle(&self, command: ChatCommand) -> Result<bool> {
        debug!("Handling {:?}", command);
        match command {
            ChatCommand::Connect(address) => {
                self.service.connect(RemoteDevice::unnamed(address)).await;
            }
            ChatCommand::Listen => {
                if let Err(e) = self.service.start_listening().await {
                    println!("* cannot listen: {}", e);
                }
            }
            ChatCommand::Stop => self.service.stop().await,
            ChatCommand::Status => println!("{}", self.status_line().await),
            ChatCommand::Help => println!("{}", HELP),
            ChatCommand::Quit => return Ok(false),
            ChatCommand::Send(text) => {
                if self.service.is_connected() {
                    self.service.send(&text).await;
                } else {
                    println!("* not connected, message not sent");
                }
            }
            ChatCommand::Empty => {}
            ChatCommand::Invalid(reason) => println!("* {}", reason),
        }
        Ok(true)
    }

    /// Describe the current link
    pub async fn status_line(&self) -> String {
        let state = self.service.state();
        let mut line = match (state, self.service.peer().await) {
            (ConnectionState::Connected, Some(peer)) => format!("* {} with {}", state, peer),
            (ConnectionState::Listening, _) => format!(
                "* {} on {} as {}",
                state, self.config.tcp.bind_addr, self.config.tcp.display_name
            ),
            _ => format!("* {}", state),
        };
        if let Some(count) = self.stored_message_count() {
            line.push_str(&format!(" ({} messages stored)", count));
        }
        line
    }

    fn stored_message_count(&self) -> Option<usize> {
        let store = self.store.as_ref()?;
        match store.messages() {
            Ok(messages) => Some(messages.len()),
            Err(e) => {
                warn!("Could not read history: {}", e);
                None
            }
        }
    }

    /// Read commands from stdin until `/quit`, end of input or Ctrl-C
    pub async fn run_interactive(&self) -> Result<()> {
        println!("Type /help for commands.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("{}", self.config.cli.prompt);
            std::io::stdout().flush()?;

            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if !self.handle(ChatCommand::parse(&line)).await? {
                            break;
                        }
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Close the link and stop listening
    pub async fn shutdown(&self) {
        info!("Shutting down");
        self.service.stop().await;
    }
}
