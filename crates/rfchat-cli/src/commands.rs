//! Command handlers for the rfchat CLI

use rfchat_core::RemoteDevice;
use tracing::info;

use crate::app::ChatApp;
use crate::cli::Commands;
use crate::config::AppConfig;
use crate::error::Result;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(command: Commands, config: AppConfig) -> Result<()> {
        match command {
            Commands::Listen => Self::handle_listen_command(config).await,
            Commands::Connect { address, peer_name } => {
                Self::handle_connect_command(config, address, peer_name).await
            }
            Commands::Config => Self::handle_config_command(&config),
        }
    }

    /// Start listening, then chat interactively
    async fn handle_listen_command(config: AppConfig) -> Result<()> {
        let app = ChatApp::new(config)?;
        app.service().start_listening().await?;
        app.run_interactive().await
    }

    /// Connect to `address`, then chat interactively
    async fn handle_connect_command(
        config: AppConfig,
        address: String,
        peer_name: Option<String>,
    ) -> Result<()> {
        let peer = match peer_name {
            Some(name) => RemoteDevice::new(address, name),
            None => RemoteDevice::unnamed(address),
        };
        info!("Connecting to {}", peer);

        let app = ChatApp::new(config)?;
        app.service().connect(peer).await;
        app.run_interactive().await
    }

    /// Print the effective configuration
    fn handle_config_command(config: &AppConfig) -> Result<()> {
        print!("{}", config.to_toml()?);
        Ok(())
    }
}
