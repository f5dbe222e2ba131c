//! TCP transport configuration

use std::net::SocketAddr;
use std::time::Duration;

use rfchat_core::{ChatError, ChatResult};
use serde::{Deserialize, Serialize};

/// Port used when none is configured
pub const DEFAULT_PORT: u16 = 7373;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the TCP socket provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpTransportConfig {
    /// Address the listener binds to
    pub bind_addr: SocketAddr,
    /// Address announced to peers in the handshake
    ///
    /// A listener without one announces its bound address. A dialer without
    /// one announces nothing and is known by the socket address the listener
    /// observes.
    pub advertised_addr: Option<String>,
    /// Name announced to peers in the handshake
    pub display_name: String,
    /// Maximum time for the hello exchange on a fresh stream
    pub handshake_timeout_secs: u64,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            advertised_addr: None,
            display_name: "rfchat".to_string(),
            handshake_timeout_secs: 5,
        }
    }
}

impl TcpTransportConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listener bind address
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the address announced to peers
    pub fn with_advertised_addr(mut self, addr: impl Into<String>) -> Self {
        self.advertised_addr = Some(addr.into());
        self
    }

    /// Set the announced display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Handshake timeout as a `Duration`
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Check the configuration for values the transport cannot work with
    pub fn validate(&self) -> ChatResult<()> {
        if self.display_name.trim().is_empty() {
            return Err(ChatError::config("Display name must not be empty"));
        }
        if self.handshake_timeout_secs == 0 {
            return Err(ChatError::config("Handshake timeout must be greater than 0"));
        }
        Ok(())
    }
}
