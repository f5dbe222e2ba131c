//! TCP socket provider for rfchat
//!
//! Implements the `SocketProvider` seam from `rfchat-core` over plain TCP so
//! the connection runtime can be used between two hosts on a network.
//!
//! ## Architecture
//!
//! - [`config`] - Bind address, announced identity and handshake timeout
//! - [`error`] - Error types specific to the TCP transport
//! - [`protocol`] - Hello frame and the service handshake
//! - [`transport`] - `TcpSocketProvider` and its server socket
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rfchat_tcp::{TcpSocketProvider, TcpTransportConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TcpTransportConfig::new()
//!     .with_bind_addr("0.0.0.0:7373".parse()?)
//!     .with_display_name("Alice");
//! let provider = Arc::new(TcpSocketProvider::new(config));
//! # let _ = provider;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod protocol;
mod transport;

pub use config::{TcpTransportConfig, DEFAULT_PORT};
pub use error::TcpTransportError;
pub use protocol::{Hello, HELLO_MAGIC, MAX_HELLO_SIZE};
pub use transport::{TcpServerSocket, TcpSocketProvider};
