//! Error types for the TCP transport

use rfchat_core::TransportError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the TCP transport
#[derive(Error, Debug)]
pub enum TcpTransportError {
    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Hello too large: {size} bytes (max: {max_size})")]
    HelloTooLarge { size: usize, max_size: usize },

    #[error("Bad hello magic: {0:#010x}")]
    BadMagic(u32),

    #[error("Hello encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TcpTransportError> for TransportError {
    fn from(err: TcpTransportError) -> Self {
        match err {
            TcpTransportError::Io(e) => TransportError::Io(e),
            other => TransportError::handshake(other),
        }
    }
}
