//! Error types for rfchat
//!
//! Transport failures are kept in their own enum so the connection runtime can
//! classify them (bind, connect, read/write) without string matching. The
//! crate-wide `ChatError` wraps them together with configuration and
//! collaborator errors.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures reported by a socket provider or an open channel
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to bind listener for service {service}: {reason}")]
    Bind { service: String, reason: String },

    #[error("Connection failed to peer {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    #[error("Service mismatch: expected {expected}, got {actual}")]
    ServiceMismatch { expected: String, actual: String },

    #[error("Handshake failed: {reason}")]
    Handshake { reason: String },

    #[error("Channel closed")]
    Closed,

    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Build a connect failure for the given peer address
    pub fn connect_failed(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectFailed {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a handshake failure from any displayable reason
    pub fn handshake(reason: impl ToString) -> Self {
        Self::Handshake {
            reason: reason.to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Core error type for rfchat
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Channel error: {message}")]
    Channel { message: String },

    #[error("Persistence error: {reason}")]
    Persistence { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a channel error (an internal queue was closed)
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(reason: impl ToString) -> Self {
        Self::Persistence {
            reason: reason.to_string(),
        }
    }
}

/// Result type for rfchat operations
pub type ChatResult<T> = core::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_converts_into_chat_error() {
        let err: ChatError = TransportError::connect_failed("AA:BB", "refused").into();
        assert!(matches!(err, ChatError::Transport(TransportError::ConnectFailed { .. })));
        assert_eq!(
            err.to_string(),
            "Transport error: Connection failed to peer AA:BB: refused"
        );
    }

    #[test]
    fn test_io_error_wraps_into_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = TransportError::from(io);
        assert!(err.to_string().contains("reset"));
    }
}
