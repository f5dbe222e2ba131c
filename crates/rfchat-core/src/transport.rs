//! Socket provider abstraction
//!
//! The runtime never talks to a concrete transport. It asks a
//! [`SocketProvider`] to bind a listener or to open an outbound channel, and
//! treats the result as an opaque byte stream. Closing is done by dropping:
//! dropping a [`ServerSocket`] stops listening, dropping a channel (or both of
//! its halves) closes the link.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::ServiceRecord;
use crate::errors::TransportError;
use crate::types::RemoteDevice;

// ----------------------------------------------------------------------------
// Channel
// ----------------------------------------------------------------------------

/// An open bidirectional byte stream between two peers
pub trait ChatChannel: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> ChatChannel for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Owned, type-erased channel handed between workers
pub type BoxChannel = Box<dyn ChatChannel>;

// ----------------------------------------------------------------------------
// Listener and Provider
// ----------------------------------------------------------------------------

/// A bound listening endpoint
#[async_trait]
pub trait ServerSocket: Send {
    /// Wait for the next inbound peer
    ///
    /// Must be cancel-safe: the runtime drops the pending future when the
    /// accept worker is cancelled.
    async fn accept(&mut self) -> Result<(BoxChannel, RemoteDevice), TransportError>;
}

/// Owned, type-erased listener
pub type BoxServerSocket = Box<dyn ServerSocket>;

/// The underlying transport capability
#[async_trait]
pub trait SocketProvider: Send + Sync + 'static {
    /// Bind a fresh listener for `service`
    async fn listen(&self, service: &ServiceRecord) -> Result<BoxServerSocket, TransportError>;

    /// Open a channel to `peer` running `service`
    ///
    /// Returns the peer as the transport learned it: same address, with the
    /// display name filled in when the remote side announced one.
    async fn connect(
        &self,
        peer: &RemoteDevice,
        service: &ServiceRecord,
    ) -> Result<(BoxChannel, RemoteDevice), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_duplex_stream_is_a_chat_channel() {
        let (local, mut remote) = tokio::io::duplex(64);
        let mut channel: BoxChannel = Box::new(local);

        channel.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }
}
