//! Service handshake for TCP streams
//!
//! A TCP port carries no service identity of its own, so both ends open a
//! fresh stream by exchanging one `Hello`:
//!
//! ```text
//! +----------------+---------------------------+
//! | length: u32 BE | bincode(Hello)            |
//! +----------------+---------------------------+
//! ```
//!
//! Each side writes its hello before reading the peer's. Chat bytes start
//! immediately after.

use std::time::Duration;

use rfchat_core::{RemoteDevice, ServiceRecord, TransportError};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::TcpTransportError;

/// Leading constant of every hello ("RFCH")
pub const HELLO_MAGIC: u32 = 0x5246_4348;

/// Largest encoded hello accepted from a peer
pub const MAX_HELLO_SIZE: usize = 4096;

// ----------------------------------------------------------------------------
// Hello
// ----------------------------------------------------------------------------

/// First frame on every stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub magic: u32,
    pub service_uuid: Uuid,
    pub service_name: String,
    /// Address the sender can be reached at
    pub address: String,
    pub display_name: String,
}

impl Hello {
    pub fn new(
        record: &ServiceRecord,
        address: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            magic: HELLO_MAGIC,
            service_uuid: record.uuid,
            service_name: record.name.clone(),
            address: address.into(),
            display_name: display_name.into(),
        }
    }

    /// Check that the peer speaks the same service
    pub fn verify(&self, record: &ServiceRecord) -> Result<(), TransportError> {
        if self.magic != HELLO_MAGIC {
            return Err(TcpTransportError::BadMagic(self.magic).into());
        }
        if self.service_uuid != record.uuid || self.service_name != record.name {
            return Err(TransportError::ServiceMismatch {
                expected: format!("{} ({})", record.name, record.uuid),
                actual: format!("{} ({})", self.service_name, self.service_uuid),
            });
        }
        Ok(())
    }

    /// The sender as a remote device; `fallback` is used when it announced
    /// no address
    pub fn remote_device(&self, fallback: &str) -> RemoteDevice {
        let address = if self.address.is_empty() {
            fallback.to_string()
        } else {
            self.address.clone()
        };
        if self.display_name.is_empty() {
            RemoteDevice::unnamed(address)
        } else {
            RemoteDevice::new(address, self.display_name.clone())
        }
    }

    /// The peer we dialed, named as it announced itself
    ///
    /// The dialed address stays the identity; only an empty announced name
    /// keeps the dialed device's own name.
    pub fn dialed_device(&self, dialed: &RemoteDevice) -> RemoteDevice {
        if self.display_name.is_empty() {
            dialed.clone()
        } else {
            RemoteDevice::new(dialed.address.clone(), self.display_name.clone())
        }
    }
}

// ----------------------------------------------------------------------------
// Wire Encoding
// ----------------------------------------------------------------------------

/// Write one length-prefixed hello
pub async fn write_hello<W>(writer: &mut W, hello: &Hello) -> Result<(), TcpTransportError>
where
    W: AsyncWrite + Unpin,
{
    let body = bincode::serialize(hello)?;
    if body.len() > MAX_HELLO_SIZE {
        return Err(TcpTransportError::HelloTooLarge {
            size: body.len(),
            max_size: MAX_HELLO_SIZE,
        });
    }
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed hello
pub async fn read_hello<R>(reader: &mut R) -> Result<Hello, TcpTransportError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_HELLO_SIZE {
        return Err(TcpTransportError::HelloTooLarge {
            size: len,
            max_size: MAX_HELLO_SIZE,
        });
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(bincode::deserialize(&body)?)
}

/// Exchange hellos and verify the peer's against `record`
pub async fn handshake<S>(
    stream: &mut S,
    local: &Hello,
    record: &ServiceRecord,
    timeout: Duration,
) -> Result<Hello, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let exchange = async {
        write_hello(stream, local).await?;
        read_hello(stream).await
    };
    let remote = tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| TcpTransportError::HandshakeTimeout)??;
    remote.verify(record)?;
    Ok(remote)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ServiceRecord {
        ServiceRecord::default()
    }

    #[tokio::test]
    async fn test_handshake_between_matching_peers() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let record = record();
        let hello_a = Hello::new(&record, "10.0.0.1:7373", "Alice");
        let hello_b = Hello::new(&record, "10.0.0.2:7373", "Bob");
        let timeout = Duration::from_secs(1);

        let (seen_by_a, seen_by_b) = tokio::join!(
            handshake(&mut a, &hello_a, &record, timeout),
            handshake(&mut b, &hello_b, &record, timeout),
        );

        assert_eq!(seen_by_a.unwrap(), hello_b);
        assert_eq!(seen_by_b.unwrap(), hello_a);
    }

    #[tokio::test]
    async fn test_service_mismatch_detected() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let other = ServiceRecord {
            name: "OtherChat".to_string(),
            uuid: Uuid::from_u128(1),
        };
        let record = record();
        let hello_a = Hello::new(&record, "a", "A");
        let hello_b = Hello::new(&other, "b", "B");
        let timeout = Duration::from_secs(1);

        let (result, _) = tokio::join!(
            handshake(&mut a, &hello_a, &record, timeout),
            handshake(&mut b, &hello_b, &other, timeout),
        );

        assert!(matches!(result, Err(TransportError::ServiceMismatch { .. })));
    }

    #[tokio::test]
    async fn test_oversized_hello_rejected() {
        let mut stream = tokio_test::io::Builder::new()
            .read(&(MAX_HELLO_SIZE as u32 + 1).to_be_bytes())
            .build();
        assert!(matches!(
            read_hello(&mut stream).await,
            Err(TcpTransportError::HelloTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let (mut a, _b) = tokio::io::duplex(1024);
        let hello = Hello::new(&record(), "a", "A");
        let result = handshake(&mut a, &hello, &record(), Duration::from_millis(50)).await;
        assert!(matches!(result, Err(TransportError::Handshake { .. })));
    }

    #[test]
    fn test_remote_device_falls_back_to_socket_address() {
        let hello = Hello::new(&record(), "", "");
        let device = hello.remote_device("192.168.1.5:40000");
        assert_eq!(device.address, "192.168.1.5:40000");
        assert_eq!(device.display_name, "192.168.1.5:40000");
    }

    #[test]
    fn test_dialed_device_takes_announced_name() {
        let dialed = RemoteDevice::unnamed("10.0.0.2:7373");

        let named = Hello::new(&record(), "", "Bob").dialed_device(&dialed);
        assert_eq!(named.address, "10.0.0.2:7373");
        assert_eq!(named.display_name, "Bob");

        let anonymous = Hello::new(&record(), "", "").dialed_device(&dialed);
        assert_eq!(anonymous.display_name, "10.0.0.2:7373");
    }
}
