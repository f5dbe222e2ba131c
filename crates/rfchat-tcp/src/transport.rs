//! TCP socket provider implementation

use std::net::SocketAddr;

use async_trait::async_trait;
use rfchat_core::{
    BoxChannel, BoxServerSocket, RemoteDevice, ServerSocket, ServiceRecord, SocketProvider,
    TransportError,
};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::config::TcpTransportConfig;
use crate::protocol::{handshake, Hello};

// ----------------------------------------------------------------------------
// Socket Provider
// ----------------------------------------------------------------------------

/// Socket provider over plain TCP
///
/// Peers are addressed by `host:port`. Every stream starts with a hello
/// exchange, so only nodes configured with the same service record can
/// connect to each other.
#[derive(Debug, Clone)]
pub struct TcpSocketProvider {
    config: TcpTransportConfig,
}

impl TcpSocketProvider {
    pub fn new(config: TcpTransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TcpTransportConfig {
        &self.config
    }

    fn local_hello(&self, record: &ServiceRecord, address: String) -> Hello {
        Hello::new(record, address, self.config.display_name.clone())
    }

    /// Bind a listener for `record`
    pub async fn bind(&self, record: &ServiceRecord) -> Result<TcpServerSocket, TransportError> {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| TransportError::Bind {
                service: record.name.clone(),
                reason: format!("{}: {}", self.config.bind_addr, e),
            })?;
        let local_addr = listener.local_addr()?;

        // With port 0 the real port is only known after binding
        let advertised = match &self.config.advertised_addr {
            Some(addr) => addr.clone(),
            None => local_addr.to_string(),
        };

        info!("Listening for {} on {}", record.name, local_addr);
        Ok(TcpServerSocket {
            listener,
            local_addr,
            record: record.clone(),
            hello: self.local_hello(record, advertised),
            handshake_timeout: self.config.handshake_timeout(),
        })
    }
}

#[async_trait]
impl SocketProvider for TcpSocketProvider {
    async fn listen(&self, record: &ServiceRecord) -> Result<BoxServerSocket, TransportError> {
        Ok(Box::new(self.bind(record).await?))
    }

    async fn connect(
        &self,
        peer: &RemoteDevice,
        record: &ServiceRecord,
    ) -> Result<(BoxChannel, RemoteDevice), TransportError> {
        debug!("Dialing {}", peer.address);
        let mut stream = TcpStream::connect(&peer.address)
            .await
            .map_err(|e| TransportError::connect_failed(&peer.address, e))?;
        stream.set_nodelay(true)?;

        // Without an advertised address the listener identifies us by the
        // socket address it observes
        let address = self.config.advertised_addr.clone().unwrap_or_default();
        let hello = self.local_hello(record, address);
        let remote = handshake(
            &mut stream,
            &hello,
            record,
            self.config.handshake_timeout(),
        )
        .await?;
        debug!(
            "Handshake with {} complete ({})",
            peer.address, remote.display_name
        );

        Ok((Box::new(stream), remote.dialed_device(peer)))
    }
}

// ----------------------------------------------------------------------------
// Server Socket
// ----------------------------------------------------------------------------

/// Bound TCP listener for one service
pub struct TcpServerSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
    record: ServiceRecord,
    hello: Hello,
    handshake_timeout: std::time::Duration,
}

impl TcpServerSocket {
    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl ServerSocket for TcpServerSocket {
    async fn accept(&mut self) -> Result<(BoxChannel, RemoteDevice), TransportError> {
        loop {
            let (mut stream, addr) = self.listener.accept().await?;
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Could not disable Nagle on {}: {}", addr, e);
            }

            match handshake(&mut stream, &self.hello, &self.record, self.handshake_timeout).await {
                Ok(remote) => {
                    let peer = remote.remote_device(&addr.to_string());
                    debug!("Accepted {} from {}", peer, addr);
                    return Ok((Box::new(stream), peer));
                }
                Err(e) => {
                    warn!("Rejected stream from {}: {}", addr, e);
                }
            }
        }
    }
}
