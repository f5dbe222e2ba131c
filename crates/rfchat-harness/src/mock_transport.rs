//! Mock Transport for Testing
//!
//! Deterministic in-memory `SocketProvider`. Inbound peers are injected with
//! `incoming`, outbound attempts follow per-address `ConnectPlan`s, and every
//! established channel is one end of a `tokio::io::duplex` pair whose other
//! end is handed to the test.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use async_trait::async_trait;
use rfchat_core::{
    BoxChannel, BoxServerSocket, RemoteDevice, ServerSocket, ServiceRecord, SocketProvider,
    TransportError,
};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Buffer size of every in-memory channel
pub const DUPLEX_BUFFER_SIZE: usize = 64 * 1024;

type Established = Result<(BoxChannel, RemoteDevice), TransportError>;

// ----------------------------------------------------------------------------
// Connect Plans
// ----------------------------------------------------------------------------

/// Scripted outcome of one outbound attempt
#[derive(Debug)]
pub enum ConnectPlan {
    /// Connect immediately
    Succeed,
    /// Fail immediately with `reason`
    Fail(String),
    /// Never complete; only cancellation ends the attempt
    Hang,
    /// Connect once the gate fires; fail if the sender is dropped
    Gated(oneshot::Receiver<()>),
    /// Connect, but every write on the local end fails
    ReadOnly,
}

// ----------------------------------------------------------------------------
// Mock Socket Provider
// ----------------------------------------------------------------------------

#[derive(Default)]
struct MockState {
    listener: Option<(u64, mpsc::UnboundedSender<Established>)>,
    next_generation: u64,
    plans: HashMap<String, VecDeque<ConnectPlan>>,
    fail_listen: Option<String>,
}

/// In-memory socket provider
pub struct MockSocketProvider {
    state: Arc<Mutex<MockState>>,
    outbound_tx: mpsc::UnboundedSender<(RemoteDevice, DuplexStream)>,
    outbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(RemoteDevice, DuplexStream)>>,
    listen_count: AtomicUsize,
    connect_count: AtomicUsize,
}

impl MockSocketProvider {
    pub fn new() -> Arc<Self> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            state: Arc::new(Mutex::new(MockState::default())),
            outbound_tx,
            outbound_rx: tokio::sync::Mutex::new(outbound_rx),
            listen_count: AtomicUsize::new(0),
            connect_count: AtomicUsize::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        lock_state(&self.state)
    }

    /// Simulate a peer connecting to the bound listener
    ///
    /// Returns the peer's end of the channel, or `ConnectFailed` when nothing
    /// is listening.
    pub fn incoming(&self, peer: RemoteDevice) -> Result<DuplexStream, TransportError> {
        let state = self.lock();
        let Some((_, sender)) = &state.listener else {
            return Err(TransportError::connect_failed(&peer.address, "not listening"));
        };

        let (local, remote) = tokio::io::duplex(DUPLEX_BUFFER_SIZE);
        let local: BoxChannel = Box::new(local);
        sender
            .send(Ok((local, peer.clone())))
            .map_err(|_| TransportError::connect_failed(&peer.address, "listener closed"))?;
        debug!("Mock inbound connection from {}", peer);
        Ok(remote)
    }

    /// Make the bound listener's pending accept fail with `reason`
    pub fn fail_accept(&self, reason: &str) -> bool {
        let state = self.lock();
        match &state.listener {
            Some((_, sender)) => sender
                .send(Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    reason.to_string(),
                ))))
                .is_ok(),
            None => false,
        }
    }

    /// Queue the outcome of the next outbound attempt to `address`
    ///
    /// Attempts without a queued plan succeed.
    pub fn plan_connect(&self, address: &str, plan: ConnectPlan) {
        self.lock()
            .plans
            .entry(address.to_string())
            .or_default()
            .push_back(plan);
    }

    /// Make every following `listen` call fail with `reason`; `None` restores
    pub fn set_listen_failure(&self, reason: Option<&str>) {
        self.lock().fail_listen = reason.map(str::to_string);
    }

    /// Remote end of the next successful outbound connection
    pub async fn next_outbound(&self) -> Option<(RemoteDevice, DuplexStream)> {
        self.outbound_rx.lock().await.recv().await
    }

    /// Whether a listener is currently bound
    pub fn is_listening(&self) -> bool {
        self.lock().listener.is_some()
    }

    /// Number of successful `listen` calls so far
    pub fn listen_count(&self) -> usize {
        self.listen_count.load(Ordering::SeqCst)
    }

    /// Number of `connect` calls so far
    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    fn establish_outbound(&self, peer: &RemoteDevice, writable: bool) -> Established {
        let (local, remote) = tokio::io::duplex(DUPLEX_BUFFER_SIZE);
        self.outbound_tx
            .send((peer.clone(), remote))
            .map_err(|_| TransportError::connect_failed(&peer.address, "harness dropped"))?;
        debug!("Mock outbound connection to {}", peer);
        let channel: BoxChannel = if writable {
            Box::new(local)
        } else {
            Box::new(ReadOnlyChannel(local))
        };
        Ok((channel, peer.clone()))
    }
}

#[async_trait]
impl SocketProvider for MockSocketProvider {
    async fn listen(&self, record: &ServiceRecord) -> Result<BoxServerSocket, TransportError> {
        let mut state = self.lock();
        if let Some(reason) = &state.fail_listen {
            return Err(TransportError::Bind {
                service: record.name.clone(),
                reason: reason.clone(),
            });
        }
        if state.listener.is_some() {
            return Err(TransportError::Bind {
                service: record.name.clone(),
                reason: "already listening".to_string(),
            });
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        state.next_generation += 1;
        let generation = state.next_generation;
        state.listener = Some((generation, sender));
        self.listen_count.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockServerSocket {
            generation,
            receiver,
            state: self.state.clone(),
        }))
    }

    async fn connect(
        &self,
        peer: &RemoteDevice,
        _record: &ServiceRecord,
    ) -> Established {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        let plan = self
            .lock()
            .plans
            .get_mut(&peer.address)
            .and_then(VecDeque::pop_front)
            .unwrap_or(ConnectPlan::Succeed);

        match plan {
            ConnectPlan::Succeed => self.establish_outbound(peer, true),
            ConnectPlan::ReadOnly => self.establish_outbound(peer, false),
            ConnectPlan::Fail(reason) => Err(TransportError::connect_failed(&peer.address, reason)),
            ConnectPlan::Hang => std::future::pending().await,
            ConnectPlan::Gated(gate) => match gate.await {
                Ok(()) => self.establish_outbound(peer, true),
                Err(_) => Err(TransportError::connect_failed(&peer.address, "gate dropped")),
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Read-only Channel
// ----------------------------------------------------------------------------

/// Channel whose reads work and whose writes fail with `BrokenPipe`
struct ReadOnlyChannel(DuplexStream);

impl AsyncRead for ReadOnlyChannel {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl AsyncWrite for ReadOnlyChannel {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "write side closed",
        )))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}

// ----------------------------------------------------------------------------
// Mock Server Socket
// ----------------------------------------------------------------------------

struct MockServerSocket {
    generation: u64,
    receiver: mpsc::UnboundedReceiver<Established>,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl ServerSocket for MockServerSocket {
    async fn accept(&mut self) -> Result<(BoxChannel, RemoteDevice), TransportError> {
        self.receiver.recv().await.unwrap_or(Err(TransportError::Closed))
    }
}

impl Drop for MockServerSocket {
    fn drop(&mut self) {
        let mut state = lock_state(&self.state);
        if state.listener.as_ref().map(|(generation, _)| *generation) == Some(self.generation) {
            state.listener = None;
        }
    }
}

fn lock_state(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    // Poisoning is ignored; the guarded state stays consistent
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_incoming_requires_listener() {
        let provider = MockSocketProvider::new();
        let peer = RemoteDevice::new("AA:BB", "Alice");
        assert!(provider.incoming(peer.clone()).is_err());

        let mut listener = provider.listen(&ServiceRecord::default()).await.unwrap();
        assert!(provider.is_listening());
        let mut remote = provider.incoming(peer.clone()).unwrap();

        let (mut channel, accepted) = listener.accept().await.unwrap();
        assert_eq!(accepted, peer);
        remote.write_all(b"hi").await.unwrap();
        let mut buf = [0u8; 2];
        channel.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");

        drop(listener);
        assert!(!provider.is_listening());
    }

    #[tokio::test]
    async fn test_connect_follows_plans_in_order() {
        let provider = MockSocketProvider::new();
        let peer = RemoteDevice::unnamed("CC:DD");
        let record = ServiceRecord::default();
        provider.plan_connect("CC:DD", ConnectPlan::Fail("refused".to_string()));

        assert!(provider.connect(&peer, &record).await.is_err());
        let (_channel, connected) = provider.connect(&peer, &record).await.unwrap();
        assert_eq!(connected, peer);
        let (remote_peer, _remote) = provider.next_outbound().await.unwrap();
        assert_eq!(remote_peer, peer);
        assert_eq!(provider.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_read_only_channel_rejects_writes() {
        let provider = MockSocketProvider::new();
        let peer = RemoteDevice::unnamed("EE:FF");
        provider.plan_connect("EE:FF", ConnectPlan::ReadOnly);

        let (mut channel, _) = provider
            .connect(&peer, &ServiceRecord::default())
            .await
            .unwrap();
        let (_, mut remote) = provider.next_outbound().await.unwrap();

        let err = channel.write_all(b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        remote.write_all(b"in").await.unwrap();
        let mut buf = [0u8; 2];
        channel.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"in");
    }

    #[tokio::test]
    async fn test_second_listener_rejected() {
        let provider = MockSocketProvider::new();
        let record = ServiceRecord::default();
        let _first = provider.listen(&record).await.unwrap();
        assert!(matches!(
            provider.listen(&record).await,
            Err(TransportError::Bind { .. })
        ));
    }
}
