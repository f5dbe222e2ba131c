//! Connection State Machine
//!
//! `ConnectionService` owns the single chat link. Every state-changing
//! operation, whether requested by a caller or reported by a worker, runs
//! under one mutex, so at most one transition is in flight and the set of
//! registered workers always matches the current state:
//!
//! - `Listening`: accept worker
//! - `Connecting`: connect worker, plus the accept worker if an inbound peer
//!   may still win the race
//! - `Connected`: connected worker
//! - `NotConnected`: none
//!
//! Transitions never wait for a worker to exit. They drop its registration,
//! which fires its cancellation token; a worker that still completes later
//! fails the registered-id check and is discarded silently. The one wait is
//! before binding: a fresh listener is only requested once the previous
//! accept worker has closed its own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use rfchat_core::{
    BoxChannel, BoxServerSocket, ChatMessage, ChatResult, ConnectionEvent, ConnectionListener,
    ConnectionState, ConnectionType, Conversation, Effect, LinkConfig, MessageEvent,
    MessageListener, RemoteDevice, SocketProvider, TransportError, WorkerId, WorkerKind,
};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::dispatcher::EventDispatcher;
use crate::effects::EffectQueue;
use crate::framing::{split_channel, FrameReader, FrameWriter};
use crate::workers::{
    accept, connect, connected, ListenerRelease, OwnedListener, WorkerHandle,
};

/// Status shown when the service starts listening
pub const READY_STATUS: &str = "Ready to connect";

/// Prefix of the status shown once a peer is connected
pub const CONNECTED_STATUS_PREFIX: &str = "Connected to ";

// ----------------------------------------------------------------------------
// Public Handle
// ----------------------------------------------------------------------------

/// Handle to the connection core
///
/// Cheap to clone; all clones drive the same link. When the last handle is
/// dropped every worker is cancelled and the background tasks exit.
#[derive(Clone)]
pub struct ConnectionService {
    inner: Arc<ServiceInner>,
}

impl ConnectionService {
    pub(crate) fn new(
        provider: Arc<dyn SocketProvider>,
        config: LinkConfig,
        dispatcher: EventDispatcher,
        effects: EffectQueue,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::NotConnected);
        let inner = Arc::new_cyclic(|weak_self| ServiceInner {
            provider,
            config,
            link: Mutex::new(LinkCore::default()),
            state_tx,
            dispatcher,
            effects,
            next_worker: AtomicU64::new(1),
            weak_self: weak_self.clone(),
        });
        Self { inner }
    }

    /// Start (or keep) accepting an inbound peer
    ///
    /// Cancels any outbound attempt or established link. Idempotent while a
    /// listener is bound. A bind failure leaves the service `NotConnected`
    /// and is returned here; no listener event reports it.
    pub async fn start_listening(&self) -> ChatResult<()> {
        let mut link = self.inner.link.lock().await;
        self.inner.start_listening_locked(&mut link).await
    }

    /// Connect to `peer`, superseding any attempt in flight
    ///
    /// An already bound listener stays up; whichever side completes first
    /// becomes the link.
    pub async fn connect(&self, peer: RemoteDevice) {
        self.inner.connect(peer).await
    }

    /// Tear everything down and stay `NotConnected`
    pub async fn stop(&self) {
        self.inner.stop().await
    }

    /// Write `text` to the connected peer
    ///
    /// Does nothing unless `Connected`. The write is attempted once; a
    /// failure is logged and not reported to the caller.
    pub async fn send(&self, text: &str) {
        self.inner.send(text).await
    }

    /// Whether a peer is currently connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Watch every state transition
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// The connected peer, if any
    pub async fn peer(&self) -> Option<RemoteDevice> {
        let link = self.inner.link.lock().await;
        link.connected.as_ref().map(|active| active.peer.clone())
    }

    /// Kinds of the currently registered workers
    pub async fn active_workers(&self) -> Vec<WorkerKind> {
        let link = self.inner.link.lock().await;
        link.worker_kinds()
    }

    /// Replace the connection listener; `None` removes it
    pub fn set_connection_listener(&self, listener: Option<Arc<dyn ConnectionListener>>) {
        self.inner.dispatcher.set_connection_listener(listener);
    }

    /// Replace the message listener; `None` removes it
    pub fn set_message_listener(&self, listener: Option<Arc<dyn MessageListener>>) {
        self.inner.dispatcher.set_message_listener(listener);
    }

    /// Link configuration in use
    pub fn config(&self) -> &LinkConfig {
        &self.inner.config
    }
}

// ----------------------------------------------------------------------------
// Guarded State
// ----------------------------------------------------------------------------

/// Established link owned by the state machine
struct ActiveLink {
    worker: WorkerHandle,
    peer: RemoteDevice,
    writer: Arc<Mutex<FrameWriter>>,
}

/// Everything guarded by the service mutex
#[derive(Default)]
struct LinkCore {
    state: ConnectionState,
    accept: Option<WorkerHandle>,
    connect: Option<WorkerHandle>,
    connected: Option<ActiveLink>,
    /// Listener of a cancelled accept worker that may still be open
    closing_listener: Option<ListenerRelease>,
}

impl LinkCore {
    fn is_current(worker: &Option<WorkerHandle>, id: WorkerId) -> bool {
        worker.as_ref().map(WorkerHandle::id) == Some(id)
    }

    fn worker_kinds(&self) -> Vec<WorkerKind> {
        self.accept
            .iter()
            .chain(self.connect.iter())
            .chain(self.connected.iter().map(|active| &active.worker))
            .map(WorkerHandle::kind)
            .collect()
    }

    /// Cancel the outbound attempt and close the established link
    fn cancel_connections(&mut self) {
        if let Some(worker) = self.connect.take() {
            worker.cancel();
        }
        if let Some(active) = self.connected.take() {
            debug!("Closing link with {}", active.peer);
            active.worker.cancel();
        }
    }

    fn cancel_all(&mut self) {
        self.cancel_connections();
        if let Some(worker) = self.accept.take() {
            self.closing_listener = worker.cancel_listener();
        }
    }
}

// ----------------------------------------------------------------------------
// Service Internals
// ----------------------------------------------------------------------------

pub(crate) struct ServiceInner {
    provider: Arc<dyn SocketProvider>,
    config: LinkConfig,
    link: Mutex<LinkCore>,
    state_tx: watch::Sender<ConnectionState>,
    dispatcher: EventDispatcher,
    effects: EffectQueue,
    next_worker: AtomicU64,
    weak_self: Weak<ServiceInner>,
}

impl ServiceInner {
    // ------------------------------------------------------------------
    // Caller-initiated transitions
    // ------------------------------------------------------------------

    async fn start_listening_locked(&self, link: &mut LinkCore) -> ChatResult<()> {
        link.cancel_connections();

        if link.accept.is_none() {
            // The accept worker drops its listener before it ever takes this
            // lock, so waiting here cannot deadlock
            if let Some(release) = link.closing_listener.take() {
                debug!("Waiting for the previous listener to close");
                release.wait().await;
            }
            match self.provider.listen(&self.config.service).await {
                Ok(listener) => link.accept = Some(self.spawn_accept(listener)),
                Err(e) => {
                    error!("Could not listen for {}: {}", self.config.service.name, e);
                    self.set_state(link, ConnectionState::NotConnected);
                    return Err(e.into());
                }
            }
        }

        if link.state != ConnectionState::Listening {
            info!("Listening for inbound peers");
            self.set_state(link, ConnectionState::Listening);
            self.effects
                .post(Effect::ShowNotification(READY_STATUS.to_string()));
        }
        Ok(())
    }

    async fn connect(&self, peer: RemoteDevice) {
        let mut link = self.link.lock().await;
        info!("Connecting to {}", peer);

        link.cancel_connections();
        link.connect = Some(self.spawn_connect(peer));

        self.set_state(&mut link, ConnectionState::Connecting);
        self.dispatcher.connection(ConnectionEvent::Connecting);
    }

    async fn stop(&self) {
        let mut link = self.link.lock().await;
        info!("Stopping connection service");

        link.cancel_all();

        self.set_state(&mut link, ConnectionState::NotConnected);
        self.dispatcher.connection(ConnectionEvent::Disconnected);
    }

    async fn send(&self, text: &str) {
        let (writer, peer) = {
            let link = self.link.lock().await;
            match (&link.state, &link.connected) {
                (ConnectionState::Connected, Some(active)) => {
                    (active.writer.clone(), active.peer.clone())
                }
                _ => {
                    debug!("Not connected, message not sent");
                    return;
                }
            }
        };

        // The write happens outside the state lock so a stalled transport
        // cannot block transitions
        let result = writer.lock().await.write_message(text).await;
        match result {
            Ok(()) => {
                let message = ChatMessage::outgoing(&peer, text);
                self.effects.post(Effect::InsertMessage(message.clone()));
                self.dispatcher.message(MessageEvent::Sent(message));
            }
            Err(e) => warn!("Write to {} failed: {}", peer, e),
        }
    }

    // ------------------------------------------------------------------
    // Worker-reported transitions
    // ------------------------------------------------------------------

    /// Accept a ready channel from the accept or connect worker `worker`
    ///
    /// Returns `false` (and drops the channel) when `worker` is no longer the
    /// registered worker for its path: the other path already won, or the
    /// attempt was superseded or stopped.
    pub(crate) async fn on_socket_established(
        &self,
        worker: WorkerId,
        channel: BoxChannel,
        peer: RemoteDevice,
        kind: ConnectionType,
    ) -> bool {
        let mut link = self.link.lock().await;

        let current = match kind {
            ConnectionType::Incoming => LinkCore::is_current(&link.accept, worker),
            ConnectionType::Outgoing => LinkCore::is_current(&link.connect, worker),
        };
        if !current {
            debug!("Discarding {:?} channel from stale worker {}", kind, worker);
            return false;
        }

        // First success wins; the other path is abandoned
        link.cancel_all();

        let (reader, writer) = split_channel(channel, &self.config);
        link.connected = Some(ActiveLink {
            worker: self.spawn_connected(reader),
            peer: peer.clone(),
            writer: Arc::new(Mutex::new(writer)),
        });

        info!("Connected to {} ({:?})", peer, kind);
        self.set_state(&mut link, ConnectionState::Connected);
        self.dispatcher.connection(match kind {
            ConnectionType::Incoming => ConnectionEvent::ConnectedIn(peer.clone()),
            ConnectionType::Outgoing => ConnectionEvent::ConnectedOut(peer.clone()),
        });
        self.effects
            .post(Effect::InsertConversation(Conversation::from(&peer)));
        self.effects.post(Effect::ShowNotification(format!(
            "{}{}",
            CONNECTED_STATUS_PREFIX, peer.display_name
        )));
        true
    }

    /// The connect worker `worker` could not establish a channel
    pub(crate) async fn on_connection_failed(&self, worker: WorkerId, error: TransportError) {
        let mut link = self.link.lock().await;
        if !LinkCore::is_current(&link.connect, worker) {
            debug!("Ignoring failure of stale connect worker {}: {}", worker, error);
            return;
        }
        link.connect = None;

        warn!("Connection failed: {}", error);
        self.set_state(&mut link, ConnectionState::NotConnected);
        self.dispatcher.connection(ConnectionEvent::ConnectionFailed);

        if let Err(e) = self.start_listening_locked(&mut link).await {
            warn!("Could not resume listening after failed connect: {}", e);
        }
    }

    /// The connected worker `worker` saw its channel fail or close
    pub(crate) async fn on_connection_lost(&self, worker: WorkerId, error: TransportError) {
        let mut link = self.link.lock().await;
        let current = link
            .connected
            .as_ref()
            .is_some_and(|active| active.worker.id() == worker);
        if !current {
            debug!("Ignoring loss on stale connected worker {}: {}", worker, error);
            return;
        }
        if let Some(active) = link.connected.take() {
            warn!("Connection with {} lost: {}", active.peer, error);
        }

        self.set_state(&mut link, ConnectionState::NotConnected);
        self.dispatcher.connection(ConnectionEvent::ConnectionLost);

        if let Err(e) = self.start_listening_locked(&mut link).await {
            warn!("Could not resume listening after lost connection: {}", e);
        }
    }

    /// One message was read by the connected worker `worker`
    pub(crate) async fn on_message_received(&self, worker: WorkerId, text: String) {
        let link = self.link.lock().await;
        let Some(active) = link
            .connected
            .as_ref()
            .filter(|active| active.worker.id() == worker)
        else {
            debug!("Dropping message read by stale worker {}", worker);
            return;
        };

        let message = ChatMessage::incoming(&active.peer, text);
        self.effects.post(Effect::InsertMessage(message.clone()));
        self.dispatcher.message(MessageEvent::Received(message));
    }

    /// The accept worker `worker` exited on its own after an accept error
    pub(crate) async fn on_accept_stopped(&self, worker: WorkerId) {
        let mut link = self.link.lock().await;
        if LinkCore::is_current(&link.accept, worker) {
            link.accept = None;
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn next_worker_id(&self) -> WorkerId {
        WorkerId::new(self.next_worker.fetch_add(1, Ordering::Relaxed))
    }

    fn set_state(&self, link: &mut LinkCore, state: ConnectionState) {
        if link.state != state {
            debug!("State {} -> {}", link.state, state);
        }
        link.state = state;
        self.state_tx.send_replace(state);
    }

    fn spawn_accept(&self, socket: BoxServerSocket) -> WorkerHandle {
        let id = self.next_worker_id();
        let cancel = CancellationToken::new();
        let (listener, release) = OwnedListener::new(socket);
        tokio::spawn(
            accept::run(self.weak_self.clone(), id, cancel.clone(), listener)
                .instrument(info_span!("accept", worker = %id)),
        );
        WorkerHandle::new(id, WorkerKind::Accept, cancel).with_release(release)
    }

    fn spawn_connected(&self, reader: FrameReader) -> WorkerHandle {
        let id = self.next_worker_id();
        let cancel = CancellationToken::new();
        tokio::spawn(
            connected::run(self.weak_self.clone(), id, cancel.clone(), reader)
                .instrument(info_span!("connected", worker = %id)),
        );
        WorkerHandle::new(id, WorkerKind::Connected, cancel)
    }

    fn spawn_connect(&self, peer: RemoteDevice) -> WorkerHandle {
        let id = self.next_worker_id();
        let cancel = CancellationToken::new();
        tokio::spawn(
            connect::run(
                self.weak_self.clone(),
                self.provider.clone(),
                id,
                cancel.clone(),
                peer,
                self.config.service.clone(),
            )
            .instrument(info_span!("connect", worker = %id)),
        );
        WorkerHandle::new(id, WorkerKind::Connect, cancel)
    }
}
