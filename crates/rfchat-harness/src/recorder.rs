//! Recording listeners and collaborators
//!
//! Everything the runtime hands to the outside world ends up here, in the
//! order it was delivered, so tests can assert on exact sequences.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rfchat_core::{
    ChatError, ChatMessage, ChatResult, ConnectionListener, ConnectionState, Conversation,
    MessageListener, NotificationSink, PersistenceGateway, RemoteDevice,
};
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};

/// How long helpers wait before declaring an expectation failed
pub const DEFAULT_WAIT: Duration = Duration::from_secs(2);

// ----------------------------------------------------------------------------
// Event Recorder
// ----------------------------------------------------------------------------

/// One listener callback, with peers reduced to their address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Connecting,
    ConnectedIn(String),
    ConnectedOut(String),
    Disconnected,
    ConnectionFailed,
    ConnectionLost,
    Sent(String),
    Received(String),
}

/// Connection and message listener that forwards every callback to a stream
pub struct EventRecorder {
    sender: mpsc::UnboundedSender<RecordedEvent>,
}

impl EventRecorder {
    pub fn new() -> (Arc<Self>, EventStream) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), EventStream { receiver })
    }

    fn record(&self, event: RecordedEvent) {
        let _ = self.sender.send(event);
    }
}

impl ConnectionListener for EventRecorder {
    fn on_connecting(&self) {
        self.record(RecordedEvent::Connecting);
    }

    fn on_connected_in(&self, peer: &RemoteDevice) {
        self.record(RecordedEvent::ConnectedIn(peer.address.clone()));
    }

    fn on_connected_out(&self, peer: &RemoteDevice) {
        self.record(RecordedEvent::ConnectedOut(peer.address.clone()));
    }

    fn on_disconnected(&self) {
        self.record(RecordedEvent::Disconnected);
    }

    fn on_connection_failed(&self) {
        self.record(RecordedEvent::ConnectionFailed);
    }

    fn on_connection_lost(&self) {
        self.record(RecordedEvent::ConnectionLost);
    }
}

impl MessageListener for EventRecorder {
    fn on_message_sent(&self, message: &ChatMessage) {
        self.record(RecordedEvent::Sent(message.text.clone()));
    }

    fn on_message_received(&self, message: &ChatMessage) {
        self.record(RecordedEvent::Received(message.text.clone()));
    }
}

/// Receiving side of an `EventRecorder`
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<RecordedEvent>,
}

impl EventStream {
    /// Next recorded event; panics if none arrives within `DEFAULT_WAIT`
    pub async fn next(&mut self) -> RecordedEvent {
        match timeout(DEFAULT_WAIT, self.receiver.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => panic!("event recorder dropped"),
            Err(_) => panic!("no event within {:?}", DEFAULT_WAIT),
        }
    }

    /// Assert that nothing is delivered for `quiet`
    pub async fn expect_none(&mut self, quiet: Duration) {
        if let Ok(Some(event)) = timeout(quiet, self.receiver.recv()).await {
            panic!("unexpected event {:?}", event);
        }
    }

    /// Events already delivered, without waiting
    pub fn drain(&mut self) -> Vec<RecordedEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

// ----------------------------------------------------------------------------
// Recording Collaborators
// ----------------------------------------------------------------------------

/// Persistence gateway that keeps everything it is given
#[derive(Default)]
pub struct RecordingGateway {
    conversations: Mutex<Vec<Conversation>>,
    messages: Mutex<Vec<ChatMessage>>,
    failing: Mutex<bool>,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following insert fail
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        lock(&self.conversations).clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.messages).clone()
    }

    fn check(&self) -> ChatResult<()> {
        if *lock(&self.failing) {
            return Err(ChatError::persistence("recording gateway set to fail"));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for RecordingGateway {
    async fn insert_conversation(&self, conversation: Conversation) -> ChatResult<()> {
        self.check()?;
        lock(&self.conversations).push(conversation);
        Ok(())
    }

    async fn insert_message(&self, message: ChatMessage) -> ChatResult<()> {
        self.check()?;
        lock(&self.messages).push(message);
        Ok(())
    }
}

/// Notification sink that keeps every status shown
#[derive(Default)]
pub struct RecordingNotifier {
    statuses: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn statuses(&self) -> Vec<String> {
        lock(&self.statuses).clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn show(&self, status: &str) {
        lock(&self.statuses).push(status.to_string());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ----------------------------------------------------------------------------
// Waiting Helpers
// ----------------------------------------------------------------------------

/// Wait until `state` is published; panics after `DEFAULT_WAIT`
pub async fn wait_for_state(states: &mut watch::Receiver<ConnectionState>, state: ConnectionState) {
    let reached = timeout(DEFAULT_WAIT, states.wait_for(|current| *current == state))
        .await
        .map(|result| result.is_ok());
    match reached {
        Ok(true) => {}
        Ok(false) => panic!("service dropped while waiting for {}", state),
        Err(_) => panic!("state {} not reached, still {}", state, *states.borrow()),
    }
}

/// Poll `condition` until it holds; panics after `DEFAULT_WAIT`
pub async fn eventually<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let polled = timeout(DEFAULT_WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    if polled.is_err() {
        panic!("condition not met within {:?}: {}", DEFAULT_WAIT, what);
    }
}
