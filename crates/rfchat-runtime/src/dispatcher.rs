//! Event Dispatcher
//!
//! A single task owns the listener slots and delivers every event posted by
//! the state machine and its workers. Callbacks therefore never overlap and
//! always run in posting order. Listener (re)registration is posted through
//! the same queue.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rfchat_core::{
    ConnectionEvent, ConnectionListener, DispatchEvent, MessageEvent, MessageListener,
};
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

// ----------------------------------------------------------------------------
// Dispatcher Handle
// ----------------------------------------------------------------------------

/// Sending side of the dispatcher queue
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: mpsc::UnboundedSender<DispatchEvent>,
}

impl EventDispatcher {
    /// Spawn the delivery task and return its handle
    ///
    /// Must be called from within a tokio runtime. The task ends once every
    /// handle has been dropped and the queue is drained.
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(DispatcherTask::new(receiver).run());
        Self { sender }
    }

    /// Queue a connection lifecycle event
    pub fn connection(&self, event: ConnectionEvent) {
        self.post(DispatchEvent::Connection(event));
    }

    /// Queue a message event
    pub fn message(&self, event: MessageEvent) {
        self.post(DispatchEvent::Message(event));
    }

    /// Replace the connection listener; `None` clears the slot
    pub fn set_connection_listener(&self, listener: Option<Arc<dyn ConnectionListener>>) {
        self.post(DispatchEvent::SetConnectionListener(listener));
    }

    /// Replace the message listener; `None` clears the slot
    pub fn set_message_listener(&self, listener: Option<Arc<dyn MessageListener>>) {
        self.post(DispatchEvent::SetMessageListener(listener));
    }

    fn post(&self, event: DispatchEvent) {
        if let Err(e) = self.sender.send(event) {
            debug!("Dispatcher stopped, dropping {:?}", e.0);
        }
    }
}

// ----------------------------------------------------------------------------
// Dispatcher Task
// ----------------------------------------------------------------------------

struct DispatcherTask {
    receiver: mpsc::UnboundedReceiver<DispatchEvent>,
    connection_listener: Option<Arc<dyn ConnectionListener>>,
    message_listener: Option<Arc<dyn MessageListener>>,
}

impl DispatcherTask {
    fn new(receiver: mpsc::UnboundedReceiver<DispatchEvent>) -> Self {
        Self {
            receiver,
            connection_listener: None,
            message_listener: None,
        }
    }

    async fn run(mut self) {
        debug!("Event dispatcher starting");
        while let Some(event) = self.receiver.recv().await {
            self.handle(event);
        }
        debug!("Event dispatcher stopped");
    }

    fn handle(&mut self, event: DispatchEvent) {
        trace!("Dispatching {:?}", event);
        match event {
            DispatchEvent::Connection(event) => {
                if let Some(listener) = &self.connection_listener {
                    guarded("connection", || event.deliver(listener.as_ref()));
                }
            }
            DispatchEvent::Message(event) => {
                if let Some(listener) = &self.message_listener {
                    guarded("message", || event.deliver(listener.as_ref()));
                }
            }
            DispatchEvent::SetConnectionListener(listener) => {
                self.connection_listener = listener;
            }
            DispatchEvent::SetMessageListener(listener) => {
                self.message_listener = listener;
            }
        }
    }
}

/// A panicking listener must not take the delivery task down with it
fn guarded(category: &str, deliver: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(deliver)).is_err() {
        error!("{} listener panicked; event dropped", category);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfchat_core::{ChatMessage, RemoteDevice};
    use std::time::Duration;
    use tokio::time::timeout;

    struct ChannelListener(mpsc::UnboundedSender<String>);

    impl ConnectionListener for ChannelListener {
        fn on_connecting(&self) {
            let _ = self.0.send("connecting".into());
        }
        fn on_connected_in(&self, peer: &RemoteDevice) {
            let _ = self.0.send(format!("in:{}", peer.address));
        }
        fn on_connected_out(&self, peer: &RemoteDevice) {
            let _ = self.0.send(format!("out:{}", peer.address));
        }
        fn on_disconnected(&self) {
            let _ = self.0.send("disconnected".into());
        }
        fn on_connection_failed(&self) {
            let _ = self.0.send("failed".into());
        }
        fn on_connection_lost(&self) {
            panic!("listener bug");
        }
    }

    impl MessageListener for ChannelListener {
        fn on_message_sent(&self, message: &ChatMessage) {
            let _ = self.0.send(format!("sent:{}", message.text));
        }
        fn on_message_received(&self, message: &ChatMessage) {
            let _ = self.0.send(format!("received:{}", message.text));
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event should be delivered within timeout")
            .expect("listener channel open")
    }

    #[tokio::test]
    async fn test_events_delivered_in_posting_order() {
        let dispatcher = EventDispatcher::spawn();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = Arc::new(ChannelListener(tx));
        let peer = RemoteDevice::new("AA:BB", "Alice");

        dispatcher.set_connection_listener(Some(listener.clone()));
        dispatcher.set_message_listener(Some(listener));
        dispatcher.connection(ConnectionEvent::Connecting);
        dispatcher.connection(ConnectionEvent::ConnectedOut(peer.clone()));
        dispatcher.message(MessageEvent::Received(ChatMessage::incoming(&peer, "one")));
        dispatcher.message(MessageEvent::Sent(ChatMessage::outgoing(&peer, "two")));

        assert_eq!(next(&mut rx).await, "connecting");
        assert_eq!(next(&mut rx).await, "out:AA:BB");
        assert_eq!(next(&mut rx).await, "received:one");
        assert_eq!(next(&mut rx).await, "sent:two");
    }

    #[tokio::test]
    async fn test_events_without_listener_are_dropped() {
        let dispatcher = EventDispatcher::spawn();
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatcher.connection(ConnectionEvent::Disconnected);
        dispatcher.set_connection_listener(Some(Arc::new(ChannelListener(tx))));
        dispatcher.connection(ConnectionEvent::ConnectionFailed);

        assert_eq!(next(&mut rx).await, "failed");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_replacing_listener_drops_previous() {
        let dispatcher = EventDispatcher::spawn();
        let (first_tx, mut first_rx) = mpsc::unbounded_channel();
        let (second_tx, mut second_rx) = mpsc::unbounded_channel();

        dispatcher.set_connection_listener(Some(Arc::new(ChannelListener(first_tx))));
        dispatcher.connection(ConnectionEvent::Connecting);
        dispatcher.set_connection_listener(Some(Arc::new(ChannelListener(second_tx))));
        dispatcher.connection(ConnectionEvent::Disconnected);

        assert_eq!(next(&mut first_rx).await, "connecting");
        assert_eq!(next(&mut second_rx).await, "disconnected");
        // The first listener was dropped with its sender
        assert!(first_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_panicking_listener_does_not_stop_delivery() {
        let dispatcher = EventDispatcher::spawn();
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatcher.set_connection_listener(Some(Arc::new(ChannelListener(tx))));
        dispatcher.connection(ConnectionEvent::ConnectionLost);
        dispatcher.connection(ConnectionEvent::Connecting);

        assert_eq!(next(&mut rx).await, "connecting");
    }
}
