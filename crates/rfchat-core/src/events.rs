//! Listener, collaborator and channel message types
//!
//! Two queues leave the connection runtime:
//!
//! - `DispatchEvent`: runtime → registered listeners (connection lifecycle and
//!   messages), delivered in order on one task
//! - `Effect`: runtime → external collaborators (persistence, notification),
//!   fire-and-forget

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ChatResult;
use crate::message::{ChatMessage, Conversation};
use crate::types::RemoteDevice;

// ----------------------------------------------------------------------------
// Listeners
// ----------------------------------------------------------------------------

/// Receives connection lifecycle notifications
pub trait ConnectionListener: Send + Sync {
    fn on_connecting(&self);
    fn on_connected_in(&self, peer: &RemoteDevice);
    fn on_connected_out(&self, peer: &RemoteDevice);
    fn on_disconnected(&self);
    fn on_connection_failed(&self);
    fn on_connection_lost(&self);
}

/// Receives sent and received chat messages
pub trait MessageListener: Send + Sync {
    fn on_message_sent(&self, message: &ChatMessage);
    fn on_message_received(&self, message: &ChatMessage);
}

// ----------------------------------------------------------------------------
// Dispatch Events: Runtime → Listeners
// ----------------------------------------------------------------------------

/// Connection lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connecting,
    ConnectedIn(RemoteDevice),
    ConnectedOut(RemoteDevice),
    Disconnected,
    ConnectionFailed,
    ConnectionLost,
}

impl ConnectionEvent {
    /// Invoke the matching listener callback
    pub fn deliver(&self, listener: &dyn ConnectionListener) {
        match self {
            ConnectionEvent::Connecting => listener.on_connecting(),
            ConnectionEvent::ConnectedIn(peer) => listener.on_connected_in(peer),
            ConnectionEvent::ConnectedOut(peer) => listener.on_connected_out(peer),
            ConnectionEvent::Disconnected => listener.on_disconnected(),
            ConnectionEvent::ConnectionFailed => listener.on_connection_failed(),
            ConnectionEvent::ConnectionLost => listener.on_connection_lost(),
        }
    }
}

/// Message event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEvent {
    Sent(ChatMessage),
    Received(ChatMessage),
}

impl MessageEvent {
    /// Invoke the matching listener callback
    pub fn deliver(&self, listener: &dyn MessageListener) {
        match self {
            MessageEvent::Sent(message) => listener.on_message_sent(message),
            MessageEvent::Received(message) => listener.on_message_received(message),
        }
    }
}

/// Everything the dispatcher task consumes
///
/// Listener registration travels through the same queue as events, so a
/// replacement takes effect exactly between two deliveries.
pub enum DispatchEvent {
    Connection(ConnectionEvent),
    Message(MessageEvent),
    SetConnectionListener(Option<Arc<dyn ConnectionListener>>),
    SetMessageListener(Option<Arc<dyn MessageListener>>),
}

impl fmt::Debug for DispatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchEvent::Connection(event) => f.debug_tuple("Connection").field(event).finish(),
            DispatchEvent::Message(event) => f.debug_tuple("Message").field(event).finish(),
            DispatchEvent::SetConnectionListener(listener) => f
                .debug_tuple("SetConnectionListener")
                .field(&listener.is_some())
                .finish(),
            DispatchEvent::SetMessageListener(listener) => f
                .debug_tuple("SetMessageListener")
                .field(&listener.is_some())
                .finish(),
        }
    }
}

// ----------------------------------------------------------------------------
// Effects: Runtime → External Collaborators
// ----------------------------------------------------------------------------

/// Side effect requested from an external collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Record a newly established conversation
    InsertConversation(Conversation),
    /// Record a sent or received message
    InsertMessage(ChatMessage),
    /// Show the current link status to the user
    ShowNotification(String),
}

/// Stores conversations and messages
///
/// Errors are logged by the runtime and never reach the connection core.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn insert_conversation(&self, conversation: Conversation) -> ChatResult<()>;
    async fn insert_message(&self, message: ChatMessage) -> ChatResult<()>;
}

/// Displays the current link status
pub trait NotificationSink: Send + Sync {
    fn show(&self, status: &str);
}

/// Gateway that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpPersistence;

#[async_trait]
impl PersistenceGateway for NoOpPersistence {
    async fn insert_conversation(&self, _conversation: Conversation) -> ChatResult<()> {
        Ok(())
    }

    async fn insert_message(&self, _message: ChatMessage) -> ChatResult<()> {
        Ok(())
    }
}

/// Notification sink that shows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifications;

impl NotificationSink for NoOpNotifications {
    fn show(&self, _status: &str) {}
}
