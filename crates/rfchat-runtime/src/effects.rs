//! Effect Task
//!
//! Consumes the fire-and-forget side effects the connection core emits and
//! hands them to the external collaborators. Gateway failures are logged here
//! and never travel back into the state machine.

use std::sync::Arc;

use rfchat_core::{Effect, NotificationSink, PersistenceGateway};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Sending side of the effect queue
#[derive(Debug, Clone)]
pub struct EffectQueue {
    sender: mpsc::UnboundedSender<Effect>,
}

impl EffectQueue {
    /// Spawn the effect task and return its handle
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        persistence: Arc<dyn PersistenceGateway>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = EffectTask {
            receiver,
            persistence,
            notifications,
        };
        tokio::spawn(task.run());
        Self { sender }
    }

    /// Queue an effect
    pub fn post(&self, effect: Effect) {
        if let Err(e) = self.sender.send(effect) {
            debug!("Effect task stopped, dropping {:?}", e.0);
        }
    }
}

struct EffectTask {
    receiver: mpsc::UnboundedReceiver<Effect>,
    persistence: Arc<dyn PersistenceGateway>,
    notifications: Arc<dyn NotificationSink>,
}

impl EffectTask {
    async fn run(mut self) {
        debug!("Effect task starting");
        while let Some(effect) = self.receiver.recv().await {
            self.apply(effect).await;
        }
        debug!("Effect task stopped");
    }

    async fn apply(&self, effect: Effect) {
        match effect {
            Effect::InsertConversation(conversation) => {
                let peer = conversation.peer_address.clone();
                if let Err(e) = self.persistence.insert_conversation(conversation).await {
                    warn!("Failed to store conversation with {}: {}", peer, e);
                }
            }
            Effect::InsertMessage(message) => {
                let peer = message.peer_address.clone();
                if let Err(e) = self.persistence.insert_message(message).await {
                    warn!("Failed to store message for {}: {}", peer, e);
                }
            }
            Effect::ShowNotification(status) => self.notifications.show(&status),
        }
    }
}
