//! Service Builder API
//!
//! Wires a `ConnectionService` to a socket provider, its collaborators and
//! any initial listeners, then spawns the dispatcher and effect tasks.

use std::sync::Arc;

use rfchat_core::{
    ChatError, ChatResult, ConnectionListener, LinkConfig, MessageListener, NoOpNotifications,
    NoOpPersistence, NotificationSink, PersistenceGateway, SocketProvider,
};
use tracing::info;

use crate::dispatcher::EventDispatcher;
use crate::effects::EffectQueue;
use crate::service::ConnectionService;

// ----------------------------------------------------------------------------
// Service Builder
// ----------------------------------------------------------------------------

/// Builder for a connection service
pub struct ServiceBuilder {
    provider: Arc<dyn SocketProvider>,
    config: LinkConfig,
    persistence: Arc<dyn PersistenceGateway>,
    notifications: Arc<dyn NotificationSink>,
    connection_listener: Option<Arc<dyn ConnectionListener>>,
    message_listener: Option<Arc<dyn MessageListener>>,
}

impl ServiceBuilder {
    /// Create a builder over `provider` with default configuration and no-op
    /// collaborators
    pub fn new(provider: Arc<dyn SocketProvider>) -> Self {
        Self {
            provider,
            config: LinkConfig::default(),
            persistence: Arc::new(NoOpPersistence),
            notifications: Arc::new(NoOpNotifications),
            connection_listener: None,
            message_listener: None,
        }
    }

    /// Set the link configuration
    pub fn with_config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the persistence gateway
    pub fn with_persistence(mut self, persistence: Arc<dyn PersistenceGateway>) -> Self {
        self.persistence = persistence;
        self
    }

    /// Set the notification sink
    pub fn with_notifications(mut self, notifications: Arc<dyn NotificationSink>) -> Self {
        self.notifications = notifications;
        self
    }

    /// Register a connection listener before the service starts
    pub fn with_connection_listener(mut self, listener: Arc<dyn ConnectionListener>) -> Self {
        self.connection_listener = Some(listener);
        self
    }

    /// Register a message listener before the service starts
    pub fn with_message_listener(mut self, listener: Arc<dyn MessageListener>) -> Self {
        self.message_listener = Some(listener);
        self
    }

    /// Validate the configuration and start the background tasks
    ///
    /// Must be called from within a tokio runtime. The service starts in
    /// `NotConnected`; call `start_listening` or `connect` to go further.
    pub fn build(self) -> ChatResult<ConnectionService> {
        self.config.validate()?;
        tokio::runtime::Handle::try_current()
            .map_err(|e| ChatError::channel(format!("cannot start service tasks: {}", e)))?;

        info!(
            "Building connection service for {} ({})",
            self.config.service.name, self.config.service.uuid
        );

        let dispatcher = EventDispatcher::spawn();
        if let Some(listener) = self.connection_listener {
            dispatcher.set_connection_listener(Some(listener));
        }
        if let Some(listener) = self.message_listener {
            dispatcher.set_message_listener(Some(listener));
        }
        let effects = EffectQueue::spawn(self.persistence, self.notifications);

        Ok(ConnectionService::new(
            self.provider,
            self.config,
            dispatcher,
            effects,
        ))
    }
}

impl ConnectionService {
    /// Shortcut for `ServiceBuilder::new`
    pub fn builder(provider: Arc<dyn SocketProvider>) -> ServiceBuilder {
        ServiceBuilder::new(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfchat_harness::MockSocketProvider;

    #[test]
    fn test_build_outside_runtime_is_an_error() {
        let result = ServiceBuilder::new(MockSocketProvider::new()).build();
        assert!(matches!(result, Err(ChatError::Channel { .. })));
    }

    #[tokio::test]
    async fn test_build_starts_not_connected() {
        let service = ConnectionService::builder(MockSocketProvider::new())
            .build()
            .unwrap();
        assert!(!service.is_connected());
        assert!(service.active_workers().await.is_empty());
    }
}
