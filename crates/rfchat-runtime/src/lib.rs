//! rfchat Runtime Engine
//!
//! This crate contains the connection core for rfchat:
//! - `ConnectionService`: the state machine that owns the single link
//! - Accept, connect and connected workers, one tokio task each
//! - The event dispatcher (ordered listener delivery) and the effect task
//!   (fire-and-forget persistence and notifications)
//! - `ServiceBuilder` for wiring a service to a socket provider
//!
//! `rfchat-core` provides the types this engine speaks; concrete transports
//! live in their own crates.

pub mod builder;
pub mod dispatcher;
pub mod effects;
pub mod framing;
mod service;
mod workers;

pub use builder::ServiceBuilder;
pub use service::{ConnectionService, CONNECTED_STATUS_PREFIX, READY_STATUS};

// Re-export core types for convenience
pub use rfchat_core::{
    ChatError, ChatMessage, ChatResult, ConnectionListener, ConnectionState, ConnectionType,
    Conversation, Framing, LinkConfig, MessageListener, NotificationSink, PersistenceGateway,
    RemoteDevice, ServiceRecord, SocketProvider, WorkerKind,
};
