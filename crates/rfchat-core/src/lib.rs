//! rfchat Core Types
//!
//! This crate provides the foundational types shared by every rfchat crate:
//! the connection data model, error types, link configuration, the socket
//! provider abstraction that stands in for an RFCOMM-style transport, and the
//! listener/collaborator interfaces the connection runtime reports through.
//!
//! The connection state machine itself lives in `rfchat-runtime`; this crate
//! only defines the vocabulary it speaks.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod events;
pub mod message;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{Framing, LinkConfig, ServiceRecord, DEFAULT_READ_BUFFER_SIZE};
pub use errors::{ChatError, ChatResult, TransportError};
pub use events::{
    ConnectionEvent, ConnectionListener, DispatchEvent, Effect, MessageEvent, MessageListener,
    NoOpNotifications, NoOpPersistence, NotificationSink, PersistenceGateway,
};
pub use message::{ChatMessage, Conversation};
pub use transport::{BoxChannel, BoxServerSocket, ChatChannel, ServerSocket, SocketProvider};
pub use types::{ConnectionState, ConnectionType, RemoteDevice, Timestamp, WorkerId, WorkerKind};
