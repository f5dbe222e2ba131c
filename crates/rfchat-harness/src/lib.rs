//! rfchat Harness - In-Memory Testing Support
//!
//! Drives the connection runtime without radios or sockets:
//!
//! - **MockSocketProvider**: in-memory listener and dialer built on
//!   `tokio::io::duplex`, with scripted connect outcomes
//! - **EventRecorder**: connection and message listener that records every
//!   callback in delivery order
//! - **RecordingGateway / RecordingNotifier**: collaborators that keep what
//!   the effect task hands them
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use rfchat_harness::{EventRecorder, MockSocketProvider, RecordedEvent};
//! use rfchat_runtime::{RemoteDevice, ServiceBuilder};
//!
//! #[tokio::test]
//! async fn test_inbound() {
//!     let provider = MockSocketProvider::new();
//!     let (recorder, mut events) = EventRecorder::new();
//!     let service = ServiceBuilder::new(provider.clone())
//!         .with_connection_listener(recorder)
//!         .build()
//!         .unwrap();
//!
//!     service.start_listening().await.unwrap();
//!     let _remote = provider.incoming(RemoteDevice::new("AA:BB", "Alice")).unwrap();
//!
//!     assert_eq!(events.next().await, RecordedEvent::ConnectedIn("AA:BB".into()));
//! }
//! ```

pub mod mock_transport;
pub mod recorder;

pub use mock_transport::{ConnectPlan, MockSocketProvider, DUPLEX_BUFFER_SIZE};
pub use recorder::{
    eventually, wait_for_state, EventRecorder, EventStream, RecordedEvent, RecordingGateway,
    RecordingNotifier, DEFAULT_WAIT,
};

/// Install a test-friendly tracing subscriber once per process
///
/// Honours `RUST_LOG`; repeated calls are ignored.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
