//! Loopback tests for the TCP socket provider
//!
//! Exercise the provider directly and underneath two connection services
//! talking over 127.0.0.1.

use std::net::SocketAddr;
use std::sync::Arc;

use rfchat_core::{RemoteDevice, ServerSocket, ServiceRecord, SocketProvider, TransportError};
use rfchat_harness::{wait_for_state, EventRecorder, RecordedEvent};
use rfchat_runtime::{ConnectionState, ServiceBuilder};
use rfchat_tcp::{TcpSocketProvider, TcpTransportConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout, Duration};
use uuid::Uuid;

fn loopback_provider(name: &str) -> TcpSocketProvider {
    TcpSocketProvider::new(
        TcpTransportConfig::new()
            .with_bind_addr("127.0.0.1:0".parse().unwrap())
            .with_display_name(name)
            .with_handshake_timeout(Duration::from_secs(2)),
    )
}

/// Find a free loopback port by binding and releasing it
fn free_loopback_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn test_connect_and_accept_exchange_identities() {
    let record = ServiceRecord::default();
    let server = loopback_provider("Alice");
    let client = loopback_provider("Bob");

    let mut listener = server.bind(&record).await.unwrap();
    let target = RemoteDevice::unnamed(listener.local_addr().to_string());

    let (accepted, connected) = tokio::join!(listener.accept(), client.connect(&target, &record));
    let (mut server_side, peer) = accepted.unwrap();
    let (mut client_side, remote) = connected.unwrap();

    assert_eq!(peer.display_name, "Bob");
    assert_eq!(remote.address, target.address);
    assert_eq!(remote.display_name, "Alice");

    client_side.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    server_side.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");
}

#[tokio::test]
async fn test_mismatched_service_rejected_and_accept_continues() {
    let record = ServiceRecord::default();
    let other = ServiceRecord {
        name: "OtherChat".to_string(),
        uuid: Uuid::from_u128(7),
    };
    let server = loopback_provider("Alice");
    let client = loopback_provider("Bob");

    let mut listener = server.bind(&record).await.unwrap();
    let target = RemoteDevice::unnamed(listener.local_addr().to_string());

    let accepting = tokio::spawn(async move { listener.accept().await });

    let rejected = client.connect(&target, &other).await;
    assert!(matches!(
        rejected,
        Err(TransportError::ServiceMismatch { .. })
    ));

    let accepted_channel = client.connect(&target, &record).await;
    assert!(accepted_channel.is_ok());

    let (_, peer) = timeout(Duration::from_secs(2), accepting)
        .await
        .expect("listener should accept the matching peer")
        .unwrap()
        .unwrap();
    assert_eq!(peer.display_name, "Bob");
}

#[tokio::test]
async fn test_each_dialer_known_by_its_own_address() {
    let record = ServiceRecord::default();
    let server = loopback_provider("Alice");
    let bob = loopback_provider("Bob");
    let carol = loopback_provider("Carol");

    let mut listener = server.bind(&record).await.unwrap();
    let target = RemoteDevice::unnamed(listener.local_addr().to_string());

    let (first, bob_side) = tokio::join!(listener.accept(), bob.connect(&target, &record));
    let (_bob_channel, from_bob) = first.unwrap();
    let _bob_side = bob_side.unwrap();

    let (second, carol_side) = tokio::join!(listener.accept(), carol.connect(&target, &record));
    let (_carol_channel, from_carol) = second.unwrap();
    let _carol_side = carol_side.unwrap();

    assert_eq!(from_bob.display_name, "Bob");
    assert_eq!(from_carol.display_name, "Carol");
    assert_ne!(from_bob, from_carol);
    assert!(from_bob.address.starts_with("127.0.0.1:"));
    assert_ne!(from_bob.address, "127.0.0.1:0");
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    let client = loopback_provider("Bob");
    let target = RemoteDevice::unnamed(free_loopback_addr().to_string());

    let result = client.connect(&target, &ServiceRecord::default()).await;
    assert!(matches!(result, Err(TransportError::ConnectFailed { .. })));
}

#[tokio::test]
async fn test_two_services_chat_over_tcp() {
    let listen_addr = free_loopback_addr();

    let (alice_recorder, mut alice_events) = EventRecorder::new();
    let alice = ServiceBuilder::new(Arc::new(TcpSocketProvider::new(
        TcpTransportConfig::new()
            .with_bind_addr(listen_addr)
            .with_display_name("Alice"),
    )))
    .with_connection_listener(alice_recorder.clone())
    .with_message_listener(alice_recorder)
    .build()
    .unwrap();

    let (bob_recorder, mut bob_events) = EventRecorder::new();
    let bob = ServiceBuilder::new(Arc::new(loopback_provider("Bob")))
        .with_connection_listener(bob_recorder.clone())
        .with_message_listener(bob_recorder)
        .build()
        .unwrap();

    alice.start_listening().await.unwrap();
    bob.connect(RemoteDevice::unnamed(listen_addr.to_string()))
        .await;

    assert_eq!(bob_events.next().await, RecordedEvent::Connecting);
    assert_eq!(
        bob_events.next().await,
        RecordedEvent::ConnectedOut(listen_addr.to_string())
    );
    assert!(matches!(
        alice_events.next().await,
        RecordedEvent::ConnectedIn(_)
    ));

    // The dialed address stays the identity, named by the handshake
    assert_eq!(bob.peer().await.unwrap().display_name, "Alice");

    bob.send("hello alice").await;
    assert_eq!(bob_events.next().await, RecordedEvent::Sent("hello alice".into()));
    assert_eq!(
        alice_events.next().await,
        RecordedEvent::Received("hello alice".into())
    );

    // Bob leaving is a lost connection for Alice, who goes back to listening
    let mut alice_states = alice.subscribe_state();
    bob.stop().await;
    assert_eq!(alice_events.next().await, RecordedEvent::ConnectionLost);
    wait_for_state(&mut alice_states, ConnectionState::Listening).await;
}

#[tokio::test]
async fn test_listen_again_on_same_port_right_after_stop() {
    let listen_addr = free_loopback_addr();
    let alice = ServiceBuilder::new(Arc::new(TcpSocketProvider::new(
        TcpTransportConfig::new()
            .with_bind_addr(listen_addr)
            .with_display_name("Alice"),
    )))
    .build()
    .unwrap();

    alice.start_listening().await.unwrap();
    alice.stop().await;
    alice.start_listening().await.unwrap();
    assert_eq!(alice.state(), ConnectionState::Listening);

    // The fresh listener is the one taking peers
    let bob = loopback_provider("Bob");
    let target = RemoteDevice::unnamed(listen_addr.to_string());
    let (_channel, remote) = bob
        .connect(&target, &ServiceRecord::default())
        .await
        .unwrap();
    assert_eq!(remote.display_name, "Alice");
}
