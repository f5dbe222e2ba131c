//! Chat message and conversation records
//!
//! These are event payloads only; the core never stores them. They are handed
//! to listeners and to the persistence gateway.

use serde::{Deserialize, Serialize};

use crate::types::{RemoteDevice, Timestamp};

/// A single text message exchanged over the link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Address of the remote peer this message was exchanged with
    pub peer_address: String,
    /// When the message was sent or received
    pub timestamp: Timestamp,
    /// `true` if this side wrote the message
    pub outgoing: bool,
    /// Decoded message text
    pub text: String,
    /// Delivery flag; the link has no acknowledgements so this starts `false`
    pub delivered: bool,
}

impl ChatMessage {
    /// A message written by this side to `peer`
    pub fn outgoing(peer: &RemoteDevice, text: impl Into<String>) -> Self {
        Self {
            peer_address: peer.address.clone(),
            timestamp: Timestamp::now(),
            outgoing: true,
            text: text.into(),
            delivered: false,
        }
    }

    /// A message read from `peer`
    pub fn incoming(peer: &RemoteDevice, text: impl Into<String>) -> Self {
        Self {
            peer_address: peer.address.clone(),
            timestamp: Timestamp::now(),
            outgoing: false,
            text: text.into(),
            delivered: false,
        }
    }
}

/// A conversation with one remote peer, emitted once per new connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub peer_address: String,
    pub display_name: String,
}

impl From<&RemoteDevice> for Conversation {
    fn from(device: &RemoteDevice) -> Self {
        Self {
            peer_address: device.address.clone(),
            display_name: device.display_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_direction_constructors() {
        let peer = RemoteDevice::new("AA:BB", "Alice");

        let sent = ChatMessage::outgoing(&peer, "hi");
        assert!(sent.outgoing);
        assert!(!sent.delivered);
        assert_eq!(sent.peer_address, "AA:BB");

        let received = ChatMessage::incoming(&peer, "hello back");
        assert!(!received.outgoing);
        assert_eq!(received.text, "hello back");
    }

    #[test]
    fn test_message_serializes_as_json_record() {
        let peer = RemoteDevice::new("AA:BB", "Alice");
        let message = ChatMessage::incoming(&peer, "ping");
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"peer_address\":\"AA:BB\""));
        assert!(json.contains("\"text\":\"ping\""));
    }

    #[test]
    fn test_conversation_from_device() {
        let conversation = Conversation::from(&RemoteDevice::new("AA:BB", "Alice"));
        assert_eq!(conversation.display_name, "Alice");
    }
}
