//! Terminal output for link status and chat lines

use std::sync::Mutex;

use rfchat_core::{
    ChatMessage, ConnectionListener, MessageListener, NotificationSink, RemoteDevice,
};

/// Prefix of every status line
pub const STATUS_PREFIX: &str = "[rfchat]";

/// Shows link status on stdout
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl NotificationSink for TerminalNotifier {
    fn show(&self, status: &str) {
        println!("{}", format_status(status));
    }
}

pub fn format_status(status: &str) -> String {
    format!("{} {}", STATUS_PREFIX, status)
}

/// Prints lifecycle events and chat lines as they are delivered
#[derive(Debug, Default)]
pub struct ConsoleListener {
    peer_name: Mutex<Option<String>>,
}

impl ConsoleListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn remember(&self, peer: &RemoteDevice) {
        if let Ok(mut name) = self.peer_name.lock() {
            *name = Some(peer.display_name.clone());
        }
    }

    fn forget(&self) {
        if let Ok(mut name) = self.peer_name.lock() {
            *name = None;
        }
    }

    /// Render a chat line the way it is printed
    pub fn format_message(&self, message: &ChatMessage) -> String {
        let sender = if message.outgoing {
            "me".to_string()
        } else {
            self.peer_name
                .lock()
                .ok()
                .and_then(|name| name.clone())
                .unwrap_or_else(|| message.peer_address.clone())
        };
        format!("<{}> {}", sender, message.text)
    }
}

impl ConnectionListener for ConsoleListener {
    fn on_connecting(&self) {
        println!("* connecting...");
    }

    fn on_connected_in(&self, peer: &RemoteDevice) {
        self.remember(peer);
        println!("* {} connected to you", peer);
    }

    fn on_connected_out(&self, peer: &RemoteDevice) {
        self.remember(peer);
        println!("* connected to {}", peer);
    }

    fn on_disconnected(&self) {
        self.forget();
        println!("* disconnected");
    }

    fn on_connection_failed(&self) {
        println!("* unable to connect, listening again");
    }

    fn on_connection_lost(&self) {
        self.forget();
        println!("* connection lost, listening again");
    }
}

impl MessageListener for ConsoleListener {
    fn on_message_sent(&self, message: &ChatMessage) {
        println!("{}", self.format_message(message));
    }

    fn on_message_received(&self, message: &ChatMessage) {
        println!("{}", self.format_message(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_received_line_uses_peer_name_once_known() {
        let listener = ConsoleListener::new();
        let peer = RemoteDevice::new("10.0.0.2:7373", "Bob");
        let message = ChatMessage::incoming(&peer, "hey");

        assert_eq!(listener.format_message(&message), "<10.0.0.2:7373> hey");
        listener.on_connected_out(&peer);
        assert_eq!(listener.format_message(&message), "<Bob> hey");
        assert_eq!(
            listener.format_message(&ChatMessage::outgoing(&peer, "yo")),
            "<me> yo"
        );
    }

    #[test]
    fn test_status_format() {
        assert_eq!(format_status("Ready to connect"), "[rfchat] Ready to connect");
    }
}
