//! Core types for rfchat
//!
//! Connection states, remote device identity, timestamps and worker
//! identifiers used across the runtime.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Sub;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Lifecycle state of the single chat link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    NotConnected,
    Listening,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// Human-readable state name
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::NotConnected => "NotConnected",
            ConnectionState::Listening => "Listening",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the active connection was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionType {
    Incoming,
    Outgoing,
}

// ----------------------------------------------------------------------------
// Remote Device
// ----------------------------------------------------------------------------

/// A remote peer, identified by its transport address
///
/// Equality and hashing only consider `address`; `display_name` is advisory
/// and may differ between sightings of the same device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDevice {
    pub address: String,
    pub display_name: String,
}

impl RemoteDevice {
    pub fn new(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: display_name.into(),
        }
    }

    /// Device with no known name; the address doubles as display name
    pub fn unnamed(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            display_name: address.clone(),
            address,
        }
    }
}

impl PartialEq for RemoteDevice {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for RemoteDevice {}

impl Hash for RemoteDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl fmt::Display for RemoteDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.address)
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Sub for Timestamp {
    type Output = u64;

    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl Timestamp {
    /// Create a new timestamp
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Milliseconds since the Unix epoch
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

// ----------------------------------------------------------------------------
// Worker Identity
// ----------------------------------------------------------------------------

/// Role of a concurrently running I/O worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerKind {
    Accept,
    Connect,
    Connected,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerKind::Accept => write!(f, "accept"),
            WorkerKind::Connect => write!(f, "connect"),
            WorkerKind::Connected => write!(f, "connected"),
        }
    }
}

/// Generation number of a spawned worker
///
/// Ids are never reused within one service, so a worker whose id no longer
/// matches the registered one has been superseded or cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_remote_device_identity_is_address() {
        let a = RemoteDevice::new("00:11:22:33:44:55", "Phone");
        let b = RemoteDevice::new("00:11:22:33:44:55", "Renamed phone");
        let c = RemoteDevice::new("66:77:88:99:AA:BB", "Phone");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_unnamed_device_uses_address_as_name() {
        let device = RemoteDevice::unnamed("127.0.0.1:4000");
        assert_eq!(device.display_name, "127.0.0.1:4000");
    }

    #[test]
    fn test_initial_state_is_not_connected() {
        assert_eq!(ConnectionState::default(), ConnectionState::NotConnected);
        assert_eq!(ConnectionState::Listening.to_string(), "Listening");
    }

    #[test]
    fn test_timestamp_difference_saturates() {
        let earlier = Timestamp::new(1_000);
        let later = Timestamp::new(1_500);
        assert_eq!(later - earlier, 500);
        assert_eq!(earlier - later, 0);
    }
}
