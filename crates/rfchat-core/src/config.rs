//! Link configuration

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ChatError, ChatResult};

// ----------------------------------------------------------------------------
// Service Record
// ----------------------------------------------------------------------------

/// Default service name advertised by the listening side
pub const DEFAULT_SERVICE_NAME: &str = "BluetoothChat";

/// Default service identifier shared by compatible peers
pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0x220da3b2_41f5_11e7_a919_92ebcb67fe33);

/// Size of a single read on an established channel
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Identifies the chat service on both accept and connect paths
///
/// Only peers presenting the same record can establish a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub uuid: Uuid,
}

impl Default for ServiceRecord {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVICE_NAME.to_string(),
            uuid: DEFAULT_SERVICE_UUID,
        }
    }
}

// ----------------------------------------------------------------------------
// Framing
// ----------------------------------------------------------------------------

/// How message boundaries are recovered from the byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Every successful read is one message; writes carry raw UTF-8
    #[default]
    Raw,
    /// Each message is prefixed with a 4-byte big-endian length
    LengthDelimited,
}

// ----------------------------------------------------------------------------
// Link Configuration
// ----------------------------------------------------------------------------

/// Configuration for the connection runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Service record used for listening and connecting
    pub service: ServiceRecord,
    /// Maximum bytes taken by one read (and one message in `Raw` framing)
    pub read_buffer_size: usize,
    /// Message framing on the wire
    pub framing: Framing,
    /// Largest frame accepted in `LengthDelimited` framing
    pub max_frame_length: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            service: ServiceRecord::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            framing: Framing::Raw,
            max_frame_length: 64 * 1024,
        }
    }
}

impl LinkConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service record
    pub fn with_service(mut self, service: ServiceRecord) -> Self {
        self.service = service;
        self
    }

    /// Set the read buffer size
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the message framing
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Set the largest accepted frame for length-delimited framing
    pub fn with_max_frame_length(mut self, length: usize) -> Self {
        self.max_frame_length = length;
        self
    }

    /// Check the configuration for values the runtime cannot work with
    pub fn validate(&self) -> ChatResult<()> {
        if self.service.name.trim().is_empty() {
            return Err(ChatError::config("Service name must not be empty"));
        }
        if self.service.uuid.is_nil() {
            return Err(ChatError::config("Service UUID must not be nil"));
        }
        if self.read_buffer_size == 0 {
            return Err(ChatError::config("Read buffer size must be greater than 0"));
        }
        if self.framing == Framing::LengthDelimited && self.max_frame_length == 0 {
            return Err(ChatError::config("Max frame length must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LinkConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.framing, Framing::Raw);
        assert_eq!(
            config.service.uuid.to_string(),
            "220da3b2-41f5-11e7-a919-92ebcb67fe33"
        );
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let config = LinkConfig::new().with_read_buffer_size(0);
        assert!(matches!(config.validate(), Err(ChatError::Config { .. })));
    }

    #[test]
    fn test_nil_service_uuid_rejected() {
        let config = LinkConfig::new().with_service(ServiceRecord {
            name: "Chat".to_string(),
            uuid: Uuid::nil(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_framing_deserializes_from_snake_case() {
        let config: LinkConfig =
            serde_json::from_str(r#"{"framing":"length_delimited"}"#).unwrap();
        assert_eq!(config.framing, Framing::LengthDelimited);
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
    }
}
