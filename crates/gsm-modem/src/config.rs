//! Session configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModemError, Result};

/// What the line splitter does with a response line when the response queue
/// is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Discard the line and count it. Keeps the reader live.
    #[default]
    Drop,
    /// Wait for room, stalling the transport reader.
    Block,
}

/// Configuration for a modem session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// `tcp://host:port` for a UART exposed over TCP, otherwise a serial
    /// device path.
    pub address: String,
    /// Serial baud rate. Ignored for TCP.
    pub baud_rate: u32,
    /// Capacity of the response line queue.
    pub sync_queue_capacity: usize,
    /// Capacity of the notification line queue.
    pub async_queue_capacity: usize,
    /// Policy for response lines arriving at a full queue.
    pub sync_overflow: OverflowPolicy,
    /// Size of the transport read buffer.
    pub read_buffer_size: usize,
}

impl Default for ModemConfig {
    fn default() -> Self {
        ModemConfig {
            address: "/dev/ttyUSB1".to_string(),
            baud_rate: 9600,
            sync_queue_capacity: 10,
            async_queue_capacity: 10,
            sync_overflow: OverflowPolicy::Drop,
            read_buffer_size: 1024,
        }
    }
}

impl ModemConfig {
    /// Create a configuration for the given address with default settings.
    pub fn new(address: impl Into<String>) -> Self {
        ModemConfig {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Parse a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ModemConfig =
            serde_yaml::from_str(yaml).map_err(|e| ModemError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ModemError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&text)
    }

    /// Check the settings are usable.
    pub fn validate(&self) -> Result<()> {
        if self.sync_queue_capacity == 0 {
            return Err(ModemError::Config("sync_queue_capacity must be at least 1".to_string()));
        }
        if self.async_queue_capacity == 0 {
            return Err(ModemError::Config("async_queue_capacity must be at least 1".to_string()));
        }
        if self.read_buffer_size == 0 {
            return Err(ModemError::Config("read_buffer_size must be at least 1".to_string()));
        }
        Ok(())
    }
}
