//! Error types for the modem session.

use std::io;
use std::sync::Arc;

use gsm_at_protocol::ProtocolError;
use gsm_pdu::PduError;
use thiserror::Error;

/// Errors returned by session operations.
///
/// Clonable so a latched transport error can be handed to every caller that
/// runs into the closed session.
#[derive(Debug, Error, Clone)]
pub enum ModemError {
    /// Open, read or write on the transport failed. Fatal to the session.
    #[error("transport error: {0}")]
    Transport(Arc<io::Error>),

    /// The response queue closed without a recorded transport error.
    #[error("connection closed")]
    ConnectionClosed,

    /// The modem answered `ERROR`.
    #[error("command {command:?} rejected by modem")]
    CommandRejected {
        /// The command text as sent.
        command: String,
        /// Every response line, terminal marker included.
        lines: Vec<String>,
    },

    /// The modem answered `COMMAND NOT SUPPORT`.
    #[error("command {command:?} not supported by modem")]
    CommandNotSupported {
        /// The command text as sent.
        command: String,
        /// Every response line, terminal marker included.
        lines: Vec<String>,
    },

    /// A notification or message record was malformed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The hex PDU line following a message record could not be decoded.
    #[error("parse {prefix}pdu {line:?}: {source}")]
    Pdu {
        /// The record prefix the PDU belonged to.
        prefix: String,
        /// The hex line, terminator stripped.
        line: String,
        /// Decoder error.
        #[source]
        source: PduError,
    },

    /// A single-message read returned no record.
    #[error("no message found at index {index}")]
    NotFound {
        /// The index that was read.
        index: u32,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ModemError {
    /// Wrap an I/O error as a transport error.
    pub fn transport(err: io::Error) -> Self {
        ModemError::Transport(Arc::new(err))
    }

    /// Check if this error means the session is unusable.
    pub fn is_transport(&self) -> bool {
        matches!(self, ModemError::Transport(_) | ModemError::ConnectionClosed)
    }

    /// Check if the modem answered with a negative terminal marker.
    pub fn is_command_failure(&self) -> bool {
        matches!(
            self,
            ModemError::CommandRejected { .. } | ModemError::CommandNotSupported { .. }
        )
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, ModemError>;
