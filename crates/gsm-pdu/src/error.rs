//! Error types for gsm-pdu.

use thiserror::Error;

/// Errors that can occur while decoding a PDU.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PduError {
    /// The hex string could not be converted to bytes.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Decode error at a specific offset.
    #[error("Decode error at offset {offset}: {message}")]
    DecodeError {
        /// Byte offset where the error occurred.
        offset: usize,
        /// Description of the error.
        message: String,
    },

    /// The message type indicator does not match the origin hint.
    #[error("Unsupported message type {mti} for {origin} origin")]
    UnsupportedMessageType {
        /// Raw TP-MTI bits.
        mti: u8,
        /// The origin the TPDU was decoded as.
        origin: &'static str,
    },

    /// A field decoded to an impossible value.
    #[error("Invalid {field}: {message}")]
    InvalidField {
        /// Name of the field.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },
}

impl PduError {
    /// Create a decode error at a specific offset.
    pub fn decode_at(offset: usize, message: impl Into<String>) -> Self {
        PduError::DecodeError {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        PduError::InvalidField {
            field,
            message: message.into(),
        }
    }
}
