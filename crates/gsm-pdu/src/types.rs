//! Decoded PDU types and the decoder seam.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::PduError;

/// How the binary TPDU should be interpreted.
///
/// Address and field layout differ between a message the modem received
/// (SMS-DELIVER) and one composed on the handset (SMS-SUBMIT), and the type
/// bits alone do not say which side produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OriginHint {
    /// Delivered to the handset by the network.
    #[default]
    MobileTerminated,
    /// Composed on the handset.
    MobileOriginated,
}

impl OriginHint {
    /// Get a short name for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginHint::MobileTerminated => "mobile-terminated",
            OriginHint::MobileOriginated => "mobile-originated",
        }
    }
}

/// Direction of a decoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Inbound, network to handset.
    MobileTerminated,
    /// Outbound, handset to network.
    MobileOriginated,
}

impl Direction {
    /// Check if the message is inbound.
    pub fn is_inbound(&self) -> bool {
        matches!(self, Direction::MobileTerminated)
    }
}

/// A hex PDU unwrapped into its service centre address and TPDU bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduEnvelope {
    /// Service centre address, `None` when the PDU carries an empty one.
    pub smsc: Option<String>,
    /// The transfer-layer PDU.
    pub tpdu: Vec<u8>,
}

/// The fields of a decoded message the session cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedPdu {
    /// Originating address for SMS-DELIVER, destination for SMS-SUBMIT.
    pub address: String,
    /// Service centre timestamp (SMS-DELIVER only).
    pub timestamp: Option<DateTime<FixedOffset>>,
    /// Message text.
    pub body: String,
    /// Which way the message travelled.
    pub direction: Direction,
    /// Service centre address from the envelope.
    pub smsc: Option<String>,
}

/// Something that can turn a hex PDU line into a [`DecodedPdu`].
pub trait PduDecoder: Send + Sync {
    /// Decode `hex` (no line terminator) using the given origin hint.
    fn decode(&self, hex: &str, hint: OriginHint) -> Result<DecodedPdu, PduError>;
}
