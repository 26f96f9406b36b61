//! Message adapter: response lines plus the PDU decoder in, messages out.
//!
//! A stored message occupies two lines of a `+CMGL`/`+CMGR` response, the
//! record header and the hex PDU:
//!
//! ```text
//! +CMGL: 3,3,"",23
//! 0011000B916407281553F80000AA0AE8329BFD4697D9EC37
//! ```

use chrono::{DateTime, FixedOffset};
use gsm_at_protocol::{trim_terminator, MessageRecordHeader, ProtocolError, RecordPrefix};
use gsm_pdu::{Direction, OriginHint, PduDecoder};
use serde::{Deserialize, Serialize};

use crate::error::{ModemError, Result};

/// Storage status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Received, not yet read.
    ReceivedUnread,
    /// Received and read.
    ReceivedRead,
    /// Stored, not yet sent.
    PendingSend,
    /// Stored and sent.
    Sent,
}

impl MessageStatus {
    /// Convert a wire status code.
    pub fn from_code(code: u8) -> Option<MessageStatus> {
        match code {
            0 => Some(MessageStatus::ReceivedUnread),
            1 => Some(MessageStatus::ReceivedRead),
            2 => Some(MessageStatus::PendingSend),
            3 => Some(MessageStatus::Sent),
            _ => None,
        }
    }

    /// The wire status code.
    pub fn code(&self) -> u8 {
        match self {
            MessageStatus::ReceivedUnread => 0,
            MessageStatus::ReceivedRead => 1,
            MessageStatus::PendingSend => 2,
            MessageStatus::Sent => 3,
        }
    }

    /// Locally composed messages carry SMS-SUBMIT PDUs.
    pub fn origin_hint(&self) -> OriginHint {
        match self {
            MessageStatus::PendingSend | MessageStatus::Sent => OriginHint::MobileOriginated,
            MessageStatus::ReceivedUnread | MessageStatus::ReceivedRead => {
                OriginHint::MobileTerminated
            }
        }
    }
}

/// A stored SMS message.
///
/// `index` is the modem's storage slot and only means something until the
/// storage changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Storage slot.
    pub index: u32,
    /// Storage status.
    pub status: MessageStatus,
    /// Which way the message travelled.
    pub direction: Direction,
    /// Sender, for inbound messages.
    pub from: Option<String>,
    /// Recipient, for outbound messages.
    pub to: Option<String>,
    /// Service centre timestamp, inbound messages only.
    pub timestamp: Option<DateTime<FixedOffset>>,
    /// Message text.
    pub body: String,
}

impl Message {
    /// Check if the message was received rather than composed locally.
    pub fn is_inbound(&self) -> bool {
        self.direction.is_inbound()
    }
}

/// Parse every `prefix` record in `lines` into a [`Message`].
///
/// Lines that do not start with the prefix are skipped. Each matching line
/// consumes the line after it as its PDU.
pub fn parse_messages(
    lines: &[String],
    prefix: RecordPrefix,
    decoder: &dyn PduDecoder,
) -> Result<Vec<Message>> {
    let mut messages = Vec::new();
    let mut iter = lines.iter();

    while let Some(line) = iter.next() {
        if !line.starts_with(prefix.as_str()) {
            continue;
        }

        let header = MessageRecordHeader::parse(line, prefix)?;
        let status = match header.status {
            Some(code) => MessageStatus::from_code(code).ok_or_else(|| {
                ProtocolError::malformed(prefix.as_str(), line, format!("unknown status {}", code))
            })?,
            None => MessageStatus::ReceivedUnread,
        };

        let pdu_line = iter.next().ok_or_else(|| ProtocolError::MissingPayload {
            prefix: prefix.as_str().to_string(),
            line: line.clone(),
        })?;
        let hex = trim_terminator(pdu_line);

        let decoded = decoder
            .decode(hex, status.origin_hint())
            .map_err(|source| ModemError::Pdu {
                prefix: prefix.as_str().to_string(),
                line: hex.to_string(),
                source,
            })?;

        let (from, to) = match decoded.direction {
            Direction::MobileTerminated => (Some(decoded.address), None),
            Direction::MobileOriginated => (None, Some(decoded.address)),
        };

        messages.push(Message {
            index: header.index,
            status,
            direction: decoded.direction,
            from,
            to,
            timestamp: decoded.timestamp,
            body: decoded.body,
        });
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsm_pdu::{DecodedPdu, GsmPduDecoder, PduError};
    use parking_lot::Mutex;

    const DELIVER: &str = "07911326040000F0040B911346610089F60000208062917314080CC8F71D14969741F977FD07";
    const SUBMIT: &str = "0011000B916407281553F80000AA0AE8329BFD4697D9EC37";

    /// Records the hint of every call and echoes the hex back as the body.
    #[derive(Default)]
    struct RecordingDecoder {
        calls: Mutex<Vec<OriginHint>>,
    }

    impl PduDecoder for RecordingDecoder {
        fn decode(&self, hex: &str, hint: OriginHint) -> std::result::Result<DecodedPdu, PduError> {
            self.calls.lock().push(hint);
            let direction = match hint {
                OriginHint::MobileTerminated => Direction::MobileTerminated,
                OriginHint::MobileOriginated => Direction::MobileOriginated,
            };
            Ok(DecodedPdu {
                address: "+15550100".to_string(),
                timestamp: None,
                body: hex.to_string(),
                direction,
                smsc: None,
            })
        }
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_list_status_selects_origin_hint() {
        let decoder = RecordingDecoder::default();
        let response = lines(&[
            "+CMGL: 3,3,\"\",23\r\n",
            "AAAA\r\n",
            "+CMGL: 4,0,\"\",23\r\n",
            "BBBB\r\n",
            "+CMGL: 5,1,\"\",23\r\n",
            "CCCC\r\n",
            "\r\n",
            "OK\r\n",
        ]);

        let messages = parse_messages(&response, RecordPrefix::List, &decoder).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(
            *decoder.calls.lock(),
            vec![
                OriginHint::MobileOriginated,
                OriginHint::MobileTerminated,
                OriginHint::MobileTerminated
            ]
        );

        assert_eq!(messages[0].index, 3);
        assert_eq!(messages[0].status, MessageStatus::Sent);
        assert!(!messages[0].is_inbound());
        assert_eq!(messages[0].to.as_deref(), Some("+15550100"));
        assert_eq!(messages[0].body, "AAAA");
        assert_eq!(messages[1].from.as_deref(), Some("+15550100"));
    }

    #[test]
    fn test_real_pdus() {
        let response = lines(&[
            "+CMGL: 3,3,\"\",23\r\n",
            &format!("{}\r\n", SUBMIT),
            "+CMGL: 1,1,\"\",24\r\n",
            &format!("{}\r\n", DELIVER),
            "OK\r\n",
        ]);

        let messages = parse_messages(&response, RecordPrefix::List, &GsmPduDecoder).unwrap();
        assert_eq!(messages[0].to.as_deref(), Some("+46708251358"));
        assert_eq!(messages[0].body, "hellohello");
        assert_eq!(messages[0].direction, Direction::MobileOriginated);

        assert_eq!(messages[1].from.as_deref(), Some("+31641600986"));
        assert_eq!(messages[1].body, "How are you?");
        assert!(messages[1].timestamp.is_some());
        assert!(messages[1].is_inbound());
    }

    #[test]
    fn test_read_record_without_status_defaults_to_unread() {
        let decoder = RecordingDecoder::default();
        let response = lines(&["+CMGR: 7,,23\r\n", "AAAA\r\n", "OK\r\n"]);

        let messages = parse_messages(&response, RecordPrefix::Read, &decoder).unwrap();
        assert_eq!(messages[0].index, 7);
        assert_eq!(messages[0].status, MessageStatus::ReceivedUnread);
        assert_eq!(*decoder.calls.lock(), vec![OriginHint::MobileTerminated]);
    }

    #[test]
    fn test_read_record_status_is_honoured() {
        let decoder = RecordingDecoder::default();
        let response = lines(&["+CMGR: 7,2,\"\",23\r\n", "AAAA\r\n", "OK\r\n"]);

        parse_messages(&response, RecordPrefix::Read, &decoder).unwrap();
        assert_eq!(*decoder.calls.lock(), vec![OriginHint::MobileOriginated]);
    }

    #[test]
    fn test_other_prefix_is_ignored() {
        let decoder = RecordingDecoder::default();
        let response = lines(&["+CMGR: 7,1,\"\",23\r\n", "AAAA\r\n", "OK\r\n"]);
        let messages = parse_messages(&response, RecordPrefix::List, &decoder).unwrap();
        assert!(messages.is_empty());
    }

    #[test]
    fn test_malformed_index() {
        let decoder = RecordingDecoder::default();
        let response = lines(&["+CMGL: x,1,\"\",23\r\n", "AAAA\r\n", "OK\r\n"]);
        let err = parse_messages(&response, RecordPrefix::List, &decoder).unwrap_err();
        match err {
            ModemError::Protocol(ProtocolError::MalformedRecord { prefix, line, .. }) => {
                assert_eq!(prefix, "+CMGL: ");
                assert_eq!(line, "+CMGL: x,1,\"\",23\r\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_status() {
        let decoder = RecordingDecoder::default();
        let response = lines(&["+CMGL: 1,9,\"\",23\r\n", "AAAA\r\n"]);
        assert!(parse_messages(&response, RecordPrefix::List, &decoder).is_err());
    }

    #[test]
    fn test_missing_pdu_line() {
        let decoder = RecordingDecoder::default();
        let response = lines(&["+CMGL: 1,1,\"\",23\r\n"]);
        let err = parse_messages(&response, RecordPrefix::List, &decoder).unwrap_err();
        assert!(matches!(err, ModemError::Protocol(ProtocolError::MissingPayload { .. })));
    }

    #[test]
    fn test_bad_pdu_names_hex_line() {
        let response = lines(&["+CMGL: 1,1,\"\",23\r\n", "07ZZ\r\n", "OK\r\n"]);
        let err = parse_messages(&response, RecordPrefix::List, &GsmPduDecoder).unwrap_err();
        match err {
            ModemError::Pdu { line, .. } => assert_eq!(line, "07ZZ"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
