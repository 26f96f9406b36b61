//! Response parsing for the AT protocol.
//!
//! Responses end with one of three terminal markers. Records inside responses
//! and notifications are comma-separated with optionally quoted fields:
//!
//! ```text
//! +CMTI: "ME",7
//! +CMGL: 3,3,"",23
//! 0011000B916407281553F80000AA0AE8329BFD4697D9EC37
//! OK
//! ```

use crate::codec::{trim_terminator, NEW_MESSAGE_PREFIX};
use crate::error::{ProtocolError, ProtocolResult};

/// Terminal marker for a successful command.
pub const OK_MARKER: &str = "OK\r\n";

/// Terminal marker for a rejected command.
pub const ERROR_MARKER: &str = "ERROR\r\n";

/// Terminal marker for a command the modem does not implement.
pub const NOT_SUPPORTED_MARKER: &str = "COMMAND NOT SUPPORT\r\n";

/// A line that ends a command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMarker {
    /// `OK`
    Ok,
    /// `ERROR`
    Error,
    /// `COMMAND NOT SUPPORT`
    NotSupported,
}

impl TerminalMarker {
    /// Classify a raw line (terminator included).
    ///
    /// Matching is verbatim; `OK` without its `\r\n` is not a marker.
    pub fn classify(line: &str) -> Option<TerminalMarker> {
        match line {
            OK_MARKER => Some(TerminalMarker::Ok),
            ERROR_MARKER => Some(TerminalMarker::Error),
            NOT_SUPPORTED_MARKER => Some(TerminalMarker::NotSupported),
            _ => None,
        }
    }

    /// Check if this marker reports success.
    pub fn is_ok(&self) -> bool {
        matches!(self, TerminalMarker::Ok)
    }
}

/// Split a comma-separated record, honouring double-quoted fields.
///
/// Quoted fields may contain commas and doubled quotes (`""`). Quotes are
/// stripped from the returned fields.
pub fn split_record(text: &str) -> Result<Vec<String>, String> {
    if text.is_empty() {
        return Err("empty record".to_string());
    }

    let mut fields = Vec::new();
    let mut chars = text.chars().peekable();

    loop {
        let mut field = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => return Err("unterminated quoted field".to_string()),
                }
            }
            match chars.next() {
                None => {
                    fields.push(field);
                    return Ok(fields);
                }
                Some(',') => fields.push(field),
                Some(c) => return Err(format!("unexpected {:?} after quoted field", c)),
            }
        } else {
            loop {
                match chars.next() {
                    None => {
                        fields.push(field);
                        return Ok(fields);
                    }
                    Some(',') => break,
                    Some('"') => return Err("bare quote in unquoted field".to_string()),
                    Some(c) => field.push(c),
                }
            }
            fields.push(field);
        }
    }
}

/// Strip `prefix` and the line terminator, then split the rest as a record.
fn record_fields(line: &str, prefix: &str) -> ProtocolResult<Vec<String>> {
    let body = line
        .strip_prefix(prefix)
        .ok_or_else(|| ProtocolError::malformed(prefix, line, "missing prefix"))?;
    split_record(trim_terminator(body).trim_start())
        .map_err(|reason| ProtocolError::malformed(prefix, line, reason))
}

/// A `+CMTI: "<storage>",<index>` new-message notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessageIndication {
    /// Storage area the message was written to.
    pub storage: String,
    /// Slot of the new message in that storage.
    pub index: u32,
}

impl NewMessageIndication {
    /// Parse a raw `+CMTI:` line.
    pub fn parse(line: &str) -> ProtocolResult<NewMessageIndication> {
        let fields = record_fields(line, NEW_MESSAGE_PREFIX)?;
        if fields.len() < 2 {
            return Err(ProtocolError::malformed(
                NEW_MESSAGE_PREFIX,
                line,
                format!("expected 2 fields, got {}", fields.len()),
            ));
        }

        let index = fields[1].trim().parse::<u32>().map_err(|_| {
            ProtocolError::malformed(NEW_MESSAGE_PREFIX, line, format!("invalid index {:?}", fields[1]))
        })?;

        Ok(NewMessageIndication {
            storage: fields[0].clone(),
            index,
        })
    }
}

/// Which message record a response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPrefix {
    /// `+CMGL: ` records from a list command.
    List,
    /// `+CMGR: ` record from a read-one command.
    Read,
}

impl RecordPrefix {
    /// Get the prefix string as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordPrefix::List => "+CMGL: ",
            RecordPrefix::Read => "+CMGR: ",
        }
    }

    /// Whether records with this prefix must carry a status field.
    pub fn requires_status(&self) -> bool {
        matches!(self, RecordPrefix::List)
    }
}

impl std::fmt::Display for RecordPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The header line of a stored message: `<index>,<status>,<name>,<pduLen>`.
///
/// The name and PDU length fields are not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRecordHeader {
    /// Storage slot.
    pub index: u32,
    /// Raw status code, `None` when a read record leaves it out.
    pub status: Option<u8>,
}

impl MessageRecordHeader {
    /// Parse a raw record line that starts with `prefix`.
    pub fn parse(line: &str, prefix: RecordPrefix) -> ProtocolResult<MessageRecordHeader> {
        let p = prefix.as_str();
        let fields = record_fields(line, p)?;

        let index = fields[0]
            .trim()
            .parse::<u32>()
            .map_err(|_| ProtocolError::malformed(p, line, format!("invalid index {:?}", fields[0])))?;

        let status = match fields.get(1).map(|s| s.trim()) {
            Some(s) if !s.is_empty() => Some(s.parse::<u8>().map_err(|_| {
                ProtocolError::malformed(p, line, format!("invalid status {:?}", s))
            })?),
            _ if prefix.requires_status() => {
                return Err(ProtocolError::malformed(p, line, "missing status"));
            }
            _ => None,
        };

        Ok(MessageRecordHeader { index, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_markers() {
        assert_eq!(TerminalMarker::classify("OK\r\n"), Some(TerminalMarker::Ok));
        assert_eq!(TerminalMarker::classify("ERROR\r\n"), Some(TerminalMarker::Error));
        assert_eq!(
            TerminalMarker::classify("COMMAND NOT SUPPORT\r\n"),
            Some(TerminalMarker::NotSupported)
        );
        assert_eq!(TerminalMarker::classify("OK"), None);
        assert_eq!(TerminalMarker::classify("+CME ERROR: 10\r\n"), None);
        assert!(TerminalMarker::Ok.is_ok());
        assert!(!TerminalMarker::Error.is_ok());
    }

    #[test]
    fn test_split_record_quoted() {
        assert_eq!(split_record("\"ME\",7").unwrap(), vec!["ME", "7"]);
        assert_eq!(split_record("3,3,\"\",23").unwrap(), vec!["3", "3", "", "23"]);
        assert_eq!(split_record("\"a,b\",\"say \"\"hi\"\"\"").unwrap(), vec!["a,b", "say \"hi\""]);
        assert_eq!(split_record("1,,23").unwrap(), vec!["1", "", "23"]);
    }

    #[test]
    fn test_split_record_errors() {
        assert!(split_record("").is_err());
        assert!(split_record("\"ME,7").is_err());
        assert!(split_record("\"ME\"x,7").is_err());
        assert!(split_record("M\"E,7").is_err());
    }

    #[test]
    fn test_parse_cmti() {
        let ind = NewMessageIndication::parse("+CMTI: \"ME\",7\r\n").unwrap();
        assert_eq!(ind.storage, "ME");
        assert_eq!(ind.index, 7);
    }

    #[test]
    fn test_parse_cmti_bad_index() {
        let err = NewMessageIndication::parse("+CMTI: \"ME\",seven\r\n").unwrap_err();
        match err {
            ProtocolError::MalformedRecord { prefix, line, .. } => {
                assert_eq!(prefix, "+CMTI:");
                assert_eq!(line, "+CMTI: \"ME\",seven\r\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(NewMessageIndication::parse("+CMTI: \"ME\"\r\n").is_err());
    }

    #[test]
    fn test_parse_list_header() {
        let header = MessageRecordHeader::parse("+CMGL: 3,3,\"\",23\r\n", RecordPrefix::List).unwrap();
        assert_eq!(header, MessageRecordHeader { index: 3, status: Some(3) });
    }

    #[test]
    fn test_list_header_requires_status() {
        assert!(MessageRecordHeader::parse("+CMGL: 3\r\n", RecordPrefix::List).is_err());
        assert!(MessageRecordHeader::parse("+CMGL: 3,x,\"\",23\r\n", RecordPrefix::List).is_err());
    }

    #[test]
    fn test_parse_read_header_optional_status() {
        let header = MessageRecordHeader::parse("+CMGR: 5,,23\r\n", RecordPrefix::Read).unwrap();
        assert_eq!(header, MessageRecordHeader { index: 5, status: None });

        let header = MessageRecordHeader::parse("+CMGR: 5,2,\"\",23\r\n", RecordPrefix::Read).unwrap();
        assert_eq!(header.status, Some(2));
    }

    #[test]
    fn test_bad_index_names_prefix_and_line() {
        let err = MessageRecordHeader::parse("+CMGL: x,0,\"\",23\r\n", RecordPrefix::List).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("+CMGL: "));
        assert!(text.contains("x,0"));
    }
}
