//! Line-based codec for AT communication.
//!
//! The modem sends text lines terminated with `\n` (normally `\r\n`). Commands
//! are sent terminated with `\r\n`. Lines are handed out with their terminator
//! intact because terminal markers are matched verbatim.

use bytes::BytesMut;

/// Maximum line length before an unterminated line is forced out.
///
/// Long enough for the hex payload of a full 176-byte PDU plus its SMSC prefix.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Terminator appended to every command.
pub const COMMAND_TERMINATOR: &[u8] = b"\r\n";

/// Prefix of modem status chatter (`^RSSI:`, `^BOOT:`, ...).
pub const STATUS_PREFIX: &str = "^";

/// Prefix of the new-message notification.
pub const NEW_MESSAGE_PREFIX: &str = "+CMTI:";

/// How a received line is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Part of the response to the in-flight command.
    Sync,
    /// Unsolicited status chatter, no consumer.
    Status,
    /// Unsolicited new-message notification.
    NewMessage,
}

impl LineKind {
    /// Classify a line by its prefix.
    pub fn classify(line: &str) -> LineKind {
        if line.starts_with(STATUS_PREFIX) {
            LineKind::Status
        } else if line.starts_with(NEW_MESSAGE_PREFIX) {
            LineKind::NewMessage
        } else {
            LineKind::Sync
        }
    }

    /// Whether the line is unsolicited.
    pub fn is_async(&self) -> bool {
        !matches!(self, LineKind::Sync)
    }
}

/// A codec for splitting the modem byte stream into lines.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// Returns the line including its `\n` terminator, or `None` if more data
    /// is needed. A buffer that grows past [`MAX_LINE_LENGTH`] without a
    /// terminator is returned as-is so the reader never stalls on garbage.
    pub fn decode_line(&mut self) -> Option<String> {
        let end = match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None if self.buffer.len() >= MAX_LINE_LENGTH => {
                log::warn!(
                    "line exceeded {} bytes without a terminator, flushing",
                    MAX_LINE_LENGTH
                );
                self.buffer.len()
            }
            None => return None,
        };

        let line_data = self.buffer.split_to(end);
        Some(String::from_utf8_lossy(&line_data).into_owned())
    }

    /// Encode a command for transmission.
    ///
    /// Appends the `\r\n` terminator.
    pub fn encode_command(cmd: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + COMMAND_TERMINATOR.len());
        buf.extend_from_slice(cmd.as_bytes());
        buf.extend_from_slice(COMMAND_TERMINATOR);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Strip the trailing line terminator (`\r\n` or `\n`) from a line.
pub fn trim_terminator(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}
