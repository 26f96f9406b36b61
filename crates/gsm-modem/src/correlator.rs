//! Command correlator.
//!
//! The only writer of commands. One command is in flight at a time: the
//! command channel lock is held from the write until a terminal marker (or the
//! end of the response queue) has been read, so responses are never split
//! across callers.

use std::sync::Arc;

use gsm_at_protocol::{LineCodec, TerminalMarker};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

use crate::error::{ModemError, Result};
use crate::link::LinkState;
use crate::telemetry;

/// Lines returned for a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    /// Every line read, including the final `OK\r\n`.
    pub lines: Vec<String>,
}

impl CommandResponse {
    /// Lines other than blanks and the terminal marker, terminators stripped.
    pub fn body(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|l| TerminalMarker::classify(l).is_none())
            .map(|l| l.trim_end_matches(&['\r', '\n'][..]))
            .filter(|l| !l.is_empty())
    }
}

/// Writer half of the transport plus the response queue it is paired with.
struct CommandChannel {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    lines: mpsc::Receiver<String>,
}

/// Serializes commands onto the transport and collects their responses.
pub struct Correlator {
    channel: Mutex<CommandChannel>,
    link: Arc<LinkState>,
}

impl Correlator {
    /// Create a correlator writing to `writer` and reading `lines`.
    pub fn new(
        writer: Box<dyn AsyncWrite + Send + Unpin>,
        lines: mpsc::Receiver<String>,
        link: Arc<LinkState>,
    ) -> Self {
        Correlator {
            channel: Mutex::new(CommandChannel { writer, lines }),
            link,
        }
    }

    /// Send `command` and read until a terminal marker.
    ///
    /// Never times out on its own; wrap the call if a deadline is needed.
    pub async fn execute(&self, command: &str) -> Result<CommandResponse> {
        let mut channel = self.channel.lock().await;

        // Anything queued now arrived while no command was waiting.
        while let Ok(stale) = channel.lines.try_recv() {
            debug!(line = stale.trim_end(), "discarding stale response line");
            self.link.record_drop();
        }

        // Response lines wait for room from here until the guard drops.
        let _in_flight = self.link.begin_command();
        trace!(command, "sending command");
        let frame = LineCodec::encode_command(command);
        if let Err(e) = write_frame(channel.writer.as_mut(), &frame).await {
            record_outcome("write_error");
            return Err(ModemError::transport(e));
        }

        let mut lines = Vec::with_capacity(2);
        loop {
            let Some(line) = channel.lines.recv().await else {
                record_outcome("closed");
                return Err(self.link.closed_error());
            };
            let marker = TerminalMarker::classify(&line);
            lines.push(line);

            match marker {
                None => continue,
                Some(TerminalMarker::Ok) => {
                    record_outcome("ok");
                    return Ok(CommandResponse { lines });
                }
                Some(TerminalMarker::Error) => {
                    record_outcome("error");
                    return Err(ModemError::CommandRejected {
                        command: command.to_string(),
                        lines,
                    });
                }
                Some(TerminalMarker::NotSupported) => {
                    record_outcome("not_supported");
                    return Err(ModemError::CommandNotSupported {
                        command: command.to_string(),
                        lines,
                    });
                }
            }
        }
    }
}

async fn write_frame(
    writer: &mut (dyn AsyncWrite + Send + Unpin),
    frame: &[u8],
) -> std::io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

fn record_outcome(outcome: &'static str) {
    metrics::counter!(telemetry::COMMANDS_ISSUED.name, "outcome" => outcome).increment(1);
}
