//! Shared state of the transport link.
//!
//! Written by the line splitter, read by the correlator and the session.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::ModemError;
use crate::telemetry;

/// Latched read error and drop accounting for one session.
#[derive(Debug, Default)]
pub struct LinkState {
    /// First transport read error. Never overwritten.
    read_error: OnceLock<Arc<io::Error>>,
    /// Response lines discarded by the overflow policy or as stale.
    dropped_lines: AtomicU64,
    /// Set while a command is waiting for its terminal marker.
    command_in_flight: AtomicBool,
}

impl LinkState {
    /// Create a new link state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read error. Only the first one sticks.
    pub fn record_error(&self, err: io::Error) {
        if self.read_error.set(Arc::new(err)).is_err() {
            tracing::trace!("transport error already latched");
        }
    }

    /// Get the latched read error.
    pub fn read_error(&self) -> Option<Arc<io::Error>> {
        self.read_error.get().cloned()
    }

    /// The error a caller sees once the response queue has closed.
    pub fn closed_error(&self) -> ModemError {
        match self.read_error.get() {
            Some(err) => ModemError::Transport(err.clone()),
            None => ModemError::ConnectionClosed,
        }
    }

    /// Count a discarded response line.
    pub fn record_drop(&self) {
        self.dropped_lines.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::LINES_DROPPED.name).increment(1);
    }

    /// Number of response lines discarded so far.
    pub fn dropped_lines(&self) -> u64 {
        self.dropped_lines.load(Ordering::Relaxed)
    }

    /// Mark a command as waiting for its response until the guard is dropped.
    pub fn begin_command(&self) -> InFlight<'_> {
        self.command_in_flight.store(true, Ordering::Release);
        InFlight { link: self }
    }

    /// Check whether a command is waiting for its response.
    pub fn command_in_flight(&self) -> bool {
        self.command_in_flight.load(Ordering::Acquire)
    }
}

/// Clears the in-flight flag on drop, including when the command future is
/// dropped before completing.
pub struct InFlight<'a> {
    link: &'a LinkState,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.link.command_in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_wins() {
        let link = LinkState::new();
        assert!(matches!(link.closed_error(), ModemError::ConnectionClosed));

        link.record_error(io::Error::new(io::ErrorKind::UnexpectedEof, "first"));
        link.record_error(io::Error::new(io::ErrorKind::BrokenPipe, "second"));

        let err = link.read_error().expect("error latched");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(matches!(link.closed_error(), ModemError::Transport(e) if e.to_string() == "first"));
    }

    #[test]
    fn test_drop_counter() {
        let link = LinkState::new();
        link.record_drop();
        link.record_drop();
        assert_eq!(link.dropped_lines(), 2);
    }

    #[test]
    fn test_in_flight_guard() {
        let link = LinkState::new();
        assert!(!link.command_in_flight());
        {
            let _guard = link.begin_command();
            assert!(link.command_in_flight());
        }
        assert!(!link.command_in_flight());
    }
}
