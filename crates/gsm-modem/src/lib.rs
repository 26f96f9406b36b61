//! GSM Modem Session
//!
//! Multiplexes one AT command channel between request/response commands and
//! unsolicited notifications.
//!
//! # Architecture
//!
//! ```text
//! transport ──► LineSplitter ──┬─► response queue ──► Correlator ◄── Session::execute
//!                              │                          ▲
//!                              └─► notification queue ──► Dispatcher ──► subscribers
//!                                                         (read one, fan out)
//! ```
//!
//! - the line splitter cuts the byte stream into lines and routes them by prefix
//! - the correlator writes one command at a time and collects its response
//! - the dispatcher fetches each newly stored message and delivers it
//! - [`registry`] tracks subscribers and their cancellation tokens
//! - [`messages`] turns `+CMGL`/`+CMGR` responses into [`Message`]s
//!
//! A transport failure (or an orderly close) ends the session. The first such
//! error is kept and returned to every command issued afterwards.

pub mod config;
mod correlator;
mod dispatcher;
pub mod error;
mod link;
pub mod messages;
pub mod registry;
mod session;
mod splitter;
pub mod telemetry;
pub mod transport;

pub use config::{ModemConfig, OverflowPolicy};
pub use correlator::CommandResponse;
pub use error::{ModemError, Result};
pub use messages::{parse_messages, Message, MessageStatus};
pub use registry::{AsyncEvent, EventKind, EventMask};
pub use session::Session;
pub use telemetry::describe_metrics;

pub use gsm_at_protocol::{Command, RecordPrefix};
pub use gsm_pdu::{Direction, GsmPduDecoder, OriginHint, PduDecoder};
