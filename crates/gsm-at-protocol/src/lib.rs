//! GSM Modem AT Protocol
//!
//! This crate provides types and utilities for talking to a cellular modem over
//! its serial AT command interface. It does no I/O of its own: it turns received
//! bytes into classified lines and turns commands into bytes.
//!
//! # Protocol Overview
//!
//! The AT protocol is a line-based text interface:
//!
//! - **Commands** (host → modem): Text commands terminated with `\r\n`
//! - **Responses** (modem → host): Zero or more lines followed by a terminal
//!   marker line (`OK`, `ERROR` or `COMMAND NOT SUPPORT`)
//! - **Unsolicited lines** (modem → host): Lines the modem sends on its own,
//!   either status chatter prefixed with `^` or notifications such as `+CMTI:`
//!
//! Every line keeps its `\r\n` terminator so terminal markers can be compared
//! verbatim.
//!
//! # Example
//!
//! ```rust,ignore
//! use gsm_at_protocol::{Command, LineCodec, LineKind, TerminalMarker};
//!
//! // Build a command
//! let bytes = Command::ReadMessage { index: 7 }.encode();
//!
//! // Split received bytes into lines
//! let mut codec = LineCodec::new();
//! codec.push(b"+CMTI: \"ME\",7\r\nOK\r\n");
//! while let Some(line) = codec.decode_line() {
//!     match LineKind::classify(&line) {
//!         LineKind::NewMessage => { /* notification */ }
//!         LineKind::Status => {}
//!         LineKind::Sync => { let _ = TerminalMarker::classify(&line); }
//!     }
//! }
//! ```

mod codec;
mod commands;
mod error;
mod responses;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use responses::*;
