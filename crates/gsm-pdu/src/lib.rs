//! SMS PDU decoding.
//!
//! Modems in PDU mode (`AT+CMFG=0`) return stored messages as hex strings. This
//! crate unwraps the hex into the service centre address and the TPDU, then
//! decodes the TPDU into the address, timestamp and text the session needs.
//!
//! The session only depends on the [`PduDecoder`] trait; [`GsmPduDecoder`] is
//! the implementation it uses unless told otherwise.
//!
//! ```rust
//! use gsm_pdu::{GsmPduDecoder, OriginHint, PduDecoder};
//!
//! let pdu = GsmPduDecoder
//!     .decode(
//!         "0011000B916407281553F80000AA0AE8329BFD4697D9EC37",
//!         OriginHint::MobileOriginated,
//!     )
//!     .unwrap();
//! assert_eq!(pdu.address, "+46708251358");
//! assert_eq!(pdu.body, "hellohello");
//! ```

mod codec;
mod error;
mod gsm7;
mod types;

pub use codec::{decode_hex, decode_tpdu, unwrap_hex, GsmPduDecoder};
pub use error::PduError;
pub use types::{DecodedPdu, Direction, OriginHint, PduDecoder, PduEnvelope};
