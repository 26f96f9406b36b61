//! PDU decoding.
//!
//! A PDU-mode modem hands out messages as hex strings made of a service
//! centre address followed by the TPDU (3GPP TS 23.040).
//!
//! ## SMS-DELIVER (mobile-terminated)
//!
//! | Field | Size (bytes) | Description                          |
//! |-------|--------------|--------------------------------------|
//! | FO    | 1            | First octet: MTI, UDHI, ...          |
//! | OA    | 2-12         | Originating address                  |
//! | PID   | 1            | Protocol identifier                  |
//! | DCS   | 1            | Data coding scheme                   |
//! | SCTS  | 7            | Service centre timestamp             |
//! | UDL   | 1            | User data length (septets or octets) |
//! | UD    | 0-140        | User data                            |
//!
//! ## SMS-SUBMIT (mobile-originated)
//!
//! FO, MR(1), DA(2-12), PID, DCS, VP(0, 1 or 7 depending on FO), UDL, UD.

use chrono::{FixedOffset, NaiveDate, TimeZone};

use crate::{gsm7, DecodedPdu, Direction, OriginHint, PduDecoder, PduEnvelope, PduError};

/// TP-MTI value of SMS-DELIVER.
const MTI_DELIVER: u8 = 0x00;
/// TP-MTI value of SMS-SUBMIT.
const MTI_SUBMIT: u8 = 0x01;
/// TP-UDHI bit in the first octet.
const FO_UDHI: u8 = 0x40;
/// Type-of-number for international numbers.
const TON_INTERNATIONAL: u8 = 0x01;
/// Type-of-number for alphanumeric addresses.
const TON_ALPHANUMERIC: u8 = 0x05;

/// User data alphabet selected by the DCS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alphabet {
    Gsm7,
    EightBit,
    Ucs2,
}

impl Alphabet {
    fn from_dcs(dcs: u8) -> Alphabet {
        match dcs & 0xF0 {
            // General data coding groups, bits 3..2 select the alphabet.
            0x00..=0x70 => match (dcs >> 2) & 0x03 {
                1 => Alphabet::EightBit,
                2 => Alphabet::Ucs2,
                _ => Alphabet::Gsm7,
            },
            0xE0 => Alphabet::Ucs2,
            0xF0 if dcs & 0x04 != 0 => Alphabet::EightBit,
            _ => Alphabet::Gsm7,
        }
    }
}

/// Bounds-checked cursor over the TPDU bytes.
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, offset: 0 }
    }

    fn byte(&mut self, what: &str) -> Result<u8, PduError> {
        let b = *self
            .data
            .get(self.offset)
            .ok_or_else(|| PduError::decode_at(self.offset, format!("Not enough data for {}", what)))?;
        self.offset += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], PduError> {
        if self.offset + len > self.data.len() {
            return Err(PduError::decode_at(
                self.offset,
                format!(
                    "Not enough data for {}: need {} bytes, have {}",
                    what,
                    len,
                    self.data.len() - self.offset
                ),
            ));
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }
}

/// Convert the hex string to bytes and split off the service centre address.
pub fn unwrap_hex(hex_pdu: &str) -> Result<PduEnvelope, PduError> {
    let bytes = hex::decode(hex_pdu.trim()).map_err(|e| PduError::InvalidHex(e.to_string()))?;
    let mut reader = Reader::new(&bytes);

    let smsc_len = reader.byte("SMSC length")? as usize;
    let smsc = if smsc_len == 0 {
        None
    } else {
        let toa = reader.byte("SMSC type of address")?;
        let digits = reader.take(smsc_len - 1, "SMSC address")?;
        Some(format_number(toa, &semi_octets(digits)))
    };

    Ok(PduEnvelope {
        smsc,
        tpdu: reader.rest().to_vec(),
    })
}

/// Decode a TPDU as SMS-DELIVER or SMS-SUBMIT according to `hint`.
pub fn decode_tpdu(tpdu: &[u8], hint: OriginHint) -> Result<DecodedPdu, PduError> {
    let mut reader = Reader::new(tpdu);
    let fo = reader.byte("first octet")?;
    let mti = fo & 0x03;

    match (hint, mti) {
        (OriginHint::MobileTerminated, MTI_DELIVER) => decode_deliver(fo, &mut reader),
        (OriginHint::MobileOriginated, MTI_SUBMIT) => decode_submit(fo, &mut reader),
        _ => Err(PduError::UnsupportedMessageType {
            mti,
            origin: hint.as_str(),
        }),
    }
}

/// Full decode of a hex PDU line.
pub fn decode_hex(hex_pdu: &str, hint: OriginHint) -> Result<DecodedPdu, PduError> {
    let envelope = unwrap_hex(hex_pdu)?;
    let mut decoded = decode_tpdu(&envelope.tpdu, hint)?;
    decoded.smsc = envelope.smsc;
    Ok(decoded)
}

fn decode_deliver(fo: u8, reader: &mut Reader<'_>) -> Result<DecodedPdu, PduError> {
    let address = decode_address(reader)?;
    let _pid = reader.byte("PID")?;
    let dcs = reader.byte("DCS")?;
    let scts = reader.take(7, "SCTS")?;
    let timestamp = decode_timestamp(scts)?;
    let body = decode_user_data(fo, dcs, reader)?;

    Ok(DecodedPdu {
        address,
        timestamp: Some(timestamp),
        body,
        direction: Direction::MobileTerminated,
        smsc: None,
    })
}

fn decode_submit(fo: u8, reader: &mut Reader<'_>) -> Result<DecodedPdu, PduError> {
    let _mr = reader.byte("message reference")?;
    let address = decode_address(reader)?;
    let _pid = reader.byte("PID")?;
    let dcs = reader.byte("DCS")?;
    match (fo >> 3) & 0x03 {
        0 => {}
        2 => {
            reader.byte("validity period")?;
        }
        _ => {
            reader.take(7, "validity period")?;
        }
    }
    let body = decode_user_data(fo, dcs, reader)?;

    Ok(DecodedPdu {
        address,
        timestamp: None,
        body,
        direction: Direction::MobileOriginated,
        smsc: None,
    })
}

/// Decode an OA/DA field: length in semi-octets, type of address, digits.
fn decode_address(reader: &mut Reader<'_>) -> Result<String, PduError> {
    let digit_count = reader.byte("address length")? as usize;
    let toa = reader.byte("type of address")?;
    let data = reader.take(digit_count.div_ceil(2), "address")?;

    if (toa >> 4) & 0x07 == TON_ALPHANUMERIC {
        return Ok(gsm7::decode(data, digit_count * 4 / 7, 0));
    }

    let mut digits = semi_octets(data);
    digits.truncate(digit_count);
    Ok(format_number(toa, &digits))
}

/// Swapped-nibble digits, stopping at the `F` filler.
fn semi_octets(data: &[u8]) -> String {
    let mut digits = String::with_capacity(data.len() * 2);
    for &b in data {
        for nibble in [b & 0x0F, b >> 4] {
            match nibble {
                0..=9 => digits.push((b'0' + nibble) as char),
                0x0A => digits.push('*'),
                0x0B => digits.push('#'),
                0x0C => digits.push('a'),
                0x0D => digits.push('b'),
                0x0E => digits.push('c'),
                _ => return digits,
            }
        }
    }
    digits
}

fn format_number(toa: u8, digits: &str) -> String {
    if (toa >> 4) & 0x07 == TON_INTERNATIONAL {
        format!("+{}", digits)
    } else {
        digits.to_string()
    }
}

fn swapped_bcd(b: u8) -> u32 {
    (b & 0x0F) as u32 * 10 + (b >> 4) as u32
}

/// Decode a 7-byte service centre timestamp.
fn decode_timestamp(scts: &[u8]) -> Result<chrono::DateTime<FixedOffset>, PduError> {
    let year = 2000 + swapped_bcd(scts[0]) as i32;
    let month = swapped_bcd(scts[1]);
    let day = swapped_bcd(scts[2]);
    let hour = swapped_bcd(scts[3]);
    let minute = swapped_bcd(scts[4]);
    let second = swapped_bcd(scts[5]);

    // Time zone in quarter hours; bit 3 is the sign.
    let tz = scts[6];
    let quarters = ((tz & 0x07) as i32) * 10 + (tz >> 4) as i32;
    let quarters = if tz & 0x08 != 0 { -quarters } else { quarters };
    let offset_secs = quarters * 15 * 60;

    let offset = FixedOffset::east_opt(offset_secs)
        .ok_or_else(|| PduError::invalid_field("timestamp", format!("offset {} seconds", offset_secs)))?;
    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| {
            PduError::invalid_field(
                "timestamp",
                format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", year, month, day, hour, minute, second),
            )
        })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| PduError::invalid_field("timestamp", "ambiguous local time"))
}

/// Decode UDL + UD, skipping a user data header when UDHI is set.
fn decode_user_data(fo: u8, dcs: u8, reader: &mut Reader<'_>) -> Result<String, PduError> {
    let udl = reader.byte("user data length")? as usize;
    let alphabet = Alphabet::from_dcs(dcs);
    let has_header = fo & FO_UDHI != 0;

    match alphabet {
        Alphabet::Gsm7 => {
            let data = reader.take((udl * 7).div_ceil(8), "user data")?;
            let header_septets = if has_header {
                let udhl = *data
                    .first()
                    .ok_or_else(|| PduError::decode_at(reader.offset, "Missing user data header"))?
                    as usize;
                ((udhl + 1) * 8).div_ceil(7)
            } else {
                0
            };
            let count = udl.saturating_sub(header_septets);
            Ok(gsm7::decode(data, count, header_septets * 7))
        }
        Alphabet::EightBit | Alphabet::Ucs2 => {
            let data = reader.take(udl, "user data")?;
            let skip = if has_header {
                let udhl = *data
                    .first()
                    .ok_or_else(|| PduError::decode_at(reader.offset, "Missing user data header"))?
                    as usize;
                (udhl + 1).min(data.len())
            } else {
                0
            };
            let text = &data[skip..];
            if alphabet == Alphabet::Ucs2 {
                let units: Vec<u16> = text
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                Ok(String::from_utf16_lossy(&units))
            } else {
                Ok(String::from_utf8_lossy(text).into_owned())
            }
        }
    }
}

/// The default decoder: GSM 03.40 TPDUs with GSM 7-bit, 8-bit and UCS-2 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct GsmPduDecoder;

impl PduDecoder for GsmPduDecoder {
    fn decode(&self, hex: &str, hint: OriginHint) -> Result<DecodedPdu, PduError> {
        decode_hex(hex, hint)
    }
}
