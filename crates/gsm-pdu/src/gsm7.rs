//! GSM 7-bit default alphabet (3GPP TS 23.038).

/// Escape to the extension table.
const ESCAPE: u8 = 0x1B;

/// Basic character set, indexed by septet value.
#[rustfmt::skip]
const BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', ' ', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

/// Look up a septet that followed an escape.
fn extension(septet: u8) -> Option<char> {
    match septet {
        0x0A => Some('\u{0C}'),
        0x14 => Some('^'),
        0x28 => Some('{'),
        0x29 => Some('}'),
        0x2F => Some('\\'),
        0x3C => Some('['),
        0x3D => Some('~'),
        0x3E => Some(']'),
        0x40 => Some('|'),
        0x65 => Some('€'),
        _ => None,
    }
}

/// Unpack `count` septets from packed data, starting `skip_bits` into it.
///
/// Septets that would run past the end of `data` are not produced.
pub fn unpack_septets(data: &[u8], count: usize, skip_bits: usize) -> Vec<u8> {
    let mut septets = Vec::with_capacity(count);
    for i in 0..count {
        let bit = skip_bits + i * 7;
        let byte = bit / 8;
        let shift = bit % 8;
        if byte >= data.len() {
            break;
        }
        let mut value = (data[byte] as u16) >> shift;
        if shift > 1 {
            match data.get(byte + 1) {
                Some(&next) => value |= (next as u16) << (8 - shift),
                None => break,
            }
        }
        septets.push((value & 0x7F) as u8);
    }
    septets
}

/// Map unpacked septets to text.
pub fn septets_to_string(septets: &[u8]) -> String {
    let mut text = String::with_capacity(septets.len());
    let mut iter = septets.iter().copied();
    while let Some(septet) = iter.next() {
        if septet == ESCAPE {
            match iter.next() {
                Some(ext) => text.push(extension(ext).unwrap_or(BASIC[(ext & 0x7F) as usize])),
                None => break,
            }
        } else {
            text.push(BASIC[(septet & 0x7F) as usize]);
        }
    }
    text
}

/// Unpack and map in one step.
pub fn decode(data: &[u8], count: usize, skip_bits: usize) -> String {
    septets_to_string(&unpack_septets(data, count, skip_bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_packed_text() {
        let data = hex::decode("C8F71D14969741F977FD07").unwrap();
        assert_eq!(decode(&data, 12, 0), "How are you?");
    }

    #[test]
    fn test_unpack_stops_at_end_of_data() {
        let data = [0x41];
        assert_eq!(unpack_septets(&data, 3, 0), vec![0x41]);
    }

    #[test]
    fn test_extension_table() {
        assert_eq!(septets_to_string(&[0x1B, 0x65, 0x31]), "€1");
        assert_eq!(septets_to_string(&[0x1B, 0x28, 0x1B, 0x29]), "{}");
        assert_eq!(septets_to_string(&[0x00, 0x02]), "@$");
    }
}
