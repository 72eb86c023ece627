//! 16-bit checksum carried at the end of every GT message.
//!
//! The checksum is CRC-16/CCITT (polynomial `0x1021`, seed `0xFFFF`)
//! computed with the byte-swapping shift/XOR formulation used by the token
//! firmware. It can be computed in several passes by feeding the result of
//! one pass in as the seed of the next, which is how the encoder covers the
//! envelope header and the payload without copying them together.

/// Initial value of a fresh checksum.
pub const CHECKSUM_SEED: u16 = 0xFFFF;

/// Compute the checksum of `data` starting from [`CHECKSUM_SEED`].
///
/// # Example
///
/// ```
/// use anyboard_gt::checksum::checksum16;
///
/// assert_eq!(checksum16(b"123456789"), 0x29B1);
/// ```
pub fn checksum16(data: &[u8]) -> u16 {
    checksum16_with_seed(data, CHECKSUM_SEED)
}

/// Continue a checksum over `data` from a previous result.
///
/// `checksum16_with_seed(b, checksum16(a))` equals the checksum of `a`
/// followed by `b`.
pub fn checksum16_with_seed(data: &[u8], seed: u16) -> u16 {
    data.iter().fold(seed, |crc, &byte| {
        let mut crc = crc.swap_bytes();
        crc ^= u16::from(byte);
        crc ^= (crc & 0xFF) >> 4;
        crc ^= (crc << 8) << 4;
        crc ^= ((crc & 0xFF) << 4) << 1;
        crc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_seed() {
        assert_eq!(checksum16(&[]), 0xFFFF);
        assert_eq!(checksum16_with_seed(&[], 0x1234), 0x1234);
    }

    #[test]
    fn single_byte_vectors() {
        assert_eq!(checksum16(&[0x00]), 0xE1F0);
        assert_eq!(checksum16(&[0x20]), 0xC592);
        assert_eq!(checksum16(&[0xAA]), 0xF550);
    }

    #[test]
    fn standard_check_string() {
        assert_eq!(checksum16(b"123456789"), 0x29B1);
    }

    #[test]
    fn full_packet_payload() {
        let data: Vec<u8> = (1..=19).collect();
        assert_eq!(checksum16(&data), 0x1FAD);
    }

    #[test]
    fn two_passes_match_one_pass() {
        // Envelope header of a GET_NAME request, then its payload.
        let header = [0x03, 0x00, 0x00, 0x00];
        let payload = [0x20];
        let first = checksum16(&header);
        assert_eq!(first, 0x1F1C);
        assert_eq!(checksum16_with_seed(&payload, first), 0xDBBC);

        let joined = [0x03, 0x00, 0x00, 0x00, 0x20];
        assert_eq!(checksum16(&joined), 0xDBBC);
    }
}
