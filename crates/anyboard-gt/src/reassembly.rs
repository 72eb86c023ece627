//! GT frame reassembly.
//!
//! Tokens notify in 20-byte packets. The [`Reassembler`] consumes them one
//! at a time and hands back the payload of each complete logical message.
//! It keeps at most one partial message, which is dropped as soon as a
//! packet does not continue it.

use bytes::{BufMut, BytesMut};
use tracing::warn;

use anyboard_core::{Error, Result};

use crate::checksum::checksum16;
use crate::frame::PacketHeader;

/// Whether the envelope checksum of incoming messages is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumMode {
    /// Accept messages regardless of their checksum. Matches what shipping
    /// token firmware has always been tolerated with.
    #[default]
    Lenient,
    /// Drop messages whose checksum does not match.
    Strict,
}

/// Per-token reassembly state.
#[derive(Debug)]
enum State {
    Idle,
    Assembling {
        /// Envelope bytes received so far (GT headers stripped).
        buf: BytesMut,
        /// Declared envelope size: length byte + 4.
        expected: usize,
        /// 2-bit counter shared by every packet of this message.
        counter: u8,
        /// Remaining count carried by the last accepted packet.
        remaining: u8,
    },
}

/// Incremental decoder from GT packets to message payloads.
#[derive(Debug)]
pub struct Reassembler {
    state: State,
    checksum_mode: ChecksumMode,
}

impl Reassembler {
    pub fn new(checksum_mode: ChecksumMode) -> Self {
        Reassembler {
            state: State::Idle,
            checksum_mode,
        }
    }

    /// Whether a multi-packet message is in progress.
    pub fn is_assembling(&self) -> bool {
        matches!(self.state, State::Assembling { .. })
    }

    /// Forget any partial message.
    pub fn clear(&mut self) {
        self.state = State::Idle;
    }

    /// Feed one notification packet.
    ///
    /// Returns `Ok(None)` while a message is incomplete and
    /// `Ok(Some(payload))` once it is complete. A packet that cannot belong
    /// to a valid message yields [`Error::MalformedFrame`] and leaves the
    /// reassembler idle.
    pub fn push(&mut self, packet: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some((&header_byte, body)) = packet.split_first() else {
            return Err(Error::MalformedFrame("empty packet".into()));
        };
        let header = PacketHeader::parse(header_byte);

        if header.first {
            if self.is_assembling() {
                warn!(
                    header = header_byte,
                    "new message started before the previous one completed, discarding partial message"
                );
                self.state = State::Idle;
            }
            return self.start(header, body);
        }

        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => Err(Error::MalformedFrame(format!(
                "continuation packet 0x{header_byte:02X} with no message in progress"
            ))),
            State::Assembling {
                mut buf,
                expected,
                counter,
                remaining,
            } => {
                if header.counter != counter {
                    return Err(Error::MalformedFrame(format!(
                        "counter mismatch: expected {counter}, got {}",
                        header.counter
                    )));
                }
                if u16::from(header.remaining) + 1 != u16::from(remaining) {
                    return Err(Error::MalformedFrame(format!(
                        "remaining mismatch: expected {}, got {}",
                        remaining.wrapping_sub(1),
                        header.remaining
                    )));
                }
                if buf.len() + body.len() > expected {
                    return Err(Error::MalformedFrame(format!(
                        "message overflows declared size of {expected} bytes"
                    )));
                }
                buf.put_slice(body);

                if header.remaining > 0 {
                    self.state = State::Assembling {
                        buf,
                        expected,
                        counter,
                        remaining: header.remaining,
                    };
                    return Ok(None);
                }
                self.finish(&buf).map(Some)
            }
        }
    }

    fn start(&mut self, header: PacketHeader, body: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(&length) = body.first() else {
            return Err(Error::MalformedFrame("first packet has no length byte".into()));
        };
        let expected = usize::from(length) + 4;

        if header.remaining == 0 {
            if body.len() != expected {
                return Err(Error::MalformedFrame(format!(
                    "length mismatch: declared {length}, packet carries {}",
                    body.len().saturating_sub(4)
                )));
            }
            return self.finish(body).map(Some);
        }

        if body.len() > expected {
            return Err(Error::MalformedFrame(format!(
                "first packet overflows declared size of {expected} bytes"
            )));
        }
        let mut buf = BytesMut::with_capacity(expected);
        buf.put_slice(body);
        self.state = State::Assembling {
            buf,
            expected,
            counter: header.counter,
            remaining: header.remaining,
        };
        Ok(None)
    }

    /// Validate a complete envelope and extract its payload.
    fn finish(&self, envelope: &[u8]) -> Result<Vec<u8>> {
        let length = usize::from(envelope[0]);
        if length < 2 || envelope.len() != length + 4 {
            return Err(Error::MalformedFrame(format!(
                "length mismatch: declared {length}, received {} envelope bytes",
                envelope.len()
            )));
        }
        if envelope[2] != 0 || envelope[3] != 0 {
            return Err(Error::MalformedFrame(format!(
                "unexpected message id {:02X}{:02X}",
                envelope[2], envelope[3]
            )));
        }

        let crc_at = envelope.len() - 2;
        if self.checksum_mode == ChecksumMode::Strict {
            let received = u16::from_le_bytes([envelope[crc_at], envelope[crc_at + 1]]);
            let computed = checksum16(&envelope[..crc_at]);
            if received != computed {
                return Err(Error::MalformedFrame(format!(
                    "checksum mismatch: received 0x{received:04X}, computed 0x{computed:04X}"
                )));
            }
        }

        Ok(envelope[4..crc_at].to_vec())
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(ChecksumMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{HeaderCounter, MAX_PAYLOAD_SIZE, encode_message};

    fn feed(r: &mut Reassembler, packets: &[Vec<u8>]) -> Result<Option<Vec<u8>>> {
        let mut last = Ok(None);
        for packet in packets {
            last = r.push(packet);
            if last.is_err() {
                break;
            }
        }
        last
    }

    fn assert_malformed(result: Result<Option<Vec<u8>>>) {
        assert!(
            matches!(result, Err(Error::MalformedFrame(_))),
            "expected MalformedFrame, got {result:?}"
        );
    }

    // ---------------------------------------------------------------
    // Round trips
    // ---------------------------------------------------------------

    #[test]
    fn round_trip_every_payload_length() {
        let mut counter = HeaderCounter::new();
        for mode in [ChecksumMode::Lenient, ChecksumMode::Strict] {
            let mut r = Reassembler::new(mode);
            for len in 0..=MAX_PAYLOAD_SIZE {
                let payload: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
                let packets = encode_message(&mut counter, &payload).unwrap();

                for packet in &packets[..packets.len() - 1] {
                    assert_eq!(r.push(packet).unwrap(), None, "length {len}");
                }
                let last = packets.last().unwrap();
                assert_eq!(r.push(last).unwrap(), Some(payload), "length {len}");
                assert!(!r.is_assembling());
            }
        }
    }

    #[test]
    fn single_packet_reply() {
        let mut r = Reassembler::default();
        let packet = [0x80, 0x04, 0x00, 0x00, 0x00, 0x40, 0x01, 0x5C, 0x15];
        assert_eq!(r.push(&packet).unwrap(), Some(vec![0x40, 0x01]));
    }

    #[test]
    fn two_packet_reply() {
        let mut r = Reassembler::new(ChecksumMode::Strict);
        let payload: Vec<u8> = (0..25).collect();
        let packets = encode_message(&mut HeaderCounter::new(), &payload).unwrap();
        assert_eq!(r.push(&packets[0]).unwrap(), None);
        assert!(r.is_assembling());
        assert_eq!(r.push(&packets[1]).unwrap(), Some(payload));
    }

    // ---------------------------------------------------------------
    // Rejections
    // ---------------------------------------------------------------

    #[test]
    fn counter_mismatch_drops_message() {
        let mut r = Reassembler::default();
        let payload = [0xAB; 30];
        let mut packets = encode_message(&mut HeaderCounter::new(), &payload).unwrap();
        // Flip the counter bits of the continuation packet.
        packets[1][0] ^= 0x20;

        assert_eq!(r.push(&packets[0]).unwrap(), None);
        assert_malformed(r.push(&packets[1]));
        assert!(!r.is_assembling());

        // The next message decodes normally.
        let next = encode_message(&mut HeaderCounter::new(), &[0x20]).unwrap();
        assert_eq!(feed(&mut r, &next).unwrap(), Some(vec![0x20]));
    }

    #[test]
    fn skipped_packet_drops_message() {
        let mut r = Reassembler::default();
        let packets = encode_message(&mut HeaderCounter::new(), &[0x11; 50]).unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(r.push(&packets[0]).unwrap(), None);
        assert_malformed(r.push(&packets[2]));
        assert!(!r.is_assembling());
    }

    #[test]
    fn length_mismatch_in_single_packet() {
        let mut r = Reassembler::default();
        // Declares 5 but only carries a 2-byte body.
        let packet = [0x80, 0x05, 0x00, 0x00, 0x00, 0x40, 0x01, 0x5C, 0x15];
        assert_malformed(r.push(&packet));
    }

    #[test]
    fn nonzero_message_id_rejected() {
        let mut r = Reassembler::default();
        let packet = [0x80, 0x04, 0x00, 0x01, 0x00, 0x40, 0x01, 0x5C, 0x15];
        assert_malformed(r.push(&packet));
    }

    #[test]
    fn empty_and_stray_packets_rejected() {
        let mut r = Reassembler::default();
        assert_malformed(r.push(&[]));
        assert_malformed(r.push(&[0x00, 0x01, 0x02]));
        assert_malformed(r.push(&[0x80]));
        assert!(!r.is_assembling());
    }

    #[test]
    fn new_first_packet_restarts_assembly() {
        let mut r = Reassembler::default();
        let mut counter = HeaderCounter::new();
        let abandoned = encode_message(&mut counter, &[0x22; 20]).unwrap();
        let complete = encode_message(&mut counter, &[0x20, b'A']).unwrap();

        assert_eq!(r.push(&abandoned[0]).unwrap(), None);
        assert_eq!(feed(&mut r, &complete).unwrap(), Some(vec![0x20, b'A']));
        assert!(!r.is_assembling());
    }

    #[test]
    fn overflow_past_declared_size_rejected() {
        let mut r = Reassembler::default();
        let mut packets = encode_message(&mut HeaderCounter::new(), &[0x33; 20]).unwrap();
        packets[1].extend_from_slice(&[0u8; 5]);
        assert_eq!(r.push(&packets[0]).unwrap(), None);
        assert_malformed(r.push(&packets[1]));
    }

    // ---------------------------------------------------------------
    // Checksum modes
    // ---------------------------------------------------------------

    #[test]
    fn corrupted_checksum() {
        let corrupted = [0x80, 0x04, 0x00, 0x00, 0x00, 0x40, 0x01, 0x00, 0x00];

        let mut lenient = Reassembler::new(ChecksumMode::Lenient);
        assert_eq!(lenient.push(&corrupted).unwrap(), Some(vec![0x40, 0x01]));

        let mut strict = Reassembler::new(ChecksumMode::Strict);
        assert_malformed(strict.push(&corrupted));
    }

    #[test]
    fn strict_mode_checks_multi_packet_messages() {
        let mut packets = encode_message(&mut HeaderCounter::new(), &[0x44; 25]).unwrap();
        packets[0][10] ^= 0xFF;

        let mut strict = Reassembler::new(ChecksumMode::Strict);
        assert_malformed(feed(&mut strict, &packets));

        let mut lenient = Reassembler::new(ChecksumMode::Lenient);
        let payload = feed(&mut lenient, &packets).unwrap().unwrap();
        assert_eq!(payload.len(), 25);
    }

    #[test]
    fn clear_discards_partial_message() {
        let mut r = Reassembler::default();
        let packets = encode_message(&mut HeaderCounter::new(), &[0x55; 20]).unwrap();
        r.push(&packets[0]).unwrap();
        r.clear();
        assert!(!r.is_assembling());
        assert_malformed(r.push(&packets[1]));
    }
}
