//! GT frame encoder.
//!
//! Token messages travel as a logical *envelope* cut into 20-byte BLE
//! packets, each starting with a one-byte GT header. This module handles the
//! pure byte-level encoding; reassembly lives in [`crate::reassembly`].
//!
//! # Envelope format
//!
//! ```text
//! <length> <reserved> <msg id hi> <msg id lo> [<payload>...] <crc lo> <crc hi>
//! ```
//!
//! - `length`: payload length + 2 (the message id bytes)
//! - `reserved`: always `0x00`
//! - message id: always `0x0000` for token commands
//! - checksum: [`checksum16`](crate::checksum::checksum16) over the four
//!   header bytes, then the payload, little-endian on the wire
//!
//! # GT header
//!
//! ```text
//!   bit 7    bits 6-5    bits 4-0
//! [ first ][ counter ][ remaining ]
//! ```
//!
//! - `first`: set only on the first packet of a message
//! - `counter`: 2-bit rolling message counter, the same for every packet of
//!   one message
//! - `remaining`: packets still to come after this one (0 on the last)

use bytes::{BufMut, BytesMut};

use anyboard_core::{BLE_PACKET_SIZE, Error, Result};

use crate::checksum::{checksum16, checksum16_with_seed};

/// Payload bytes per packet once the GT header is taken out.
pub const PACKET_PAYLOAD_SIZE: usize = BLE_PACKET_SIZE - 1;

/// Envelope bytes surrounding the payload: length, reserved, message id,
/// checksum.
pub const ENVELOPE_OVERHEAD: usize = 6;

/// Hard cap on the size of one envelope.
pub const MAX_ENVELOPE_SIZE: usize = 64;

/// Largest payload that fits in one message.
pub const MAX_PAYLOAD_SIZE: usize = MAX_ENVELOPE_SIZE - ENVELOPE_OVERHEAD;

/// Largest application segment that still fits in a single packet once
/// wrapped in an envelope. Used by transports that only accept
/// single-packet writes.
pub const SINGLE_PACKET_SEGMENT: usize = PACKET_PAYLOAD_SIZE - ENVELOPE_OVERHEAD;

/// Header bit marking the first packet of a message.
pub const FIRST_PACKET_FLAG: u8 = 0x80;

/// Header bits holding the 2-bit message counter.
pub const COUNTER_MASK: u8 = 0x60;

/// Header bits holding the remaining-packet count.
pub const REMAINING_MASK: u8 = 0x1F;

/// Step between consecutive counter values (one unit of the 2-bit field).
const COUNTER_STEP: u8 = 0x20;

/// One encoded BLE packet: a GT header followed by up to 19 bytes.
pub type Packet = Vec<u8>;

/// Per-token rolling header counter for outgoing messages.
///
/// Holds the base value of the next message's first header. It stays in
/// `0x80..=0xE0`, moving in steps of `0x20` and wrapping back to `0x80`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderCounter(u8);

impl HeaderCounter {
    /// Counter value of a freshly connected token.
    pub const INITIAL: u8 = 0x80;

    pub fn new() -> Self {
        HeaderCounter(Self::INITIAL)
    }

    /// Current base value.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Produce the header for a packet with `remaining` packets after it,
    /// starting at byte `pos` of the message buffer.
    ///
    /// Assigning the last header of a message (`remaining == 0`) moves the
    /// counter on to the next message.
    pub fn next_header(&mut self, remaining: u8, pos: usize) -> u8 {
        let mut header = self.0.wrapping_add(remaining);
        if remaining == 0 {
            self.advance();
        }
        if pos != 0 {
            header &= !FIRST_PACKET_FLAG;
        }
        header
    }

    fn advance(&mut self) {
        self.0 = self.0.wrapping_add(COUNTER_STEP);
        if self.0 < Self::INITIAL {
            self.0 = Self::INITIAL;
        }
    }
}

impl Default for HeaderCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A parsed GT header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// First packet of a message.
    pub first: bool,
    /// 2-bit rolling message counter (0..=3).
    pub counter: u8,
    /// Packets still to come after this one.
    pub remaining: u8,
}

impl PacketHeader {
    pub fn parse(byte: u8) -> Self {
        PacketHeader {
            first: byte & FIRST_PACKET_FLAG != 0,
            counter: (byte & COUNTER_MASK) >> 5,
            remaining: byte & REMAINING_MASK,
        }
    }
}

/// Number of packets needed for a payload of `payload_len` bytes.
pub fn packet_count(payload_len: usize) -> usize {
    (payload_len + ENVELOPE_OVERHEAD).div_ceil(PACKET_PAYLOAD_SIZE)
}

/// Wrap `payload` in an envelope (length, reserved, message id, checksum).
pub fn encode_envelope(payload: &[u8]) -> Result<BytesMut> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut buf = BytesMut::with_capacity(payload.len() + ENVELOPE_OVERHEAD);
    buf.put_u8((payload.len() + 2) as u8);
    buf.put_u8(0x00);
    buf.put_u16(0x0000);

    // Two passes: envelope header first, then the payload.
    let crc = checksum16(&buf[..4]);
    let crc = checksum16_with_seed(payload, crc);

    buf.put_slice(payload);
    buf.put_u16_le(crc);
    Ok(buf)
}

/// Encode `payload` into the ordered list of packets to write.
///
/// The counter is advanced exactly once on success and left untouched on
/// error.
///
/// # Example
///
/// ```
/// use anyboard_gt::frame::{encode_message, HeaderCounter};
///
/// let mut counter = HeaderCounter::new();
/// let packets = encode_message(&mut counter, &[0x20]).unwrap();
/// assert_eq!(packets, vec![vec![0x80, 0x03, 0x00, 0x00, 0x00, 0x20, 0xBC, 0xDB]]);
/// assert_eq!(counter.value(), 0xA0);
/// ```
pub fn encode_message(counter: &mut HeaderCounter, payload: &[u8]) -> Result<Vec<Packet>> {
    let envelope = encode_envelope(payload)?;
    let count = packet_count(payload.len());

    let mut packets = Vec::with_capacity(count);
    for (i, chunk) in envelope.chunks(PACKET_PAYLOAD_SIZE).enumerate() {
        let remaining = (count - 1 - i) as u8;
        let mut packet = Vec::with_capacity(1 + chunk.len());
        packet.push(counter.next_header(remaining, i * BLE_PACKET_SIZE));
        packet.extend_from_slice(chunk);
        packets.push(packet);
    }
    Ok(packets)
}

/// Split application data into segments that each fit a single packet.
///
/// Data that already fits is returned as one segment; empty data yields one
/// empty segment so that it is still sent.
pub fn single_packet_segments(data: &[u8]) -> Vec<&[u8]> {
    if data.len() <= SINGLE_PACKET_SEGMENT {
        return vec![data];
    }
    data.chunks(SINGLE_PACKET_SEGMENT).collect()
}

/// Check a payload for profiles that write it unframed as one packet.
pub fn encode_raw(payload: &[u8]) -> Result<Packet> {
    if payload.len() > BLE_PACKET_SIZE {
        return Err(Error::PayloadTooLarge {
            len: payload.len(),
            max: BLE_PACKET_SIZE,
        });
    }
    Ok(payload.to_vec())
}
