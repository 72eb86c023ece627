//! Token command table and reply decoding.
//!
//! Every message exchanged with a token starts with a one-byte command id.
//! Requests carry the id followed by optional parameters; replies echo the
//! id followed by the answer, whose shape is fixed per command by
//! [`ReplyKind`]. There is no request id on the wire, so replies are matched
//! to requests by command name.
//!
//! The table and the decoder are pure. The IO task feeds reassembled
//! payloads through [`decode`] and turns the result into events.

use anyboard_core::{Capability, Error, Result, TokenValue};

/// How the bytes following the command id of a reply are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// UTF-8 text (decoded lossily).
    Text,
    /// A single byte, used for capability flags.
    Byte,
    /// Two bytes: the new tile, then the old tile.
    Move,
    /// Acknowledgement without data.
    Empty,
}

/// One entry of the command table.
#[derive(Debug, PartialEq, Eq)]
pub struct Command {
    /// Wire id, the first byte of every request and reply.
    pub id: u8,
    /// Event name used to correlate replies.
    pub name: &'static str,
    /// Whether the request carries parameter bytes after the id.
    pub has_params: bool,
    /// Whether the reply is immutable for the lifetime of a connection and
    /// can be answered from the cache.
    pub use_cache: bool,
    /// Shape of the reply.
    pub reply: ReplyKind,
}

const fn query(id: u8, name: &'static str, reply: ReplyKind) -> Command {
    Command {
        id,
        name,
        has_params: false,
        use_cache: false,
        reply,
    }
}

const fn capability(id: u8, name: &'static str) -> Command {
    Command {
        id,
        name,
        has_params: false,
        use_cache: true,
        reply: ReplyKind::Byte,
    }
}

// ---------------------------------------------------------------
// Information queries
// ---------------------------------------------------------------

pub const GET_NAME: Command = query(32, "GET_NAME", ReplyKind::Text);
pub const GET_VERSION: Command = query(33, "GET_VERSION", ReplyKind::Text);
pub const GET_UUID: Command = query(34, "GET_UUID", ReplyKind::Text);
pub const GET_BATTERY_STATUS: Command = query(35, "GET_BATTERY_STATUS", ReplyKind::Text);

// ---------------------------------------------------------------
// Capability queries (cached)
// ---------------------------------------------------------------

pub const HAS_LED: Command = capability(64, "HAS_LED");
pub const HAS_LED_COLOR: Command = capability(65, "HAS_LED_COLOR");
pub const HAS_VIBRATION: Command = capability(66, "HAS_VIBRATION");
pub const HAS_COLOR_DETECTION: Command = capability(67, "HAS_COLOR_DETECTION");
pub const HAS_LED_SCREEN: Command = capability(68, "HAS_LED_SCREEN");
pub const HAS_RFID: Command = capability(71, "HAS_RFID");
pub const HAS_NFC: Command = capability(72, "HAS_NFC");
pub const HAS_ACCELEROMETER: Command = capability(73, "HAS_ACCELEROMETER");
pub const HAS_TEMPERATURE: Command = capability(74, "HAS_TEMPERATURE");

// ---------------------------------------------------------------
// LED control
// ---------------------------------------------------------------

pub const LED_OFF: Command = query(128, "LED_OFF", ReplyKind::Empty);

/// Parameters: red, green, blue.
pub const LED_ON: Command = Command {
    id: 129,
    name: "LED_ON",
    has_params: true,
    use_cache: false,
    reply: ReplyKind::Empty,
};

/// Parameters: red, green, blue, period.
pub const LED_BLINK: Command = Command {
    id: 130,
    name: "LED_BLINK",
    has_params: true,
    use_cache: false,
    reply: ReplyKind::Empty,
};

/// Blink period sent with [`LED_BLINK`] by the LED helpers.
pub const DEFAULT_BLINK_PERIOD: u8 = 30;

// ---------------------------------------------------------------
// Unsolicited
// ---------------------------------------------------------------

/// Sent by the token when it is moved from one tile to another.
pub const MOVE: Command = query(194, "MOVE", ReplyKind::Move);

/// Every known command, in id order.
pub static ALL: [&Command; 17] = [
    &GET_NAME,
    &GET_VERSION,
    &GET_UUID,
    &GET_BATTERY_STATUS,
    &HAS_LED,
    &HAS_LED_COLOR,
    &HAS_VIBRATION,
    &HAS_COLOR_DETECTION,
    &HAS_LED_SCREEN,
    &HAS_RFID,
    &HAS_NFC,
    &HAS_ACCELEROMETER,
    &HAS_TEMPERATURE,
    &LED_OFF,
    &LED_ON,
    &LED_BLINK,
    &MOVE,
];

/// Look up a command by wire id.
pub fn lookup(id: u8) -> Result<&'static Command> {
    ALL.iter()
        .copied()
        .find(|c| c.id == id)
        .ok_or(Error::UnknownCommand(id))
}

/// The `HAS_*` query answering `capability`.
pub fn for_capability(capability: Capability) -> &'static Command {
    match capability {
        Capability::Led => &HAS_LED,
        Capability::LedColor => &HAS_LED_COLOR,
        Capability::Vibration => &HAS_VIBRATION,
        Capability::ColorDetection => &HAS_COLOR_DETECTION,
        Capability::LedScreen => &HAS_LED_SCREEN,
        Capability::Rfid => &HAS_RFID,
        Capability::Nfc => &HAS_NFC,
        Capability::Accelerometer => &HAS_ACCELEROMETER,
        Capability::Temperature => &HAS_TEMPERATURE,
    }
}

/// Build the request payload: command id followed by `params`.
pub fn encode_request(command: &Command, params: &[u8]) -> Result<Vec<u8>> {
    if !command.has_params && !params.is_empty() {
        return Err(Error::InvalidParameter(format!(
            "{} takes no parameters, got {} bytes",
            command.name,
            params.len()
        )));
    }
    let mut payload = Vec::with_capacity(1 + params.len());
    payload.push(command.id);
    payload.extend_from_slice(params);
    Ok(payload)
}

/// Outcome of decoding one message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A reply or notification for a known command.
    Known {
        command: &'static Command,
        value: TokenValue,
    },
    /// The payload is empty, has an unknown id, or is too short for its
    /// command. Carries the payload unchanged.
    Invalid(Vec<u8>),
}

/// Decode a reassembled message payload.
pub fn decode(payload: &[u8]) -> Decoded {
    let Some((&id, data)) = payload.split_first() else {
        return Decoded::Invalid(Vec::new());
    };
    let Ok(command) = lookup(id) else {
        return Decoded::Invalid(payload.to_vec());
    };

    let value = match command.reply {
        ReplyKind::Text => TokenValue::Text(String::from_utf8_lossy(data).into_owned()),
        ReplyKind::Empty => TokenValue::Empty,
        ReplyKind::Byte => match data.first() {
            Some(&b) => TokenValue::Byte(b),
            None => return Decoded::Invalid(payload.to_vec()),
        },
        ReplyKind::Move => match data {
            [new_tile, old_tile, ..] => TokenValue::Move {
                new_tile: *new_tile,
                old_tile: *old_tile,
            },
            _ => return Decoded::Invalid(payload.to_vec()),
        },
    };
    Decoded::Known { command, value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_ids_are_unique() {
        for (i, a) in ALL.iter().enumerate() {
            for b in &ALL[i + 1..] {
                assert_ne!(a.id, b.id, "{} and {} share an id", a.name, b.name);
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn lookup_known_and_unknown() {
        assert_eq!(lookup(32).unwrap().name, "GET_NAME");
        assert_eq!(lookup(194).unwrap().name, "MOVE");
        assert!(matches!(lookup(0x99), Err(Error::UnknownCommand(0x99))));
    }

    #[test]
    fn only_capability_queries_are_cached() {
        for c in ALL.iter() {
            assert_eq!(c.use_cache, c.name.starts_with("HAS_"), "{}", c.name);
        }
    }

    #[test]
    fn every_capability_has_a_query() {
        for cap in Capability::ALL {
            let command = for_capability(cap);
            assert!(command.use_cache);
            assert_eq!(command.reply, ReplyKind::Byte);
        }
    }

    #[test]
    fn request_encoding() {
        assert_eq!(encode_request(&GET_NAME, &[]).unwrap(), vec![32]);
        assert_eq!(
            encode_request(&LED_BLINK, &[255, 0, 0, DEFAULT_BLINK_PERIOD]).unwrap(),
            vec![130, 255, 0, 0, 30]
        );
        assert!(matches!(
            encode_request(&GET_NAME, &[1]),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn decode_text_reply() {
        let decoded = decode(b"\x20Token-1");
        assert_eq!(
            decoded,
            Decoded::Known {
                command: &GET_NAME,
                value: TokenValue::Text("Token-1".into()),
            }
        );
    }

    #[test]
    fn decode_text_is_lossy() {
        match decode(&[33, b'v', 0xFF, b'1']) {
            Decoded::Known { value, .. } => {
                assert_eq!(value, TokenValue::Text("v\u{FFFD}1".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_byte_reply() {
        match decode(&[64, 1]) {
            Decoded::Known { command, value } => {
                assert_eq!(command.name, "HAS_LED");
                assert_eq!(value.as_flag(), Some(true));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_move() {
        assert_eq!(
            decode(&[194, 7, 3]),
            Decoded::Known {
                command: &MOVE,
                value: TokenValue::Move {
                    new_tile: 7,
                    old_tile: 3
                },
            }
        );
    }

    #[test]
    fn decode_empty_ack() {
        assert_eq!(
            decode(&[128]),
            Decoded::Known {
                command: &LED_OFF,
                value: TokenValue::Empty,
            }
        );
    }

    #[test]
    fn decode_invalid_payloads() {
        assert_eq!(decode(&[]), Decoded::Invalid(vec![]));
        assert_eq!(decode(&[0x99, 1]), Decoded::Invalid(vec![0x99, 1]));
        assert_eq!(decode(&[64]), Decoded::Invalid(vec![64]));
        assert_eq!(decode(&[194, 7]), Decoded::Invalid(vec![194, 7]));
    }
}
