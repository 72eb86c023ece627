//! Core types used throughout AnyBoard.
//!
//! These types are shared between the protocol engines and the host
//! application: token identity, decoded reply values, LED colors, and the
//! capability flags a token can report.

use std::fmt;
use std::str::FromStr;

/// Identity of a token, as reported by the BLE stack when it was discovered.
///
/// Usually the peripheral's MAC address; on platforms that hide addresses
/// it is whatever stable identifier the stack hands out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenAddress(String);

impl TokenAddress {
    /// Wrap an address string.
    pub fn new(address: impl Into<String>) -> Self {
        TokenAddress(address.into())
    }

    /// Return the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TokenAddress {
    fn from(s: &str) -> Self {
        TokenAddress::new(s)
    }
}

/// A value decoded from a token reply.
///
/// Which variant a command produces is fixed by the command table of the
/// protocol engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValue {
    /// Acknowledgement without data (LED commands).
    Empty,
    /// Textual reply: name, firmware version, UUID, battery status.
    Text(String),
    /// Single raw byte, used for capability flags.
    Byte(u8),
    /// The token was moved between two board tiles.
    Move {
        /// Tile the token now stands on.
        new_tile: u8,
        /// Tile the token left.
        old_tile: u8,
    },
}

impl TokenValue {
    /// Return the text of a [`TokenValue::Text`] reply.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TokenValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret a [`TokenValue::Byte`] reply as a capability flag.
    ///
    /// Any non-zero byte means "supported".
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            TokenValue::Byte(b) => Some(*b != 0),
            _ => None,
        }
    }
}

/// RGB color for token LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const PINK: Color = Color::rgb(255, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const AQUA: Color = Color::rgb(0, 255, 255);
    pub const OFF: Color = Color::rgb(0, 0, 0);

    /// Build a color from its red, green and blue components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    /// The three bytes sent on the wire, in R, G, B order.
    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for Color {
    /// Tokens light up white when no color is given.
    fn default() -> Self {
        Color::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Error returned when a string cannot be parsed into a [`Color`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown color: {}", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "red" => Ok(Color::RED),
            "green" => Ok(Color::GREEN),
            "blue" => Ok(Color::BLUE),
            "white" => Ok(Color::WHITE),
            "pink" => Ok(Color::PINK),
            "yellow" => Ok(Color::YELLOW),
            "aqua" => Ok(Color::AQUA),
            "off" => Ok(Color::OFF),
            _ => Err(ParseColorError(s.to_string())),
        }
    }
}

/// Hardware features a token can report through its capability queries.
///
/// Answers never change while a token is connected, so engines cache them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Led,
    LedColor,
    Vibration,
    ColorDetection,
    LedScreen,
    Rfid,
    Nfc,
    Accelerometer,
    Temperature,
}

impl Capability {
    /// Every capability, in command-id order.
    pub const ALL: [Capability; 9] = [
        Capability::Led,
        Capability::LedColor,
        Capability::Vibration,
        Capability::ColorDetection,
        Capability::LedScreen,
        Capability::Rfid,
        Capability::Nfc,
        Capability::Accelerometer,
        Capability::Temperature,
    ];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Led => "LED",
            Capability::LedColor => "LED color",
            Capability::Vibration => "vibration",
            Capability::ColorDetection => "color detection",
            Capability::LedScreen => "LED screen",
            Capability::Rfid => "RFID",
            Capability::Nfc => "NFC",
            Capability::Accelerometer => "accelerometer",
            Capability::Temperature => "temperature",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_from_name() {
        assert_eq!("red".parse::<Color>().unwrap(), Color::RED);
        assert_eq!("Aqua".parse::<Color>().unwrap(), Color::AQUA);
        assert_eq!("OFF".parse::<Color>().unwrap(), Color::OFF);
    }

    #[test]
    fn color_unknown_name() {
        let err = "mauve".parse::<Color>().unwrap_err();
        assert_eq!(err.to_string(), "unknown color: mauve");
    }

    #[test]
    fn color_wire_bytes() {
        assert_eq!(Color::PINK.to_bytes(), [255, 0, 255]);
        assert_eq!(Color::default(), Color::WHITE);
    }

    #[test]
    fn color_display() {
        assert_eq!(Color::rgb(1, 2, 255).to_string(), "#0102ff");
    }

    #[test]
    fn token_value_accessors() {
        assert_eq!(TokenValue::Text("v1.2".into()).as_text(), Some("v1.2"));
        assert_eq!(TokenValue::Byte(1).as_flag(), Some(true));
        assert_eq!(TokenValue::Byte(0).as_flag(), Some(false));
        assert_eq!(TokenValue::Empty.as_flag(), None);
        assert_eq!(TokenValue::Byte(1).as_text(), None);
    }

    #[test]
    fn token_address_display() {
        let addr = TokenAddress::from("C4:BE:84:12:34:56");
        assert_eq!(addr.to_string(), "C4:BE:84:12:34:56");
        assert_eq!(addr.as_str(), "C4:BE:84:12:34:56");
    }
}
