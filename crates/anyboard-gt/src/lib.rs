//! GT wire-protocol engine for AnyBoard tokens.
//!
//! Tokens are small BLE peripherals whose link carries 20 bytes per packet,
//! far less than many messages. This crate implements the protocol spoken
//! over that link. It provides:
//!
//! - **Checksum** ([`checksum`]) -- the 16-bit CCITT checksum closing every
//!   message.
//! - **Frame encoder** ([`frame`]) -- wrap a payload in an envelope and cut
//!   it into packets, each with a GT header carrying a rolling counter.
//! - **Reassembler** ([`reassembly`]) -- rebuild messages from notification
//!   packets, rejecting anything that does not continue the current one.
//! - **Command table** ([`commands`]) -- command ids, reply shapes and the
//!   decoder turning payloads into [`TokenValue`](anyboard_core::TokenValue)s.
//! - **Profiles** ([`profiles`]) -- GATT identifiers and framing of the
//!   supported boards (Bean, RFduino).
//! - **GtToken** ([`token`]) -- the [`Token`](anyboard_core::Token) and
//!   [`LedCapable`](anyboard_core::LedCapable) implementation, backed by one
//!   IO task per token that serializes all traffic through a send queue.
//! - **GtTokenBuilder** ([`builder`]) -- fluent builder for `GtToken`.
//!
//! # Example
//!
//! ```
//! use anyboard_gt::commands::{decode, Decoded};
//! use anyboard_gt::frame::{encode_message, HeaderCounter};
//! use anyboard_gt::reassembly::Reassembler;
//!
//! // Frame a GET_NAME request.
//! let mut counter = HeaderCounter::new();
//! let packets = encode_message(&mut counter, &[0x20]).unwrap();
//! assert_eq!(packets[0], vec![0x80, 0x03, 0x00, 0x00, 0x00, 0x20, 0xBC, 0xDB]);
//!
//! // Decode the token's answer.
//! let mut reassembler = Reassembler::default();
//! let reply = [0x80, 0x04, 0x00, 0x00, 0x00, 0x40, 0x01, 0x5C, 0x15];
//! let payload = reassembler.push(&reply).unwrap().unwrap();
//! if let Decoded::Known { command, value } = decode(&payload) {
//!     assert_eq!(command.name, "HAS_LED");
//!     assert_eq!(value.as_flag(), Some(true));
//! }
//! ```

pub mod builder;
pub mod checksum;
pub mod commands;
pub mod frame;
pub mod profiles;
pub mod reassembly;
pub mod token;

mod cache;
mod io;
mod queue;

pub use builder::GtTokenBuilder;
pub use profiles::{Framing, TokenProfile};
pub use reassembly::ChecksumMode;
pub use token::GtToken;
