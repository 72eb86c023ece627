//! anyboard-core: Core traits, types, and error definitions for AnyBoard.
//!
//! This crate defines the protocol-agnostic abstractions shared by the
//! token protocol engines and the applications that drive board-game
//! tokens over Bluetooth Low Energy.
//!
//! # Key types
//!
//! - [`Token`] / [`LedCapable`] -- what an application can ask of a token
//! - [`BleTransport`] -- packet-level link to one token
//! - [`TokenEvent`] / [`EventSink`] -- decoded messages and where they go
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod token;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use anyboard_core::*`.
pub use error::{Error, Result};
pub use events::{EventSink, TokenEvent};
pub use token::{LedCapable, Token};
pub use transport::{BLE_PACKET_SIZE, BleTransport};
pub use types::*;
