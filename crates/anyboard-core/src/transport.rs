//! BLE transport trait for token communication.
//!
//! The [`BleTransport`] trait abstracts over the radio link to one token.
//! A transport is handed to the protocol engine already connected and bound
//! to the token's serial characteristic pair: one characteristic the host
//! writes to, and one the token notifies on. Discovering the peripheral,
//! connecting, and resolving characteristic handles happen before that and
//! are not part of this library.
//!
//! Protocol engines (e.g. the GT engine in `anyboard-gt`) operate on a
//! `BleTransport`, so the same code drives real radios and the
//! `MockBleTransport` from `anyboard-test-harness`.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Largest number of bytes a single BLE characteristic write or
/// notification may carry on a token link.
pub const BLE_PACKET_SIZE: usize = 20;

/// Asynchronous packet-level transport to a token.
///
/// Unlike a byte stream, every call moves exactly one BLE packet. The radio
/// stack preserves packet order per token; nothing is promised across tokens.
#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Write one packet (at most [`BLE_PACKET_SIZE`] bytes) to the token.
    ///
    /// Resolves once the stack acknowledges the write. A failure here is
    /// reported to the caller whose message was being sent.
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Enable notifications on the token's notify characteristic.
    ///
    /// Must succeed before [`next_notification()`](Self::next_notification)
    /// yields any packets.
    async fn enable_notifications(&mut self) -> Result<()>;

    /// Wait for the next notification packet from the token.
    ///
    /// Returns [`Error::Timeout`](crate::error::Error::Timeout) if nothing
    /// arrives within `timeout`.
    async fn next_notification(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    /// Close the link.
    ///
    /// After calling `close()`, subsequent calls should return
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the link is currently up.
    fn is_connected(&self) -> bool;
}
