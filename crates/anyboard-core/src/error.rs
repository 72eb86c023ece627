//! Error types for AnyBoard.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, framing-layer, and
//! command-layer errors are all captured here.

/// The error type for all AnyBoard operations.
///
/// Variants cover the failure modes encountered when talking to a token:
/// BLE transport failures, oversized payloads, malformed frames, unknown
/// command ids, and commands abandoned by the send queue.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A BLE transport error (characteristic write or notification failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// The payload does not fit in one logical message.
    ///
    /// Callers must pre-chunk application data before sending it.
    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
        /// Largest payload the framing accepts.
        max: usize,
    },

    /// An incoming frame failed validation and was dropped.
    ///
    /// Raised by the reassembler (length mismatch, unknown message id,
    /// counter or remaining-count mismatch, checksum mismatch in strict
    /// mode). The protocol engine logs and discards these; they never
    /// reach a caller.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A message carried a command id that is not in the command table.
    #[error("unknown command id 0x{0:02X}")]
    UnknownCommand(u8),

    /// The token never answered the in-flight command and the send queue
    /// evicted it after the recovery timeout.
    #[error("no response to {0} before the recovery timeout")]
    QueueTimeout(&'static str),

    /// Timed out waiting for the transport.
    #[error("timeout waiting for transport")]
    Timeout,

    /// An invalid parameter was passed to a token command.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The token link is not (or no longer) established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the token was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
