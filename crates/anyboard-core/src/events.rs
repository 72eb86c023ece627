//! Asynchronous token event types.
//!
//! Protocol engines emit events through a [`tokio::sync::broadcast`] channel
//! whenever a message from the token is decoded, whether it answers a
//! pending command or arrives unsolicited (a token being moved across the
//! board, a late reply to an abandoned command). Hosts that want events for
//! all tokens in one place can also register an [`EventSink`].

use crate::types::{TokenAddress, TokenValue};

/// An event emitted by a protocol engine on behalf of one token.
///
/// Events are delivered on a best-effort basis through a bounded broadcast
/// channel; slow consumers may miss events under heavy load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    /// A message from the token was decoded.
    Received {
        /// Command name the message belongs to (e.g. `"GET_NAME"`, `"MOVE"`).
        name: &'static str,
        /// Decoded value.
        value: TokenValue,
    },

    /// A message could not be matched to a known command.
    ///
    /// Carries the raw bytes so observers can detect protocol drift.
    InvalidDataReceived {
        /// The message payload as received.
        data: Vec<u8>,
    },

    /// A command got no answer and was evicted from the send queue.
    CommandAbandoned {
        /// Name of the abandoned command.
        name: &'static str,
    },

    /// The link was reset or shut down; queued commands were failed.
    Disconnected,
}

/// Receiver of token events, shared by every token a host manages.
///
/// `trigger` is called from the token's IO task, so implementations must
/// not block.
pub trait EventSink: Send + Sync {
    /// Deliver one event raised by `token`.
    fn trigger(&self, token: &TokenAddress, event: &TokenEvent);
}
