//! Token traits -- the interface host applications program against.
//!
//! Features differ between token families, so they are split into separate
//! traits instead of being probed at run time. Every token implements
//! [`Token`]; tokens with an LED also implement [`LedCapable`].

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::events::TokenEvent;
use crate::types::{Capability, Color, TokenAddress};

/// Unified asynchronous interface for a connected token.
///
/// Methods that talk to the token are `async`: each one becomes a command
/// that waits its turn in the token's send queue and resolves when the
/// matching reply arrives.
#[async_trait]
pub trait Token: Send + Sync {
    /// The token's BLE identity.
    fn address(&self) -> &TokenAddress;

    /// Read the token's advertised name.
    async fn name(&self) -> Result<String>;

    /// Read the token firmware version.
    async fn version(&self) -> Result<String>;

    /// Read the token's UUID.
    async fn uuid(&self) -> Result<String>;

    /// Read the battery status string reported by the token.
    async fn battery_status(&self) -> Result<String>;

    /// Ask whether the token has a hardware feature.
    ///
    /// Answers are cached for the lifetime of the connection, so repeated
    /// calls cost one round trip in total.
    async fn has_capability(&self, capability: Capability) -> Result<bool>;

    /// Send raw application bytes, without waiting for any reply.
    async fn send_raw(&self, data: &[u8]) -> Result<()>;

    /// Subscribe to events decoded from this token.
    fn subscribe(&self) -> Result<broadcast::Receiver<TokenEvent>>;
}

/// Tokens with a controllable LED.
#[async_trait]
pub trait LedCapable: Token {
    /// Light the LED steadily in `color`.
    async fn led_on(&self, color: Color) -> Result<()>;

    /// Blink the LED in `color`.
    async fn led_blink(&self, color: Color) -> Result<()>;

    /// Switch the LED off.
    async fn led_off(&self) -> Result<()>;
}
