//! GtToken -- the [`Token`] implementation for GT-protocol boards.
//!
//! `GtToken` is a thin handle. Every method becomes a request to the
//! token's IO task (see [`crate::io`]), which queues it, frames it for the
//! link, and resolves it when the matching reply has been decoded.
//! Capability answers are cached and served without a round trip.

use async_trait::async_trait;
use tokio::sync::broadcast;

use anyboard_core::{
    BleTransport, Capability, Color, Error, LedCapable, Result, Token, TokenAddress, TokenEvent,
    TokenValue,
};

use crate::cache::CommandCache;
use crate::commands::{self, Command};
use crate::io::TokenIo;
use crate::profiles::TokenProfile;

/// A connected token speaking the GT protocol (or its raw variant).
///
/// Built with [`GtTokenBuilder`](crate::builder::GtTokenBuilder).
/// Dropping the handle stops the IO task.
pub struct GtToken {
    io: TokenIo,
    address: TokenAddress,
    profile: TokenProfile,
    cache: CommandCache,
    event_tx: broadcast::Sender<TokenEvent>,
}

impl Drop for GtToken {
    fn drop(&mut self) {
        self.io.cancel.cancel();
        // The task may be parked in a transport call that ignores
        // cancellation.
        self.io.task.abort();
    }
}

impl GtToken {
    pub(crate) fn new(
        io: TokenIo,
        address: TokenAddress,
        profile: TokenProfile,
        cache: CommandCache,
        event_tx: broadcast::Sender<TokenEvent>,
    ) -> Self {
        GtToken {
            io,
            address,
            profile,
            cache,
            event_tx,
        }
    }

    /// The hardware profile this token was built for.
    pub fn profile(&self) -> &TokenProfile {
        &self.profile
    }

    /// Send `command` with `params` and wait for the decoded reply.
    ///
    /// Cached commands whose answer is already known return it without
    /// touching the link. Otherwise the command waits its turn in the send
    /// queue; if the token does not answer within the recovery timeout the
    /// call fails with [`Error::QueueTimeout`].
    pub async fn send_command(&self, command: &'static Command, params: &[u8]) -> Result<TokenValue> {
        if !command.has_params && !params.is_empty() {
            return Err(Error::InvalidParameter(format!(
                "{} takes no parameters",
                command.name
            )));
        }
        if command.use_cache {
            if let Some(value) = self.cache.get(command.name) {
                return Ok(value);
            }
        }
        self.io.command(command, params.to_vec()).await
    }

    /// Send a UTF-8 string as raw application data.
    pub async fn send_string(&self, text: &str) -> Result<()> {
        self.send_raw(text.as_bytes()).await
    }

    /// Drop all connection state: queued callers fail with
    /// [`Error::NotConnected`], cached answers and partial messages are
    /// forgotten, and subscribers see [`TokenEvent::Disconnected`].
    pub async fn reset(&self) -> Result<()> {
        self.io.reset().await
    }

    /// Stop the IO task and take the transport back.
    ///
    /// Queued callers fail with [`Error::NotConnected`]; so does every call
    /// made on this handle afterwards.
    pub async fn shutdown(&self) -> Result<Box<dyn BleTransport>> {
        self.io.shutdown().await
    }

    async fn query_text(&self, command: &'static Command) -> Result<String> {
        match self.send_command(command, &[]).await? {
            TokenValue::Text(text) => Ok(text),
            other => Err(Error::Transport(format!(
                "unexpected reply to {}: {other:?}",
                command.name
            ))),
        }
    }
}

#[async_trait]
impl Token for GtToken {
    fn address(&self) -> &TokenAddress {
        &self.address
    }

    async fn name(&self) -> Result<String> {
        self.query_text(&commands::GET_NAME).await
    }

    async fn version(&self) -> Result<String> {
        self.query_text(&commands::GET_VERSION).await
    }

    async fn uuid(&self) -> Result<String> {
        self.query_text(&commands::GET_UUID).await
    }

    async fn battery_status(&self) -> Result<String> {
        self.query_text(&commands::GET_BATTERY_STATUS).await
    }

    async fn has_capability(&self, capability: Capability) -> Result<bool> {
        let command = commands::for_capability(capability);
        let value = self.send_command(command, &[]).await?;
        value.as_flag().ok_or_else(|| {
            Error::Transport(format!("unexpected reply to {}: {value:?}", command.name))
        })
    }

    async fn send_raw(&self, data: &[u8]) -> Result<()> {
        self.io.raw(data.to_vec()).await
    }

    fn subscribe(&self) -> Result<broadcast::Receiver<TokenEvent>> {
        Ok(self.event_tx.subscribe())
    }
}

#[async_trait]
impl LedCapable for GtToken {
    async fn led_on(&self, color: Color) -> Result<()> {
        self.send_command(&commands::LED_ON, &color.to_bytes())
            .await
            .map(|_| ())
    }

    async fn led_blink(&self, color: Color) -> Result<()> {
        let [r, g, b] = color.to_bytes();
        self.send_command(
            &commands::LED_BLINK,
            &[r, g, b, commands::DEFAULT_BLINK_PERIOD],
        )
        .await
        .map(|_| ())
    }

    async fn led_off(&self) -> Result<()> {
        self.send_command(&commands::LED_OFF, &[]).await.map(|_| ())
    }
}
