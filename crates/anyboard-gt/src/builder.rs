//! GtTokenBuilder -- fluent builder for constructing [`GtToken`] instances.
//!
//! Separates configuration from construction so that callers can pick the
//! token profile, timeouts, checksum policy and event routing before the
//! IO task takes over the transport.
//!
//! # Example
//!
//! ```no_run
//! use anyboard_gt::builder::GtTokenBuilder;
//! use anyboard_gt::profiles::bean;
//! use std::time::Duration;
//!
//! # async fn example() -> anyboard_core::Result<()> {
//! let token = GtTokenBuilder::new(bean())
//!     .address("C8:A0:30:F9:1B:22")
//!     .recovery_timeout(Duration::from_millis(1500))
//!     .build_with_transport(todo!())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use anyboard_core::{BleTransport, Error, EventSink, Result, TokenAddress};

use crate::cache::CommandCache;
use crate::io::{IoConfig, spawn_io_task};
use crate::profiles::TokenProfile;
use crate::reassembly::ChecksumMode;
use crate::token::GtToken;

/// How long an in-flight command waits for its reply before eviction.
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_millis(2000);

/// How long a single packet write may take.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Capacity of the per-token event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Fluent builder for [`GtToken`].
///
/// Everything but the token address has a default, so the simplest usage
/// is:
///
/// ```ignore
/// let token = GtTokenBuilder::new(bean())
///     .address("C8:A0:30:F9:1B:22")
///     .build_with_transport(transport)
///     .await?;
/// ```
pub struct GtTokenBuilder {
    profile: TokenProfile,
    address: Option<TokenAddress>,
    recovery_timeout: Duration,
    write_timeout: Duration,
    checksum_mode: ChecksumMode,
    event_capacity: usize,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl GtTokenBuilder {
    /// Create a builder for a token of the given profile.
    pub fn new(profile: TokenProfile) -> Self {
        GtTokenBuilder {
            profile,
            address: None,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            checksum_mode: ChecksumMode::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            event_sink: None,
        }
    }

    /// Set the token's BLE identity. Required.
    pub fn address(mut self, address: impl Into<TokenAddress>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Set how long an unanswered command blocks the queue (default: 2000 ms).
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Set the timeout for one packet write (default: 1000 ms).
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Choose whether incoming checksums are verified (default: lenient).
    pub fn checksum_mode(mut self, mode: ChecksumMode) -> Self {
        self.checksum_mode = mode;
        self
    }

    /// Set the capacity of the event broadcast channel (default: 64).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Also deliver every event to `sink`.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Build the token on an already connected transport.
    ///
    /// Enables notifications, then spawns the IO task that owns the
    /// transport from here on. Must be called within a Tokio runtime.
    pub async fn build_with_transport(self, mut transport: Box<dyn BleTransport>) -> Result<GtToken> {
        let address = self
            .address
            .ok_or_else(|| Error::InvalidParameter("token address is required".into()))?;
        if self.event_capacity == 0 {
            return Err(Error::InvalidParameter(
                "event capacity must be at least 1".into(),
            ));
        }

        transport.enable_notifications().await?;

        let (event_tx, _) = broadcast::channel(self.event_capacity);
        let cache = CommandCache::new();
        let config = IoConfig {
            address: address.clone(),
            framing: self.profile.framing,
            single_packet_write: self.profile.single_packet_write,
            recovery_timeout: self.recovery_timeout,
            write_timeout: self.write_timeout,
            checksum_mode: self.checksum_mode,
        };
        let io = spawn_io_task(
            transport,
            config,
            cache.clone(),
            event_tx.clone(),
            self.event_sink,
        );

        tracing::debug!(
            address = %address,
            profile = self.profile.name,
            "token link started"
        );
        Ok(GtToken::new(io, address, self.profile, cache, event_tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::bean;
    use anyboard_test_harness::MockBleTransport;

    #[tokio::test]
    async fn address_is_required() {
        let result = GtTokenBuilder::new(bean())
            .build_with_transport(Box::new(MockBleTransport::new()))
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn zero_event_capacity_rejected() {
        let result = GtTokenBuilder::new(bean())
            .address("AA")
            .event_capacity(0)
            .build_with_transport(Box::new(MockBleTransport::new()))
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn notifications_enabled_on_build() {
        let mock = MockBleTransport::new();
        let handle = mock.handle();
        let token = GtTokenBuilder::new(bean())
            .address("AA")
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();
        assert!(handle.notifications_enabled());
        assert_eq!(token.profile().name, "Bean");
    }

    #[tokio::test]
    async fn build_fails_on_dead_link() {
        let mock = MockBleTransport::new();
        mock.handle().set_connected(false);
        let result = GtTokenBuilder::new(bean())
            .address("AA")
            .build_with_transport(Box::new(mock))
            .await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }
}
