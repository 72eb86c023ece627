//! # anyboard -- Talk to AnyBoard board-game tokens over BLE
//!
//! `anyboard` is an asynchronous Rust library for exchanging commands and
//! telemetry with AnyBoard tokens: small Bluetooth Low Energy pawns that
//! report when they are moved across a game board and can light an LED,
//! vibrate, or read cards. The link carries 20 bytes per packet, so the
//! library frames, fragments, reassembles and queues every message for
//! you.
//!
//! ## Quick Start
//!
//! ```no_run
//! use anyboard::{Color, LedCapable, Token, TokenEvent};
//! use anyboard::gt::{GtTokenBuilder, profiles::bean};
//!
//! # async fn example(transport: Box<dyn anyboard::BleTransport>) -> anyboard::Result<()> {
//! let token = GtTokenBuilder::new(bean())
//!     .address("C8:A0:30:F9:1B:22")
//!     .build_with_transport(transport)
//!     .await?;
//!
//! println!("connected to {}", token.name().await?);
//! token.led_on(Color::GREEN).await?;
//!
//! let mut events = token.subscribe()?;
//! while let Ok(event) = events.recv().await {
//!     if let TokenEvent::Received { name: "MOVE", value } = event {
//!         println!("moved: {value:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Crate                    | Purpose                                        |
//! |--------------------------|------------------------------------------------|
//! | `anyboard-core`          | Traits ([`Token`], [`LedCapable`], [`BleTransport`]), types, errors |
//! | `anyboard-gt`            | GT wire protocol: framing, reassembly, command queue |
//! | `anyboard-test-harness`  | Mock BLE transport for tests                   |
//! | **`anyboard`**           | This facade crate -- re-exports everything     |
//!
//! Discovering tokens and opening the BLE connection are left to the host
//! platform: anything implementing [`BleTransport`] can drive a token.
//!
//! ## Feature Flags
//!
//! | Feature | Enables                              | Default |
//! |---------|--------------------------------------|---------|
//! | `gt`    | [`gt`] module (GT protocol engine)   | yes     |

pub use anyboard_core::*;

/// GT wire-protocol engine.
///
/// Provides [`GtToken`](gt::GtToken) and [`GtTokenBuilder`](gt::GtTokenBuilder)
/// for Bean and RFduino based tokens.
#[cfg(feature = "gt")]
pub mod gt {
    pub use anyboard_gt::*;
}

/// Returns the hardware profiles of every enabled protocol engine.
///
/// # Example
///
/// ```
/// for profile in anyboard::supported_profiles() {
///     println!("{} ({})", profile.name, profile.service_uuid);
/// }
/// ```
#[cfg(feature = "gt")]
pub fn supported_profiles() -> Vec<gt::TokenProfile> {
    gt::profiles::all_profiles()
}

#[cfg(all(test, feature = "gt"))]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_exposed() {
        let names: Vec<_> = supported_profiles().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Bean", "RFduino"]);
    }

    #[test]
    fn core_types_reexported() {
        let color: Color = "pink".parse().unwrap();
        assert_eq!(color, Color::PINK);
        assert_eq!(Capability::ALL.len(), 9);
    }
}
