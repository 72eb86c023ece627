//! anyboard-test-harness: Mock transports for testing AnyBoard protocol
//! engines.
//!
//! This crate provides [`MockBleTransport`] for deterministic unit testing
//! of token protocol engines without a Bluetooth radio or real tokens, and
//! [`MockBleHandle`] to drive it after it has been handed to a token.

pub mod mock_ble;

pub use mock_ble::{MockBleHandle, MockBleTransport};
