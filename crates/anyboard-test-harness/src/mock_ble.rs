//! Mock BLE transport for deterministic testing of protocol engines.
//!
//! [`MockBleTransport`] implements [`BleTransport`] with pre-loaded
//! write/notification pairs. When the engine writes a packet that matches
//! the next expectation, the paired notification packets are queued for
//! [`next_notification()`](BleTransport::next_notification). Once the
//! transport has been moved into a token, a cloned [`MockBleHandle`] keeps
//! access to it: tests inject unsolicited notifications, inspect writes and
//! simulate link failures through the handle.
//!
//! # Example
//!
//! ```
//! use anyboard_test_harness::MockBleTransport;
//!
//! let mut mock = MockBleTransport::new();
//! // GET_NAME request, answered with "T1".
//! mock.expect(
//!     &[0x80, 0x03, 0x00, 0x00, 0x00, 0x20, 0xBC, 0xDB],
//!     &[0x80, 0x05, 0x00, 0x00, 0x00, 0x20, b'T', b'1', 0x00, 0x00],
//! );
//! let handle = mock.handle();
//! assert_eq!(handle.remaining_expectations(), 1);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

use anyboard_core::error::{Error, Result};
use anyboard_core::transport::BleTransport;

/// A pre-loaded write and the notifications it triggers.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact packet we expect to be written.
    request: Vec<u8>,
    /// Packets notified once the matching write is seen.
    responses: Vec<Vec<u8>>,
}

#[derive(Debug)]
struct MockState {
    expectations: VecDeque<Expectation>,
    written: Vec<Vec<u8>>,
    connected: bool,
    fail_writes: bool,
    notifications_enabled: bool,
}

impl MockState {
    fn new() -> Self {
        MockState {
            expectations: VecDeque::new(),
            written: Vec::new(),
            connected: true,
            fail_writes: false,
            notifications_enabled: false,
        }
    }
}

type SharedState = Arc<Mutex<MockState>>;

// Test state holds plain data, so a poisoned lock is still usable.
fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A mock [`BleTransport`] for testing protocol engines without a radio.
///
/// Expectations are consumed in order. A write that does not match the
/// next expectation fails with [`Error::Transport`]. Writes made while no
/// expectations are loaded are recorded and accepted without a reply.
#[derive(Debug)]
pub struct MockBleTransport {
    state: SharedState,
    notify_tx: mpsc::UnboundedSender<Vec<u8>>,
    notify_rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MockBleTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        MockBleTransport {
            state: Arc::new(Mutex::new(MockState::new())),
            notify_tx,
            notify_rx,
        }
    }

    /// A handle that stays usable after the transport is moved away.
    pub fn handle(&self) -> MockBleHandle {
        MockBleHandle {
            state: Arc::clone(&self.state),
            notify_tx: self.notify_tx.clone(),
        }
    }

    /// Expect `request` to be written, then notify `response`.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.handle().expect(request, response);
    }

    /// Expect `request` to be written, then notify every packet of
    /// `responses` in order.
    pub fn expect_multi(&mut self, request: &[u8], responses: Vec<Vec<u8>>) {
        self.handle().expect_multi(request, responses);
    }

    /// Expect `request` to be written, with no notification in reply.
    pub fn expect_silent(&mut self, request: &[u8]) {
        self.handle().expect_silent(request);
    }
}

impl Default for MockBleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BleTransport for MockBleTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let responses = {
            let mut state = lock(&self.state);
            if !state.connected {
                return Err(Error::NotConnected);
            }
            if state.fail_writes {
                return Err(Error::Transport("injected write failure".into()));
            }
            state.written.push(data.to_vec());

            match state.expectations.pop_front() {
                Some(expectation) if expectation.request != data => {
                    return Err(Error::Transport(format!(
                        "unexpected write: expected {:02X?}, got {:02X?}",
                        expectation.request, data
                    )));
                }
                Some(expectation) => expectation.responses,
                None => Vec::new(),
            }
        };

        for packet in responses {
            let _ = self.notify_tx.send(packet);
        }
        Ok(())
    }

    async fn enable_notifications(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(Error::NotConnected);
        }
        state.notifications_enabled = true;
        Ok(())
    }

    async fn next_notification(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        if !lock(&self.state).connected {
            return Err(Error::NotConnected);
        }
        match tokio::time::timeout(timeout, self.notify_rx.recv()).await {
            Ok(Some(packet)) => Ok(packet),
            Ok(None) => Err(Error::ConnectionLost),
            Err(_) => Err(Error::Timeout),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.connected = false;
        state.notifications_enabled = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
}

/// Cloneable access to a [`MockBleTransport`] owned by someone else.
#[derive(Debug, Clone)]
pub struct MockBleHandle {
    state: SharedState,
    notify_tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl MockBleHandle {
    /// Expect `request` to be written, then notify `response`.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.expect_multi(request, vec![response.to_vec()]);
    }

    /// Expect `request` to be written, then notify every packet of
    /// `responses` in order.
    pub fn expect_multi(&self, request: &[u8], responses: Vec<Vec<u8>>) {
        lock(&self.state).expectations.push_back(Expectation {
            request: request.to_vec(),
            responses,
        });
    }

    /// Expect `request` to be written, with no notification in reply.
    pub fn expect_silent(&self, request: &[u8]) {
        self.expect_multi(request, Vec::new());
    }

    /// Notify a packet as if the token had sent it unprompted.
    pub fn inject(&self, packet: &[u8]) {
        let _ = self.notify_tx.send(packet.to_vec());
    }

    /// Every packet written so far, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.state).written.clone()
    }

    /// Number of packets written so far.
    pub fn write_count(&self) -> usize {
        lock(&self.state).written.len()
    }

    /// Number of expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        lock(&self.state).expectations.len()
    }

    /// Make every following write fail with [`Error::Transport`].
    pub fn set_fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Set the connected state. While disconnected every operation
    /// returns [`Error::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        lock(&self.state).connected = connected;
    }

    /// Whether the engine enabled notifications.
    pub fn notifications_enabled(&self) -> bool {
        lock(&self.state).notifications_enabled
    }
}
