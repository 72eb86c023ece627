//! IO task owning one token's link.
//!
//! Token handles never touch the transport. They send a [`Request`] to a
//! single task per token, which owns the transport together with all
//! mutable protocol state: header counter, send queue, reassembler. The
//! task loop waits on cancellation, new requests, incoming notifications
//! and the recovery timer of the in-flight command, and after every wake-up
//! issues whatever the queue allows.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use anyboard_core::{BleTransport, Error, EventSink, Result, TokenAddress, TokenEvent, TokenValue};

use crate::cache::CommandCache;
use crate::commands::{self, Command, Decoded};
use crate::frame::{self, HeaderCounter, SINGLE_PACKET_SEGMENT};
use crate::profiles::Framing;
use crate::queue::{QueuedSend, SendQueue};
use crate::reassembly::{ChecksumMode, Reassembler};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for the IO task.
pub(crate) struct IoConfig {
    /// Identity reported to the event sink.
    pub address: TokenAddress,
    /// Message framing on the link.
    pub framing: Framing,
    /// Split application data so every message fits in one packet.
    pub single_packet_write: bool,
    /// How long the in-flight command may wait for its reply.
    pub recovery_timeout: Duration,
    /// Timeout for a single packet write.
    pub write_timeout: Duration,
    /// Checksum verification of incoming GT messages.
    pub checksum_mode: ChecksumMode,
}

/// A request sent from the token handle to the IO task.
pub(crate) enum Request {
    /// Queue a command or raw write.
    Send(QueuedSend),
    /// Fail everything queued and forget all connection state.
    Reset { reply: oneshot::Sender<()> },
    /// Stop the task and hand the transport back.
    Shutdown {
        reply: oneshot::Sender<Box<dyn BleTransport>>,
    },
}

/// Handle to the IO task. Stored inside `GtToken`.
pub(crate) struct TokenIo {
    pub cmd_tx: mpsc::Sender<Request>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

impl TokenIo {
    /// Queue a command and wait for its decoded reply.
    ///
    /// No extra timeout is applied here: the IO task fails the call with
    /// [`Error::QueueTimeout`] once it has waited for the recovery timeout
    /// at the head of the queue.
    pub async fn command(&self, command: &'static Command, params: Vec<u8>) -> Result<TokenValue> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Send(QueuedSend::Command {
                command,
                params,
                reply: reply_tx,
            }))
            .await
            .map_err(|_| Error::NotConnected)?;

        reply_rx.await.map_err(|_| Error::NotConnected)?
    }

    /// Queue raw application bytes and wait until they are written.
    pub async fn raw(&self, data: Vec<u8>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Send(QueuedSend::Raw {
                data,
                reply: reply_tx,
            }))
            .await
            .map_err(|_| Error::NotConnected)?;

        reply_rx.await.map_err(|_| Error::NotConnected)?
    }

    /// Reset the connection state held by the task.
    pub async fn reset(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Reset { reply: reply_tx })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::NotConnected)
    }

    /// Stop the task and recover the transport.
    pub async fn shutdown(&self) -> Result<Box<dyn BleTransport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| Error::NotConnected)?;
        reply_rx.await.map_err(|_| Error::NotConnected)
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task. Returns the handle for sending requests.
pub(crate) fn spawn_io_task(
    transport: Box<dyn BleTransport>,
    config: IoConfig,
    cache: CommandCache,
    event_tx: broadcast::Sender<TokenEvent>,
    sink: Option<Arc<dyn EventSink>>,
) -> TokenIo {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Request>(32);
    let cancel = CancellationToken::new();

    let state = IoState {
        reassembler: Reassembler::new(config.checksum_mode),
        transport,
        config,
        counter: HeaderCounter::new(),
        queue: SendQueue::new(),
        cache,
        event_tx,
        sink,
    };
    let task = tokio::spawn(io_loop(state, cmd_rx, cancel.clone()));

    TokenIo {
        cmd_tx,
        cancel,
        task,
    }
}

// ---------------------------------------------------------------------------
// IO loop
// ---------------------------------------------------------------------------

/// How long one notification wait lasts before the loop comes round again.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Back-off after a transport error other than a timeout.
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Everything the IO task owns.
struct IoState {
    transport: Box<dyn BleTransport>,
    config: IoConfig,
    counter: HeaderCounter,
    queue: SendQueue,
    reassembler: Reassembler,
    cache: CommandCache,
    event_tx: broadcast::Sender<TokenEvent>,
    sink: Option<Arc<dyn EventSink>>,
}

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Requests from the handle
/// 3. The recovery timer of the in-flight command
/// 4. Incoming notifications
///
/// The recovery timer sits above notifications so a link that keeps
/// failing cannot hold back eviction.
async fn io_loop(
    mut state: IoState,
    mut cmd_rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    loop {
        let armed = state.queue.armed();

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("IO task cancelled");
                break;
            }

            req = cmd_rx.recv() => {
                match req {
                    Some(Request::Send(entry)) => {
                        let name = entry.name();
                        let idle = state.queue.push(entry);
                        debug!(
                            command = name,
                            idle,
                            in_flight = state.queue.is_in_flight(),
                            queued = state.queue.len(),
                            "send queued"
                        );
                    }
                    Some(Request::Reset { reply }) => {
                        state.reset();
                        let _ = reply.send(());
                    }
                    Some(Request::Shutdown { reply }) => {
                        debug!("IO task shutdown requested");
                        state.queue.fail_all(|| Error::NotConnected);
                        state.emit(TokenEvent::Disconnected);
                        let _ = reply.send(state.transport);
                        return;
                    }
                    None => {
                        debug!("all request senders dropped, exiting IO task");
                        break;
                    }
                }
            }

            _ = recovery_timer(armed) => {
                if let Some((tag, _)) = armed {
                    state.on_recovery_timeout(tag);
                }
            }

            result = state.transport.next_notification(IDLE_POLL) => {
                match result {
                    Ok(packet) => state.on_packet(&packet),
                    Err(Error::Timeout) => {}
                    Err(e) => {
                        warn!(error = %e, "notification read failed");
                        state.on_link_error(e);
                        tokio::time::sleep(ERROR_BACKOFF).await;
                    }
                }
            }
        }

        state.pump().await;
    }
}

/// Resolves at the in-flight deadline, or never when nothing is in flight.
async fn recovery_timer(armed: Option<(u64, Instant)>) {
    match armed {
        Some((_, deadline)) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl IoState {
    // -----------------------------------------------------------------------
    // Outgoing
    // -----------------------------------------------------------------------

    /// Issue queued entries until a command is in flight or the queue is
    /// empty.
    async fn pump(&mut self) {
        while let Some(entry) = self.queue.next_ready() {
            match entry {
                QueuedSend::Command {
                    command,
                    params,
                    reply,
                } => {
                    if command.use_cache {
                        if let Some(value) = self.cache.get(command.name) {
                            debug!(command = command.name, "answered from cache");
                            let _ = reply.send(Ok(value));
                            continue;
                        }
                    }

                    let result = match commands::encode_request(command, &params) {
                        Ok(payload) => self.write_message(&payload).await,
                        Err(e) => Err(e),
                    };
                    match result {
                        Ok(()) => {
                            let deadline = Instant::now() + self.config.recovery_timeout;
                            let tag = self.queue.start(command, reply, deadline);
                            debug!(command = command.name, tag, "command in flight");
                        }
                        Err(e) => {
                            warn!(command = command.name, error = %e, "command write failed");
                            let _ = reply.send(Err(e));
                        }
                    }
                }
                QueuedSend::Raw { data, reply } => {
                    let result = self.write_message(&data).await;
                    if let Err(e) = &result {
                        warn!(len = data.len(), error = %e, "raw write failed");
                    }
                    let _ = reply.send(result);
                }
            }
        }
    }

    /// Frame `payload` for this link and write every packet in order.
    async fn write_message(&mut self, payload: &[u8]) -> Result<()> {
        match self.config.framing {
            Framing::Gt => {
                let segments = if self.config.single_packet_write
                    && payload.len() > SINGLE_PACKET_SEGMENT
                {
                    frame::single_packet_segments(payload)
                } else {
                    vec![payload]
                };
                for segment in segments {
                    let packets = frame::encode_message(&mut self.counter, segment)?;
                    for packet in &packets {
                        self.write_packet(packet).await?;
                    }
                }
                Ok(())
            }
            Framing::Raw => {
                let packet = frame::encode_raw(payload)?;
                self.write_packet(&packet).await
            }
        }
    }

    async fn write_packet(&mut self, packet: &[u8]) -> Result<()> {
        debug!(len = packet.len(), header = packet.first().copied(), "writing packet");
        match tokio::time::timeout(self.config.write_timeout, self.transport.write(packet)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        }
    }

    // -----------------------------------------------------------------------
    // Incoming
    // -----------------------------------------------------------------------

    fn on_packet(&mut self, packet: &[u8]) {
        let payload = match self.config.framing {
            Framing::Gt => match self.reassembler.push(packet) {
                Ok(Some(payload)) => payload,
                Ok(None) => return,
                Err(e) => {
                    warn!(error = %e, len = packet.len(), "dropping notification");
                    return;
                }
            },
            Framing::Raw => packet.to_vec(),
        };
        self.dispatch(payload);
    }

    /// Decode a complete message, release the matching in-flight command
    /// and publish the event.
    fn dispatch(&mut self, payload: Vec<u8>) {
        match commands::decode(&payload) {
            Decoded::Known { command, value } => {
                debug!(command = command.name, value = ?value, "message received");
                if command.use_cache {
                    self.cache.insert(command.name, value.clone());
                }
                if let Some(reply) = self.queue.complete(command.name) {
                    let _ = reply.send(Ok(value.clone()));
                }
                self.emit(TokenEvent::Received {
                    name: command.name,
                    value,
                });
            }
            Decoded::Invalid(data) => {
                warn!(data = ?data, "undecodable message");
                self.emit(TokenEvent::InvalidDataReceived { data });
            }
        }
    }

    fn on_recovery_timeout(&mut self, tag: u64) {
        if let Some((command, reply)) = self.queue.evict(tag) {
            warn!(
                command = command.name,
                timeout_ms = self.config.recovery_timeout.as_millis() as u64,
                "no reply, evicting command"
            );
            let _ = reply.send(Err(Error::QueueTimeout(command.name)));
            self.emit(TokenEvent::CommandAbandoned { name: command.name });
        }
    }

    /// The reply of the in-flight command can no longer arrive: fail it
    /// with `err` and drop any partial message.
    fn on_link_error(&mut self, err: Error) {
        self.reassembler.clear();
        if let Some((command, reply)) = self.queue.abort() {
            warn!(command = command.name, error = %err, "link failed, abandoning command");
            let _ = reply.send(Err(err));
        }
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    fn reset(&mut self) {
        let failed = self.queue.fail_all(|| Error::NotConnected);
        self.cache.clear();
        self.reassembler.clear();
        self.counter = HeaderCounter::new();
        debug!(failed, "token state reset");
        self.emit(TokenEvent::Disconnected);
    }

    fn emit(&self, event: TokenEvent) {
        if let Some(sink) = &self.sink {
            sink.trigger(&self.config.address, &event);
        }
        // No subscribers is not an error.
        let _ = self.event_tx.send(event);
    }
}
