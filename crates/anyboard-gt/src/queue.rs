//! Per-token send queue.
//!
//! Tokens process one command at a time and answer without a request id,
//! so the IO task keeps every outgoing message in a FIFO and lets at most
//! one command wait for its reply. The waiting command is tagged with a
//! random marker and a deadline; when the deadline passes and the marker
//! still matches, the command is evicted so a silent token cannot stall
//! the queue.

use std::collections::VecDeque;

use tokio::sync::oneshot;
use tokio::time::Instant;

use anyboard_core::{Error, Result, TokenValue};

use crate::commands::Command;

/// A message waiting for the link.
#[derive(Debug)]
pub(crate) enum QueuedSend {
    /// A command whose caller waits for the decoded reply.
    Command {
        command: &'static Command,
        params: Vec<u8>,
        reply: oneshot::Sender<Result<TokenValue>>,
    },
    /// Application bytes, complete once written.
    Raw {
        data: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
}

impl QueuedSend {
    /// Name used in logs.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            QueuedSend::Command { command, .. } => command.name,
            QueuedSend::Raw { .. } => "RAW",
        }
    }

    /// Complete the entry with an error.
    pub(crate) fn fail(self, err: Error) {
        match self {
            QueuedSend::Command { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            QueuedSend::Raw { reply, .. } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

/// The command currently waiting for its reply.
#[derive(Debug)]
struct InFlight {
    command: &'static Command,
    reply: oneshot::Sender<Result<TokenValue>>,
    tag: u64,
    deadline: Instant,
}

/// FIFO of pending sends with at most one command in flight.
#[derive(Debug, Default)]
pub(crate) struct SendQueue {
    pending: VecDeque<QueuedSend>,
    in_flight: Option<InFlight>,
}

impl SendQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Returns `true` if the queue was idle, meaning the
    /// entry can be issued straight away.
    pub(crate) fn push(&mut self, entry: QueuedSend) -> bool {
        let was_idle = self.is_idle();
        self.pending.push_back(entry);
        was_idle
    }

    /// Nothing waiting and nothing in flight.
    pub(crate) fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.pending.is_empty()
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Number of entries, the in-flight command included.
    pub(crate) fn len(&self) -> usize {
        self.pending.len() + usize::from(self.in_flight.is_some())
    }

    /// Take the next entry to issue, unless a command is still in flight.
    pub(crate) fn next_ready(&mut self) -> Option<QueuedSend> {
        if self.in_flight.is_some() {
            return None;
        }
        self.pending.pop_front()
    }

    /// Record `command` as written and waiting for its reply until
    /// `deadline`. Returns the marker identifying this wait.
    pub(crate) fn start(
        &mut self,
        command: &'static Command,
        reply: oneshot::Sender<Result<TokenValue>>,
        deadline: Instant,
    ) -> u64 {
        let tag = rand::random::<u64>();
        self.in_flight = Some(InFlight {
            command,
            reply,
            tag,
            deadline,
        });
        tag
    }

    /// Marker and deadline of the in-flight command, if any.
    pub(crate) fn armed(&self) -> Option<(u64, Instant)> {
        self.in_flight.as_ref().map(|f| (f.tag, f.deadline))
    }

    /// Release the in-flight command if it is named `name`, handing back
    /// its reply channel.
    pub(crate) fn complete(&mut self, name: &str) -> Option<oneshot::Sender<Result<TokenValue>>> {
        if self.in_flight.as_ref()?.command.name != name {
            return None;
        }
        self.in_flight.take().map(|f| f.reply)
    }

    /// Evict the in-flight command if its marker is still `tag`.
    pub(crate) fn evict(
        &mut self,
        tag: u64,
    ) -> Option<(&'static Command, oneshot::Sender<Result<TokenValue>>)> {
        if self.in_flight.as_ref()?.tag != tag {
            return None;
        }
        self.in_flight.take().map(|f| (f.command, f.reply))
    }

    /// Take the in-flight command whatever its marker.
    pub(crate) fn abort(&mut self) -> Option<(&'static Command, oneshot::Sender<Result<TokenValue>>)> {
        self.in_flight.take().map(|f| (f.command, f.reply))
    }

    /// Fail every entry, in flight first, with the error built by `err`.
    /// Returns how many callers were failed.
    pub(crate) fn fail_all(&mut self, err: impl Fn() -> Error) -> usize {
        let mut failed = 0;
        if let Some(f) = self.in_flight.take() {
            let _ = f.reply.send(Err(err()));
            failed += 1;
        }
        for entry in self.pending.drain(..) {
            entry.fail(err());
            failed += 1;
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::commands::{GET_NAME, GET_VERSION, HAS_LED};

    fn command_entry(
        command: &'static Command,
    ) -> (QueuedSend, oneshot::Receiver<Result<TokenValue>>) {
        let (tx, rx) = oneshot::channel();
        let entry = QueuedSend::Command {
            command,
            params: Vec::new(),
            reply: tx,
        };
        (entry, rx)
    }

    fn issue(queue: &mut SendQueue) -> u64 {
        match queue.next_ready() {
            Some(QueuedSend::Command { command, reply, .. }) => {
                queue.start(command, reply, Instant::now() + Duration::from_secs(2))
            }
            other => panic!("expected a command, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn push_reports_idle_queue() {
        let mut queue = SendQueue::new();
        let (a, _ra) = command_entry(&GET_NAME);
        let (b, _rb) = command_entry(&GET_VERSION);
        assert!(queue.push(a));
        assert!(!queue.push(b));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn one_command_in_flight() {
        let mut queue = SendQueue::new();
        let (a, _ra) = command_entry(&GET_NAME);
        let (b, _rb) = command_entry(&GET_VERSION);
        queue.push(a);
        queue.push(b);

        issue(&mut queue);
        assert!(queue.is_in_flight());
        assert!(queue.next_ready().is_none());
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn completion_matches_by_name() {
        let mut queue = SendQueue::new();
        let (a, mut ra) = command_entry(&GET_NAME);
        queue.push(a);
        issue(&mut queue);

        assert!(queue.complete("MOVE").is_none());
        assert!(queue.is_in_flight());

        let reply = queue.complete("GET_NAME").unwrap();
        reply.send(Ok(TokenValue::Text("x".into()))).unwrap();
        assert_eq!(ra.try_recv().unwrap().unwrap(), TokenValue::Text("x".into()));
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn eviction_requires_matching_tag() {
        let mut queue = SendQueue::new();
        let (a, _ra) = command_entry(&HAS_LED);
        let (b, _rb) = command_entry(&GET_NAME);
        queue.push(a);
        queue.push(b);
        let tag = issue(&mut queue);

        assert!(queue.evict(tag.wrapping_add(1)).is_none());
        let (command, _reply) = queue.evict(tag).unwrap();
        assert_eq!(command.name, "HAS_LED");
        assert!(queue.evict(tag).is_none());

        // The next entry becomes issuable.
        match queue.next_ready() {
            Some(QueuedSend::Command { command, .. }) => assert_eq!(command.name, "GET_NAME"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn abort_releases_queue_without_tag() {
        let mut queue = SendQueue::new();
        assert!(queue.abort().is_none());
        let (a, _ra) = command_entry(&GET_NAME);
        let (b, _rb) = command_entry(&GET_VERSION);
        queue.push(a);
        queue.push(b);
        let tag = issue(&mut queue);

        let (command, _reply) = queue.abort().unwrap();
        assert_eq!(command.name, "GET_NAME");
        assert!(queue.evict(tag).is_none());
        assert!(queue.armed().is_none());
        assert_eq!(queue.next_ready().map(|e| e.name()), Some("GET_VERSION"));
    }

    #[tokio::test]
    async fn armed_tracks_in_flight_command() {
        let mut queue = SendQueue::new();
        assert!(queue.armed().is_none());
        let (a, _ra) = command_entry(&GET_NAME);
        queue.push(a);
        let tag = issue(&mut queue);
        assert_eq!(queue.armed().map(|(t, _)| t), Some(tag));
        queue.complete("GET_NAME");
        assert!(queue.armed().is_none());
    }

    #[tokio::test]
    async fn fifo_order() {
        let mut queue = SendQueue::new();
        let (raw_tx, _raw_rx) = oneshot::channel();
        let (a, _ra) = command_entry(&GET_NAME);
        queue.push(a);
        queue.push(QueuedSend::Raw {
            data: vec![1, 2],
            reply: raw_tx,
        });
        let (c, _rc) = command_entry(&GET_VERSION);
        queue.push(c);

        let names: Vec<_> = std::iter::from_fn(|| queue.next_ready())
            .map(|e| e.name())
            .collect();
        assert_eq!(names, vec!["GET_NAME", "RAW", "GET_VERSION"]);
    }

    #[tokio::test]
    async fn fail_all_reaches_every_caller() {
        let mut queue = SendQueue::new();
        let (a, mut ra) = command_entry(&GET_NAME);
        let (b, mut rb) = command_entry(&GET_VERSION);
        let (raw_tx, mut raw_rx) = oneshot::channel();
        queue.push(a);
        queue.push(b);
        queue.push(QueuedSend::Raw {
            data: vec![],
            reply: raw_tx,
        });
        issue(&mut queue);

        assert_eq!(queue.fail_all(|| Error::NotConnected), 3);
        assert!(queue.is_idle());
        assert!(matches!(ra.try_recv().unwrap(), Err(Error::NotConnected)));
        assert!(matches!(rb.try_recv().unwrap(), Err(Error::NotConnected)));
        assert!(matches!(raw_rx.try_recv().unwrap(), Err(Error::NotConnected)));
    }
}
