use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use cnlink_frame::{classify, encode, kind_name, Frame, PacketKind};
use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

/// How long a command waits for its answer unless configured otherwise.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// Routing counters, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub measurements: u64,
    pub answers: u64,
    /// Unclaimed answers replaced by a newer one.
    pub stale_overwritten: u64,
    /// Unclaimed answers dropped before a new command was sent.
    pub stale_drained: u64,
    pub error_reports: u64,
    pub empty_dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    measurements: AtomicU64,
    answers: AtomicU64,
    stale_overwritten: AtomicU64,
    stale_drained: AtomicU64,
    error_reports: AtomicU64,
    empty_dropped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RouterStats {
        RouterStats {
            measurements: self.measurements.load(Ordering::Relaxed),
            answers: self.answers.load(Ordering::Relaxed),
            stale_overwritten: self.stale_overwritten.load(Ordering::Relaxed),
            stale_drained: self.stale_drained.load(Ordering::Relaxed),
            error_reports: self.error_reports.load(Ordering::Relaxed),
            empty_dropped: self.empty_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Dispatches inbound packets and serializes outbound commands.
///
/// `route` must only be called from the single reader thread.
/// `send_and_wait` may be called from any number of threads; callers are
/// served one at a time.
#[derive(Debug)]
pub struct Router {
    mailbox_tx: Sender<Frame>,
    mailbox_rx: Receiver<Frame>,
    measures_tx: Sender<Bytes>,
    measures_rx: Receiver<Bytes>,
    send_lock: Mutex<()>,
    counters: Counters,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        let (mailbox_tx, mailbox_rx) = bounded(1);
        let (measures_tx, measures_rx) = unbounded();
        Self {
            mailbox_tx,
            mailbox_rx,
            measures_tx,
            measures_rx,
            send_lock: Mutex::new(()),
            counters: Counters::default(),
        }
    }

    /// Route one decoded packet.
    pub fn route(&self, payload: Bytes) {
        let Some(kind) = classify(&payload) else {
            Counters::bump(&self.counters.empty_dropped);
            trace!("dropping empty packet");
            return;
        };
        trace!(kind = kind_name(kind), len = payload.len(), "routing packet");

        match kind {
            PacketKind::Measurement => {
                Counters::bump(&self.counters.measurements);
                // The router owns a receiver, so the queue can't be disconnected.
                let _ = self.measures_tx.send(payload);
            }
            PacketKind::ErrorReport => {
                Counters::bump(&self.counters.error_reports);
                match payload.get(1) {
                    Some(&code) => error!(
                        code = code as i8,
                        reason = error_reason(code as i8),
                        "control node reported an error"
                    ),
                    None => error!("control node reported an error without a code"),
                }
            }
            PacketKind::Answer => {
                Counters::bump(&self.counters.answers);
                self.deliver_answer(Frame::new(payload));
            }
        }
    }

    fn deliver_answer(&self, frame: Frame) {
        let frame = match self.mailbox_tx.try_send(frame) {
            Ok(()) => return,
            Err(TrySendError::Full(frame)) => frame,
            Err(TrySendError::Disconnected(_)) => return,
        };

        if let Ok(stale) = self.mailbox_rx.try_recv() {
            Counters::bump(&self.counters.stale_overwritten);
            warn!(
                stale = ?stale.payload.as_ref(),
                newer = ?frame.payload.as_ref(),
                "answer mailbox already full, replacing unclaimed answer"
            );
        }
        if let Err(TrySendError::Full(frame)) = self.mailbox_tx.try_send(frame) {
            warn!(answer = ?frame.payload.as_ref(), "answer mailbox refilled concurrently, dropping answer");
        }
    }

    /// Send one command and wait for its answer.
    ///
    /// `write` receives the framed wire bytes. Returns `None` on timeout, on an
    /// encoding error or when `write` fails; all three are logged.
    pub fn send_and_wait<W>(&self, write: W, payload: &[u8], timeout: Duration) -> Option<Frame>
    where
        W: FnOnce(&[u8]) -> cnlink_frame::Result<()>,
    {
        let _guard = self.send_lock.lock();

        while let Ok(stale) = self.mailbox_rx.try_recv() {
            Counters::bump(&self.counters.stale_drained);
            debug!(answer = ?stale.payload.as_ref(), "dropping stale answer before sending");
        }

        let wire = match encode(payload) {
            Ok(wire) => wire,
            Err(err) => {
                error!(command = ?payload, error = %err, "cannot frame command");
                return None;
            }
        };

        if let Err(err) = write(&wire) {
            error!(command = ?payload, error = %err, "failed to write command");
            return None;
        }
        trace!(command = ?payload, "command sent");

        match self.mailbox_rx.recv_timeout(timeout) {
            Ok(answer) => {
                trace!(answer = ?answer.payload.as_ref(), "answer received");
                Some(answer)
            }
            Err(RecvTimeoutError::Timeout) => {
                error!(command = ?payload, ?timeout, "no answer from control node");
                None
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// A receiver on the measurement queue.
    ///
    /// All receivers share one queue: each packet goes to exactly one of them.
    pub fn measurements(&self) -> Receiver<Bytes> {
        self.measures_rx.clone()
    }

    pub fn stats(&self) -> RouterStats {
        self.counters.snapshot()
    }
}

/// Control node firmware error codes carried by an error frame.
fn error_reason(code: i8) -> &'static str {
    match code {
        -1 => "network queue overflow",
        -2 => "application queue overflow",
        -3 => "firmware invariant violated",
        _ => "unknown",
    }
}
