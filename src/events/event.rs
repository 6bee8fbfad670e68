//! # Runtime events emitted by the dispatcher and its workers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: worker creation, start, stop request, exit
//! - **Dispatch events**: rejected submissions and panicking callbacks
//! - **Shutdown events**: process-wide stop-all and its completion
//! - **Subscriber events**: overflow/panic inside the fan-out layer
//!
//! The [`Event`] struct carries additional metadata such as timestamps, worker id,
//! worker name and reasons.
//!
//! These are *observability* events about the runtime. The closures queued on a
//! worker are called envelopes and never travel over the bus.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use threadvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WorkerExited)
//!     .with_worker(3)
//!     .with_name("net-io")
//!     .with_discarded(2);
//!
//! assert_eq!(ev.kind, EventKind::WorkerExited);
//! assert_eq!(ev.worker, Some(3));
//! assert_eq!(ev.name.as_deref(), Some("net-io"));
//! assert_eq!(ev.discarded, Some(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `name`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `name`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// Stop-all requested via `shutdown()`.
    ShutdownRequested,

    /// Every registered worker was joined by `wait()`.
    ///
    /// Sets:
    /// - `joined`: number of workers joined by that call
    AllStopped,

    /// The dispatcher was dropped; the subscriber fan-out drains and closes.
    DispatcherClosed,

    // === Worker lifecycle events ===
    /// Worker registered and its thread spawned.
    ///
    /// Sets:
    /// - `worker`: worker id
    /// - `name`: worker name
    WorkerCreated,

    /// `create` failed and rolled back.
    ///
    /// Sets:
    /// - `worker`: id consumed by the attempt (never reissued)
    /// - `name`: requested worker name
    /// - `reason`: error label
    CreateFailed,

    /// Worker thread entered its dispatch loop.
    ///
    /// Sets:
    /// - `worker`, `name`
    WorkerStarted,

    /// The first queued envelope was not the update envelope; the worker exits
    /// without running any event.
    ///
    /// Sets:
    /// - `worker`, `name`
    /// - `reason`: what was found instead
    SetupFailed,

    /// Stop envelope queued and wake delivered.
    ///
    /// Sets:
    /// - `worker`, `name`
    StopRequested,

    /// Worker loop finished and its queue was released.
    ///
    /// Sets:
    /// - `worker`, `name`
    /// - `discarded`: envelopes still queued at exit (dropped, never invoked)
    WorkerExited,

    // === Dispatch events ===
    /// A submission to a worker was rejected.
    ///
    /// Sets:
    /// - `worker`: raw id passed by the caller
    /// - `reason`: error label
    EnqueueRejected,

    /// An update callback or an event closure panicked; the worker keeps running.
    ///
    /// Sets:
    /// - `worker`, `name`
    /// - `reason`: panic info/message
    CallbackPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Raw worker id, if applicable.
    pub worker: Option<u64>,
    /// Worker (or subscriber) name, if applicable.
    pub name: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Envelopes dropped unrun when a worker exited.
    pub discarded: Option<u32>,
    /// Workers joined by one `wait` call.
    pub joined: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            name: None,
            reason: None,
            discarded: None,
            joined: None,
        }
    }

    /// Attaches a raw worker id.
    #[inline]
    pub fn with_worker(mut self, id: u64) -> Self {
        self.worker = Some(id);
        self
    }

    /// Attaches a worker or subscriber name.
    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a discarded-envelope count (saturates at `u32::MAX`).
    #[inline]
    pub fn with_discarded(mut self, n: usize) -> Self {
        self.discarded = Some(saturate(n));
        self
    }

    /// Attaches a joined-worker count (saturates at `u32::MAX`).
    #[inline]
    pub fn with_joined(mut self, n: usize) -> Self {
        self.joined = Some(saturate(n));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_name(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_name(subscriber)
            .with_reason(info)
    }

    /// Returns true if this event reports a subscriber that dropped an event.
    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// Returns true if this event reports a panicking subscriber.
    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

fn saturate(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Renders a `catch_unwind` payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
