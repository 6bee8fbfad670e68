//! # Worker: the per-thread dispatch loop.
//!
//! Drains one [`EventQueue`] on its own OS thread, invoking the update callback on
//! every iteration and each queued event exactly once.
//!
//! ## State machine
//! ```text
//! spawn ──► WorkerStarted
//!             │
//!             ├─ first envelope is not Update ──► SetupFailed ─────────┐
//!             ▼                                                        │
//!          RUNNING                                                     │
//!   loop while running {                                               │
//!     ├─► update(&wake)                (every iteration, if any)       │
//!     └─► queue.pop(&wake, idle)                                       │
//!           ├─ Event(f) ─► f()         (then dropped)                  │
//!           ├─ Stop     ─► running = false                             │
//!           └─ Cancelled / TimedOut ─► loop                            │
//!   }                                                                  │
//!             ▼                                                        ▼
//!          EXITING: drop update, close queue, drop leftovers unrun ─► WorkerExited
//! ```
//!
//! ## Rules
//! - `running` is written only by this thread (and at slot allocation); other threads
//!   read it with `Acquire`.
//! - A stop request is an ordinary envelope, so every event queued before it runs first.
//! - Panicking callbacks are caught and reported as `CallbackPanicked`; the loop goes on.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard};
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind, panic_message};
use crate::queue::{EventQueue, Pop};
use crate::worker::{Envelope, WorkerId};

/// Why a worker thread finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// A stop request was dequeued and executed.
    Stopped,
    /// The update envelope was missing at loop start; no event ran.
    SetupFailed,
    /// The worker thread itself panicked outside any callback.
    Panicked,
}

impl ExitReason {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExitReason::Stopped => "stopped",
            ExitReason::SetupFailed => "setup_failed",
            ExitReason::Panicked => "panicked",
        }
    }
}

/// State shared between a worker thread and the registry.
pub(crate) struct WorkerShared {
    /// Emptied (and its buffer freed) when the loop exits.
    name: RwLock<String>,
    running: AtomicBool,
    wake: CancellationToken,
    pub(crate) queue: EventQueue<Envelope>,
}

impl WorkerShared {
    pub(crate) fn new(name: String, queue: EventQueue<Envelope>) -> Self {
        Self {
            name: RwLock::new(name),
            running: AtomicBool::new(true),
            wake: CancellationToken::new(),
            queue,
        }
    }

    pub(crate) fn name(&self) -> RwLockReadGuard<'_, String> {
        self.name.read()
    }

    /// Moves the name out, leaving an unallocated empty string behind.
    fn take_name(&self) -> String {
        std::mem::take(&mut *self.name.write())
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Cancels the wake token and unparks the worker if it waits on its queue.
    pub(crate) fn wake(&self) {
        self.wake.cancel();
        self.queue.wake();
    }
}

/// Owns one worker's side of the dispatch protocol.
pub(crate) struct Worker {
    id: WorkerId,
    shared: Arc<WorkerShared>,
    bus: Bus,
    park_timeout: Option<Duration>,
}

impl Worker {
    pub(crate) fn new(
        id: WorkerId,
        shared: Arc<WorkerShared>,
        bus: Bus,
        park_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            shared,
            bus,
            park_timeout,
        }
    }

    /// Runs the dispatch loop to completion. Called on the worker's own thread.
    pub(crate) fn run(self) -> ExitReason {
        self.bus.publish(self.event(EventKind::WorkerStarted));

        let mut update = match self.shared.queue.try_pop() {
            Some(Envelope::Update(update)) => update,
            other => {
                let found = other.as_ref().map_or("empty queue", Envelope::kind);
                let name = self.shared.name();
                tracing::error!(
                    worker = self.id.get(),
                    name = name.as_str(),
                    found,
                    "update envelope missing; worker exits without running events"
                );
                drop(name);
                self.bus.publish(
                    self.event(EventKind::SetupFailed)
                        .with_reason(format!("expected update envelope, found {found}")),
                );
                drop(other);
                return self.finish(ExitReason::SetupFailed);
            }
        };

        while self.shared.is_running() {
            if let Some(update) = update.as_mut() {
                self.guarded(|| update(&self.shared.wake));
            }

            match self.shared.queue.pop(&self.shared.wake, self.park_timeout) {
                Pop::Item(Envelope::Event(f)) => self.guarded(f),
                Pop::Item(Envelope::Stop) => self.shared.running.store(false, Ordering::Release),
                Pop::Item(Envelope::Update(_)) => {
                    let name = self.shared.name();
                    tracing::warn!(
                        worker = self.id.get(),
                        name = name.as_str(),
                        "stray update envelope dropped"
                    );
                }
                Pop::Cancelled | Pop::TimedOut => {}
                Pop::Closed => break,
            }
        }

        drop(update);
        self.finish(ExitReason::Stopped)
    }

    /// Closes the queue, drops leftovers unrun and reports the exit.
    fn finish(self, reason: ExitReason) -> ExitReason {
        let leftovers = self.shared.queue.close();
        let discarded = leftovers.len();
        drop(leftovers);
        self.shared.running.store(false, Ordering::Release);
        let name = self.shared.take_name();

        tracing::debug!(
            worker = self.id.get(),
            name = name.as_str(),
            discarded,
            reason = reason.as_label(),
            "worker exited"
        );
        self.bus.publish(
            Event::new(EventKind::WorkerExited)
                .with_worker(self.id.get())
                .with_name(name)
                .with_discarded(discarded)
                .with_reason(reason.as_label()),
        );
        reason
    }

    /// Invokes a callback, reporting a panic instead of unwinding the loop.
    fn guarded(&self, f: impl FnOnce()) {
        if let Err(panic_err) = catch_unwind(AssertUnwindSafe(f)) {
            let info = panic_message(&*panic_err);
            {
                let name = self.shared.name();
                tracing::error!(
                    worker = self.id.get(),
                    name = name.as_str(),
                    info = %info,
                    "callback panicked"
                );
            }
            self.bus
                .publish(self.event(EventKind::CallbackPanicked).with_reason(info));
        }
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_worker(self.id.get())
            .with_name(self.shared.name().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::thread;

    fn shared_with(envelopes: Vec<Envelope>) -> Arc<WorkerShared> {
        let queue = EventQueue::with_capacity(4).unwrap();
        for env in envelopes {
            queue.push(env).unwrap();
        }
        Arc::new(WorkerShared::new("test-worker".to_string(), queue))
    }

    fn record(log: &Arc<Mutex<Vec<&'static str>>>, mark: &'static str) -> Envelope {
        let log = Arc::clone(log);
        Envelope::Event(Box::new(move || log.lock().push(mark)))
    }

    #[test]
    fn test_events_run_in_order_before_stop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = shared_with(vec![
            Envelope::Update(None),
            record(&log, "a"),
            record(&log, "b"),
            Envelope::Stop,
            record(&log, "after-stop"),
        ]);

        let worker = Worker::new(WorkerId::from_raw(1), Arc::clone(&shared), Bus::new(8), None);
        assert_eq!(worker.run(), ExitReason::Stopped);

        assert_eq!(*log.lock(), vec!["a", "b"]);
        assert!(!shared.is_running());
        assert!(shared.queue.is_closed());
        assert!(shared.queue.is_empty());
    }

    #[test]
    fn test_name_released_at_exit_but_reported() {
        let shared = shared_with(vec![Envelope::Update(None), Envelope::Stop]);
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();

        Worker::new(WorkerId::from_raw(8), Arc::clone(&shared), bus, None).run();

        assert!(shared.name().is_empty());
        assert_eq!(shared.name().capacity(), 0);
        let exited = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|ev| ev.kind == EventKind::WorkerExited)
            .expect("exit reported");
        assert_eq!(exited.name.as_deref(), Some("test-worker"));
    }

    #[test]
    fn test_missing_update_envelope_fails_setup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = shared_with(vec![record(&log, "never"), Envelope::Stop]);
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();

        let worker = Worker::new(WorkerId::from_raw(2), Arc::clone(&shared), bus, None);
        assert_eq!(worker.run(), ExitReason::SetupFailed);

        assert!(log.lock().is_empty());
        assert!(!shared.is_running());

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|ev| ev.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::WorkerStarted,
                EventKind::SetupFailed,
                EventKind::WorkerExited
            ]
        );
    }

    #[test]
    fn test_empty_queue_fails_setup() {
        let shared = shared_with(Vec::new());
        let worker = Worker::new(WorkerId::from_raw(3), shared, Bus::new(8), None);
        assert_eq!(worker.run(), ExitReason::SetupFailed);
    }

    #[test]
    fn test_update_runs_every_iteration() {
        let ticks = Arc::new(Mutex::new(0u32));
        let t = Arc::clone(&ticks);
        let update: crate::worker::UpdateFn = Box::new(move |_| *t.lock() += 1);
        let shared = shared_with(vec![
            Envelope::Update(Some(update)),
            Envelope::Event(Box::new(|| {})),
            Envelope::Event(Box::new(|| {})),
            Envelope::Stop,
        ]);

        Worker::new(WorkerId::from_raw(4), shared, Bus::new(8), None).run();
        assert_eq!(*ticks.lock(), 3, "one update per dequeued envelope");
    }

    #[test]
    fn test_panicking_event_does_not_stop_worker() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = shared_with(vec![
            Envelope::Update(None),
            Envelope::Event(Box::new(|| panic!("event exploded"))),
            record(&log, "survived"),
            Envelope::Stop,
        ]);
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();

        let reason = Worker::new(WorkerId::from_raw(5), shared, bus, None).run();
        assert_eq!(reason, ExitReason::Stopped);
        assert_eq!(*log.lock(), vec!["survived"]);

        let panicked = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|ev| ev.kind == EventKind::CallbackPanicked)
            .expect("panic reported");
        assert_eq!(panicked.reason.as_deref(), Some("event exploded"));
    }

    #[test]
    fn test_idle_timeout_keeps_update_ticking() {
        let ticks = Arc::new(Mutex::new(0u32));
        let t = Arc::clone(&ticks);
        let update: crate::worker::UpdateFn = Box::new(move |_| *t.lock() += 1);
        let shared = shared_with(vec![Envelope::Update(Some(update))]);

        let handle = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                Worker::new(
                    WorkerId::from_raw(6),
                    shared,
                    Bus::new(8),
                    Some(Duration::from_millis(5)),
                )
                .run()
            })
        };

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while *ticks.lock() < 3 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        shared.queue.push(Envelope::Stop).unwrap();
        shared.wake();

        assert_eq!(handle.join().unwrap(), ExitReason::Stopped);
        assert!(*ticks.lock() >= 3);
    }

    #[test]
    fn test_wake_unparks_idle_worker_and_stop_is_honored() {
        let shared = shared_with(vec![Envelope::Update(None)]);
        let handle = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || Worker::new(WorkerId::from_raw(7), shared, Bus::new(8), None).run())
        };

        thread::sleep(Duration::from_millis(20));
        shared.queue.push(Envelope::Stop).unwrap();
        shared.wake();

        assert_eq!(handle.join().unwrap(), ExitReason::Stopped);
    }
}
