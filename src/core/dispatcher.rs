//! # Dispatcher: worker registry plus the lifecycle API.
//!
//! The [`Dispatcher`] owns the event bus, the bounded worker [`Registry`] and the
//! optional subscriber fan-out. Every operation is synchronous and callable from
//! any thread.
//!
//! ## High-level architecture
//! ```text
//! create(spec)
//!   ├─ id = fetch_add(1) + 1              (never reused, burnt on failure)
//!   ├─ copy name, reserve queue           (fallible → Allocation)
//!   ├─ queue.push(Update(spec.update))    (always the first envelope)
//!   └─ registry.insert(id, spawn)         (full → CapacityExhausted, spawn → Spawn)
//!         └──► thread "threadvisor-<name>" runs Worker::run()
//!
//! enqueue(id, f) ──► lookup(id) ──► queue.push(Event(f))
//! stop(id)       ──► lookup(id) ──► queue.push(Stop) ──► cancel wake token ──► queue.wake()
//! wait()         ──► per slot: lock join cell ──► join ──► free slot ──► AllStopped
//! shutdown()     ──► ShutdownRequested ──► stop every running worker ──► wait()
//! ```
//!
//! ## Rules
//! - A failed `create` drops everything it allocated; no slot is taken.
//! - A failed `enqueue`/`stop` has no side effect besides an `EnqueueRejected` event.
//! - `stop` returns once exit is requested, not once the worker exited.
//! - `wait`/`shutdown` block without timeout, also when another `wait` is in flight.
//! - A worker calling `wait`/`shutdown` from its own callback never joins itself.
//! - Dropping the dispatcher requests a stop of every running worker without joining
//!   them, then closes the subscriber fan-out.
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use threadvisor::{Config, Dispatcher, WorkerSpec};
//!
//! let dispatcher = Dispatcher::new(Config::default());
//! let id = dispatcher.create(WorkerSpec::new("printer")).unwrap();
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! for n in 0..3 {
//!     let log = Arc::clone(&log);
//!     dispatcher.enqueue(id, move || log.lock().unwrap().push(n)).unwrap();
//! }
//!
//! dispatcher.stop(id).unwrap();
//! dispatcher.wait();
//! assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
//! ```

use std::borrow::Cow;
use std::sync::Arc;
use std::thread;

use tokio::sync::broadcast;

use crate::{
    config::Config,
    error::DispatchError,
    events::{Bus, Event, EventKind},
    queue::EventQueue,
    worker::{Envelope, UpdateFn, WorkerId, WorkerSpec},
};

use super::{
    builder::DispatcherBuilder,
    registry::{Registry, WorkerInfo},
    worker::{ExitReason, Worker, WorkerShared},
};

/// Bounded set of named workers, each draining its own FIFO on its own thread.
pub struct Dispatcher {
    cfg: Config,
    bus: Bus,
    registry: Registry,
    fanout: Option<thread::JoinHandle<()>>,
}

impl Dispatcher {
    /// Creates a dispatcher without subscribers.
    pub fn new(cfg: Config) -> Self {
        DispatcherBuilder::new(cfg).build()
    }

    /// Returns a builder to attach subscribers.
    pub fn builder(cfg: Config) -> DispatcherBuilder {
        DispatcherBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        registry: Registry,
        fanout: Option<thread::JoinHandle<()>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            registry,
            fanout,
        }
    }

    /// Returns the configuration this dispatcher was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Creates a worker and spawns its thread.
    ///
    /// The returned id is the next one in a strictly increasing sequence starting
    /// at 1. On failure the consumed id is never reissued and every allocation made
    /// by the attempt is released.
    pub fn create(&self, spec: WorkerSpec) -> Result<WorkerId, DispatchError> {
        let id = self.registry.issue_id();
        let (name, update) = spec.into_parts();

        match self.spawn_worker(id, &name, update) {
            Ok(()) => {
                self.bus.publish(
                    Event::new(EventKind::WorkerCreated)
                        .with_worker(id.get())
                        .with_name(&*name),
                );
                Ok(id)
            }
            Err(err) => {
                tracing::warn!(worker = id.get(), name = %name, error = %err, "failed to create worker");
                self.bus.publish(
                    Event::new(EventKind::CreateFailed)
                        .with_worker(id.get())
                        .with_name(&*name)
                        .with_reason(err.as_label()),
                );
                Err(err)
            }
        }
    }

    fn spawn_worker(
        &self,
        id: WorkerId,
        name: &Cow<'static, str>,
        update: Option<UpdateFn>,
    ) -> Result<(), DispatchError> {
        let label = copy_name(name)?;
        let queue = EventQueue::with_capacity(self.cfg.queue_capacity_clamped())
            .map_err(|_| DispatchError::Allocation { what: "queue" })?;
        queue
            .push(Envelope::Update(update))
            .map_err(|err| DispatchError::from_queue(id.get(), err))?;

        let shared = Arc::new(WorkerShared::new(label, queue));
        let worker = Worker::new(
            id,
            Arc::clone(&shared),
            self.bus.clone(),
            self.cfg.park_timeout(),
        );

        let mut builder = thread::Builder::new().name(thread_name(name));
        if let Some(size) = self.cfg.thread_stack_size() {
            builder = builder.stack_size(size);
        }

        self.registry.insert(id, shared, move || {
            builder
                .spawn(move || worker.run())
                .map_err(|source| DispatchError::Spawn {
                    name: name.to_string(),
                    source,
                })
        })
    }

    /// Queues `f` on worker `id`.
    ///
    /// `f` runs on the worker thread after every event queued on the same worker
    /// before it, and before every event queued after it.
    pub fn enqueue<F>(&self, id: WorkerId, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        let shared = self.resolve(id)?;
        shared
            .queue
            .push(Envelope::Event(Box::new(f)))
            .map_err(|err| DispatchError::from_queue(id.get(), err))
            .inspect_err(|err| self.reject(id, err))
    }

    /// Requests worker `id` to stop after the events already queued on it.
    ///
    /// Also cancels the worker's wake token, which its update callback receives, and
    /// unparks the worker if it waits on an empty queue.
    pub fn stop(&self, id: WorkerId) -> Result<(), DispatchError> {
        let shared = self.resolve(id)?;
        self.request_stop(id, &shared)
            .inspect_err(|err| self.reject(id, err))
    }

    fn request_stop(&self, id: WorkerId, shared: &WorkerShared) -> Result<(), DispatchError> {
        if !shared.is_running() {
            return Err(DispatchError::NotRunning { id: id.get() });
        }
        shared
            .queue
            .push(Envelope::Stop)
            .map_err(|err| DispatchError::from_queue(id.get(), err))?;
        shared.wake();

        self.bus.publish(
            Event::new(EventKind::StopRequested)
                .with_worker(id.get())
                .with_name(shared.name().as_str()),
        );
        Ok(())
    }

    /// Joins every registered worker and frees its slot.
    ///
    /// Blocks until each worker thread exited; a worker nobody stops keeps this
    /// call blocked. Returns the exit reason of every worker this call joined,
    /// sorted by id. A worker that a concurrent `wait` is already joining still
    /// blocks this call, but is reported by the other caller only.
    ///
    /// Called from a worker callback, the calling worker is skipped: its slot stays
    /// registered until a later `wait` from another thread.
    pub fn wait(&self) -> Vec<(WorkerId, ExitReason)> {
        let exited = self.registry.join_all();
        self.bus
            .publish(Event::new(EventKind::AllStopped).with_joined(exited.len()));
        exited
    }

    /// Stops every running worker, then [`wait`](Self::wait)s for all of them.
    pub fn shutdown(&self) -> Vec<(WorkerId, ExitReason)> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.stop_all();
        self.wait()
    }

    fn stop_all(&self) {
        for (id, shared) in self.registry.running() {
            if let Err(err) = self.request_stop(id, &shared) {
                // the worker stopped between the snapshot and the request
                tracing::debug!(worker = id.get(), error = %err, "stop skipped");
            }
        }
    }

    /// Returns a snapshot of every registered worker, sorted by id.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.registry.infos()
    }

    /// Returns true if `id` is registered and has not executed a stop request.
    pub fn is_running(&self, id: WorkerId) -> bool {
        self.registry
            .lookup(id)
            .is_ok_and(|shared| shared.is_running())
    }

    /// Returns the number of registered (not yet joined) workers.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns true if no worker is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of registered workers.
    pub fn capacity(&self) -> usize {
        self.registry.capacity()
    }

    /// Returns a raw receiver of runtime events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    fn resolve(&self, id: WorkerId) -> Result<Arc<WorkerShared>, DispatchError> {
        self.registry
            .lookup(id)
            .inspect_err(|err| self.reject(id, err))
    }

    fn reject(&self, id: WorkerId, err: &DispatchError) {
        tracing::warn!(worker = id.get(), error = %err, "submission rejected");
        self.bus.publish(
            Event::new(EventKind::EnqueueRejected)
                .with_worker(id.get())
                .with_reason(err.as_label()),
        );
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop_all();
        self.bus.publish(Event::new(EventKind::DispatcherClosed));
        if let Some(fanout) = self.fanout.take() {
            let _ = fanout.join();
        }
    }
}

/// Copies the worker name with fallible reservation.
fn copy_name(name: &str) -> Result<String, DispatchError> {
    let mut owned = String::new();
    owned
        .try_reserve_exact(name.len())
        .map_err(|_| DispatchError::Allocation { what: "name" })?;
    owned.push_str(name);
    Ok(owned)
}

/// OS thread names may not contain NUL bytes.
fn thread_name(name: &str) -> String {
    let clean: String = name.chars().filter(|c| *c != '\0').collect();
    format!("threadvisor-{clean}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscribers::Subscribe;
    use parking_lot::Mutex;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    /// Counts drops of the values captured by queued closures.
    #[derive(Clone)]
    struct DropTracker(Arc<AtomicUsize>);

    impl Drop for DropTracker {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wait_for_kind(rx: &mut broadcast::Receiver<Event>, kind: EventKind, worker: WorkerId) {
        loop {
            let ev = rx.blocking_recv().unwrap();
            if ev.kind == kind && ev.worker == Some(worker.get()) {
                return;
            }
        }
    }

    #[test]
    fn test_events_run_in_submission_order_and_update_ticks() {
        let d = Dispatcher::new(Config::default());
        let counter = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));

        let c = Arc::clone(&counter);
        let id = d
            .create(WorkerSpec::new("w").with_update(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        for mark in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            d.enqueue(id, move || log.lock().push(mark)).unwrap();
        }
        d.stop(id).unwrap();
        let exited = d.wait();

        assert_eq!(exited, vec![(id, ExitReason::Stopped)]);
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
        assert!(counter.load(Ordering::SeqCst) >= 1);
        assert!(d.is_empty());
    }

    #[test]
    fn test_concurrent_create_issues_unique_increasing_ids() {
        let d = Arc::new(Dispatcher::new(Config::default()));
        let creators: Vec<_> = (0..8)
            .map(|n| {
                let d = Arc::clone(&d);
                thread::spawn(move || {
                    (0..4)
                        .map(|i| d.create(WorkerSpec::new(format!("w{n}-{i}"))).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<u64> = Vec::new();
        for creator in creators {
            let per_thread = creator.join().unwrap();
            assert!(per_thread.windows(2).all(|w| w[0] < w[1]));
            ids.extend(per_thread.into_iter().map(WorkerId::get));
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=32).collect::<Vec<_>>());

        assert_eq!(d.shutdown().len(), 32);
    }

    #[test]
    fn test_create_beyond_capacity_fails_without_touching_others() {
        let cfg = Config {
            capacity: 3,
            ..Config::default()
        };
        let d = Dispatcher::new(cfg);
        let ids: Vec<WorkerId> = (0..3)
            .map(|i| d.create(WorkerSpec::new(format!("w{i}"))).unwrap())
            .collect();

        let err = d.create(WorkerSpec::new("overflow")).unwrap_err();
        assert!(matches!(err, DispatchError::CapacityExhausted { capacity: 3 }));
        assert_eq!(d.len(), 3);

        let hits = Arc::new(AtomicUsize::new(0));
        for id in &ids {
            let hits = Arc::clone(&hits);
            d.enqueue(*id, move || {
                hits.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        d.shutdown();
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        // slots are free again, ids keep increasing past the burnt one
        let next = d.create(WorkerSpec::new("again")).unwrap();
        assert_eq!(next.get(), 5);
        d.shutdown();
    }

    #[test]
    fn test_invalid_ids_are_rejected() {
        let d = Dispatcher::new(Config::default());
        let id = d.create(WorkerSpec::new("only")).unwrap();

        assert!(matches!(
            d.enqueue(WorkerId::INVALID, || {}),
            Err(DispatchError::InvalidId { id: 0 })
        ));
        assert!(matches!(
            d.enqueue(WorkerId::from_raw(99), || {}),
            Err(DispatchError::InvalidId { id: 99 })
        ));
        assert!(matches!(
            d.stop(WorkerId::INVALID),
            Err(DispatchError::InvalidId { id: 0 })
        ));
        assert!(matches!(
            d.stop(WorkerId::from_raw(u64::MAX)),
            Err(DispatchError::InvalidId { .. })
        ));

        assert!(d.is_running(id));
        d.shutdown();
    }

    #[test]
    fn test_events_after_exit_are_rejected() {
        let d = Dispatcher::new(Config::default());
        let mut rx = d.subscribe();
        let id = d.create(WorkerSpec::new("short-lived")).unwrap();

        d.stop(id).unwrap();
        wait_for_kind(&mut rx, EventKind::WorkerExited, id);

        assert!(!d.is_running(id));
        assert!(matches!(
            d.enqueue(id, || {}),
            Err(DispatchError::WorkerStopped { .. })
        ));
        assert!(matches!(d.stop(id), Err(DispatchError::NotRunning { .. })));

        d.wait();
        assert!(matches!(
            d.enqueue(id, || {}),
            Err(DispatchError::UnknownWorker { .. })
        ));
    }

    #[test]
    fn test_shutdown_releases_queues_names_and_envelopes() {
        let d = Dispatcher::new(Config::default());
        let drops = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Barrier::new(2));

        let tracker = DropTracker(Arc::clone(&drops));
        let id = d
            .create(WorkerSpec::new("tracked").with_update(move |_| {
                let _held = &tracker;
            }))
            .unwrap();
        let weak = Arc::downgrade(&d.registry.lookup(id).unwrap());

        // hold the worker so the stop and the late events queue up behind it
        let g = Arc::clone(&gate);
        d.enqueue(id, move || {
            g.wait();
        })
        .unwrap();
        for _ in 0..3 {
            let tracker = DropTracker(Arc::clone(&drops));
            d.enqueue(id, move || drop(tracker)).unwrap();
        }
        d.stop(id).unwrap();
        for _ in 0..2 {
            let tracker = DropTracker(Arc::clone(&drops));
            d.enqueue(id, move || drop(tracker)).unwrap();
        }
        gate.wait();
        d.shutdown();

        // 1 update closure + 3 run events + 2 discarded events
        assert_eq!(drops.load(Ordering::SeqCst), 6);
        assert!(weak.upgrade().is_none(), "worker state released after join");
        assert!(d.workers().is_empty());
    }

    #[test]
    fn test_shutdown_during_wait_blocks_until_worker_exits() {
        let d = Arc::new(Dispatcher::new(Config::default()));
        let id = d.create(WorkerSpec::new("slow")).unwrap();
        let done = Arc::new(AtomicBool::new(false));
        let entered = Arc::new(Barrier::new(2));

        let (flag, gate) = (Arc::clone(&done), Arc::clone(&entered));
        d.enqueue(id, move || {
            gate.wait();
            thread::sleep(Duration::from_millis(300));
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
        d.stop(id).unwrap();

        let waiter = {
            let d = Arc::clone(&d);
            thread::spawn(move || d.wait())
        };
        entered.wait();
        thread::sleep(Duration::from_millis(50));
        let second = d.shutdown();

        assert!(done.load(Ordering::SeqCst), "shutdown returned before the worker exited");
        assert!(d.is_empty());
        let mut exited = waiter.join().unwrap();
        exited.extend(second);
        assert_eq!(exited, vec![(id, ExitReason::Stopped)]);
    }

    #[test]
    fn test_shutdown_from_worker_callback_keeps_slots_joinable() {
        let cfg = Config {
            capacity: 2,
            ..Config::default()
        };
        let d = Arc::new(Dispatcher::new(cfg));
        let w1 = d.create(WorkerSpec::new("w1")).unwrap();
        let w2 = d.create(WorkerSpec::new("w2")).unwrap();
        let inner = Arc::new(Mutex::new(None));

        let (dd, out) = (Arc::clone(&d), Arc::clone(&inner));
        d.enqueue(w1, move || {
            *out.lock() = Some(dd.shutdown());
        })
        .unwrap();

        let outer = d.wait();
        assert_eq!(outer, vec![(w1, ExitReason::Stopped)]);
        assert_eq!(*inner.lock(), Some(vec![(w2, ExitReason::Stopped)]));
        assert!(d.is_empty());

        let w3 = d.create(WorkerSpec::new("w3")).unwrap();
        assert_eq!(w3.get(), 3);
        d.shutdown();
    }

    #[test]
    fn test_name_released_when_worker_exits() {
        let d = Dispatcher::new(Config::default());
        let mut rx = d.subscribe();
        let id = d.create(WorkerSpec::new("named")).unwrap();
        assert_eq!(d.workers()[0].name, "named");

        d.stop(id).unwrap();
        wait_for_kind(&mut rx, EventKind::WorkerExited, id);

        let infos = d.workers();
        assert_eq!(infos.len(), 1, "slot stays until joined");
        assert!(infos[0].name.is_empty());
        d.wait();
    }

    #[test]
    fn test_all_stopped_reports_joined_count() {
        let d = Dispatcher::new(Config::default());
        let mut rx = d.subscribe();
        for i in 0..3 {
            d.create(WorkerSpec::new(format!("w{i}"))).unwrap();
        }
        d.shutdown();

        let all = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|ev| ev.kind == EventKind::AllStopped)
            .expect("all-stopped published");
        assert_eq!(all.joined, Some(3));
        assert_eq!(all.discarded, None);
    }

    #[test]
    fn test_stop_wakes_blocking_update_callback() {
        let d = Dispatcher::new(Config::default());
        let id = d
            .create(WorkerSpec::new("poller").with_update(|token| {
                let deadline = Instant::now() + Duration::from_secs(10);
                while !token.is_cancelled() && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(1));
                }
            }))
            .unwrap();

        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        d.stop(id).unwrap();
        d.wait();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_producers_on_many_threads_keep_per_producer_order() {
        let d = Arc::new(Dispatcher::new(Config::default()));
        let id = d.create(WorkerSpec::new("sink")).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let d = Arc::clone(&d);
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for n in 0..100u32 {
                        let log = Arc::clone(&log);
                        d.enqueue(id, move || log.lock().push((p, n))).unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        d.shutdown();

        let log = log.lock();
        assert_eq!(log.len(), 400);
        for p in 0..4u32 {
            let seq: Vec<u32> = log.iter().filter(|(q, _)| *q == p).map(|(_, n)| *n).collect();
            assert_eq!(seq, (0..100).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_workers_snapshot() {
        let d = Dispatcher::new(Config::default());
        let a = d.create(WorkerSpec::new("alpha")).unwrap();
        let b = d.create(WorkerSpec::new("beta")).unwrap();

        let infos = d.workers();
        assert_eq!(infos.len(), 2);
        assert_eq!((infos[0].id, infos[0].name.as_str()), (a, "alpha"));
        assert_eq!((infos[1].id, infos[1].name.as_str()), (b, "beta"));
        assert!(infos.iter().all(|i| i.running));
        assert_eq!(d.capacity(), 32);

        d.shutdown();
    }

    #[derive(Default)]
    struct Recorder {
        kinds: Mutex<Vec<EventKind>>,
    }

    impl Subscribe for Recorder {
        fn on_event(&self, event: &Event) {
            self.kinds.lock().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[test]
    fn test_subscribers_observe_lifecycle() {
        let rec = Arc::new(Recorder::default());
        let d = Dispatcher::builder(Config::default())
            .with_subscribers(vec![rec.clone() as Arc<dyn Subscribe>])
            .build();

        let id = d.create(WorkerSpec::new("observed")).unwrap();
        let _ = d.enqueue(WorkerId::from_raw(42), || {});
        d.stop(id).unwrap();
        d.wait();
        drop(d);

        let kinds = rec.kinds.lock();
        for kind in [
            EventKind::WorkerCreated,
            EventKind::WorkerStarted,
            EventKind::EnqueueRejected,
            EventKind::StopRequested,
            EventKind::WorkerExited,
            EventKind::AllStopped,
            EventKind::DispatcherClosed,
        ] {
            assert!(kinds.contains(&kind), "missing {kind:?} in {kinds:?}");
        }
        let pos = |k| kinds.iter().position(|x| *x == k).unwrap();
        assert!(pos(EventKind::WorkerCreated) < pos(EventKind::WorkerExited));
        assert_eq!(kinds.last(), Some(&EventKind::DispatcherClosed));
    }

    #[test]
    fn test_thread_name_strips_nul() {
        assert_eq!(thread_name("a\0b"), "threadvisor-ab");
    }
}
