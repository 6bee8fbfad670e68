//! # Process-wide lifecycle API.
//!
//! Free functions over one process-wide [`Dispatcher`], for subsystems that share
//! workers by id without passing a dispatcher around.
//!
//! ```text
//! init() ──► GLOBAL = Dispatcher::new(Config::default())   (id counter back to 0)
//! create / enqueue / stop ──► GLOBAL ──► Dispatcher::{create, enqueue, stop}
//! wait / shutdown         ──► GLOBAL ──► Dispatcher::{wait, shutdown}
//! ```
//!
//! ## Rules
//! - Call [`init`] (or [`init_with`] / [`install`]) once before any other function;
//!   until then `create`/`enqueue`/`stop` fail with [`DispatchError::NotInitialized`]
//!   and `wait`/`shutdown` return nothing.
//! - Re-initializing drops the previous dispatcher: its running workers are asked to
//!   stop and are no longer reachable by id. Do not re-initialize concurrently with
//!   other calls.
//!
//! ## Example
//! ```rust
//! use threadvisor::{WorkerSpec, global};
//!
//! global::init();
//! let id = global::create(WorkerSpec::new("io")).unwrap();
//! global::enqueue(id, || println!("on the io worker")).unwrap();
//! global::shutdown();
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    config::Config,
    core::{Dispatcher, ExitReason},
    error::DispatchError,
    worker::{WorkerId, WorkerSpec},
};

static GLOBAL: RwLock<Option<Arc<Dispatcher>>> = RwLock::new(None);

/// Installs a fresh process-wide dispatcher with the default [`Config`].
pub fn init() {
    init_with(Config::default());
}

/// Installs a fresh process-wide dispatcher with `cfg`.
pub fn init_with(cfg: Config) {
    install(Dispatcher::new(cfg));
}

/// Installs `dispatcher` (e.g. one built with subscribers) as the process-wide one.
pub fn install(dispatcher: Dispatcher) {
    let previous = GLOBAL.write().replace(Arc::new(dispatcher));
    // dropped outside the lock: Drop joins the subscriber fan-out
    drop(previous);
}

fn current() -> Result<Arc<Dispatcher>, DispatchError> {
    GLOBAL.read().clone().ok_or(DispatchError::NotInitialized)
}

/// See [`Dispatcher::create`].
pub fn create(spec: WorkerSpec) -> Result<WorkerId, DispatchError> {
    current()?.create(spec)
}

/// See [`Dispatcher::enqueue`].
pub fn enqueue<F>(id: WorkerId, f: F) -> Result<(), DispatchError>
where
    F: FnOnce() + Send + 'static,
{
    current()?.enqueue(id, f)
}

/// See [`Dispatcher::stop`].
pub fn stop(id: WorkerId) -> Result<(), DispatchError> {
    current()?.stop(id)
}

/// See [`Dispatcher::wait`].
pub fn wait() -> Vec<(WorkerId, ExitReason)> {
    current().map(|d| d.wait()).unwrap_or_default()
}

/// See [`Dispatcher::shutdown`].
pub fn shutdown() -> Vec<(WorkerId, ExitReason)> {
    current().map(|d| d.shutdown()).unwrap_or_default()
}

/// Returns the process-wide dispatcher, if initialized.
pub fn dispatcher() -> Option<Arc<Dispatcher>> {
    GLOBAL.read().clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn uninstall() {
        let previous = GLOBAL.write().take();
        drop(previous);
    }

    #[test]
    #[serial]
    fn test_calls_before_init_fail() {
        uninstall();
        assert!(matches!(
            create(WorkerSpec::new("early")),
            Err(DispatchError::NotInitialized)
        ));
        assert!(matches!(
            enqueue(WorkerId::from_raw(1), || {}),
            Err(DispatchError::NotInitialized)
        ));
        assert!(matches!(
            stop(WorkerId::from_raw(1)),
            Err(DispatchError::NotInitialized)
        ));
        assert!(wait().is_empty());
        assert!(shutdown().is_empty());
    }

    #[test]
    #[serial]
    fn test_ordered_log_scenario() {
        init();
        let counter = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));

        let c = Arc::clone(&counter);
        let id = create(WorkerSpec::new("scenario").with_update(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        assert_eq!(id.get(), 1);

        for mark in ["m1", "m2", "m3"] {
            let log = Arc::clone(&log);
            enqueue(id, move || log.lock().push(mark)).unwrap();
        }
        stop(id).unwrap();
        assert_eq!(wait(), vec![(id, ExitReason::Stopped)]);

        assert_eq!(*log.lock(), vec!["m1", "m2", "m3"]);
        assert!(counter.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    #[serial]
    fn test_init_resets_id_counter() {
        init();
        assert_eq!(create(WorkerSpec::new("a")).unwrap().get(), 1);
        assert_eq!(create(WorkerSpec::new("b")).unwrap().get(), 2);
        assert_eq!(shutdown().len(), 2);

        init();
        assert_eq!(create(WorkerSpec::new("c")).unwrap().get(), 1);
        shutdown();
    }

    #[test]
    #[serial]
    fn test_invalid_ids_through_global_api() {
        init_with(Config {
            capacity: 2,
            ..Config::default()
        });
        assert!(matches!(
            enqueue(WorkerId::INVALID, || {}),
            Err(DispatchError::InvalidId { id: 0 })
        ));
        assert!(matches!(
            stop(WorkerId::from_raw(7)),
            Err(DispatchError::InvalidId { id: 7 })
        ));

        create(WorkerSpec::new("a")).unwrap();
        create(WorkerSpec::new("b")).unwrap();
        assert!(matches!(
            create(WorkerSpec::new("c")),
            Err(DispatchError::CapacityExhausted { capacity: 2 })
        ));
        assert_eq!(dispatcher().map(|d| d.len()), Some(2));
        shutdown();
    }
}
