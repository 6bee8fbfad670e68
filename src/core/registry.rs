//! # Worker registry: bounded slot table and id issuance.
//!
//! ## Rules
//! - Ids come from a single `AtomicU64` fetch-and-increment; the first id is 1 and
//!   no id is ever issued twice, including ids burnt by failed `create` attempts.
//! - At most `capacity` slots exist at once, counting slots reserved by an `insert`
//!   whose thread is still being spawned. A slot is freed only once its thread is joined.
//! - Lookups reject id `0` and ids above the last issued one before touching the table.
//! - The table lock is held neither while spawning nor while joining a worker.
//! - Each join handle sits behind its own mutex: concurrent `join_all` callers block
//!   on the same worker instead of skipping it. A worker thread never joins itself.
//!
//! ```text
//! issue_id() ──► id
//! insert(id, shared, spawn)
//!   ├─ write lock ─► len + reserved < capacity? ─► reserved += 1
//!   ├─ spawn()                                     (no lock held)
//!   └─ write lock ─► reserved -= 1 ─► slots[id] = Slot
//! lookup(id) ──► read lock ─► Arc<WorkerShared>
//! join_all() ──► read lock ─► join cells (minus own thread)
//!               └─ per cell: lock ─► take handle ─► join ─► remove slot ─► unlock
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Mutex, RwLock};

use crate::core::worker::{ExitReason, WorkerShared};
use crate::error::DispatchError;
use crate::worker::WorkerId;

/// Snapshot of one registered worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    /// Worker id.
    pub id: WorkerId,
    /// Worker name; empty once the worker thread exited.
    pub name: String,
    /// False once the worker executed a stop request (or failed setup).
    pub running: bool,
    /// Envelopes waiting in its queue.
    pub queued: usize,
}

/// Join handle of one worker; `None` once joined.
type JoinCell = Arc<Mutex<Option<JoinHandle<ExitReason>>>>;

/// Registry entry owning a worker's join handle.
struct Slot {
    shared: Arc<WorkerShared>,
    thread: ThreadId,
    join: JoinCell,
}

#[derive(Default)]
struct Table {
    slots: HashMap<WorkerId, Slot>,
    /// Slots promised to `insert` calls still spawning their thread.
    reserved: usize,
}

/// Bounded table of worker slots keyed by id.
pub(crate) struct Registry {
    table: RwLock<Table>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Registry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            table: RwLock::new(Table {
                slots: HashMap::with_capacity(capacity),
                reserved: 0,
            }),
            next_id: AtomicU64::new(0),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reserves the next id.
    pub(crate) fn issue_id(&self) -> WorkerId {
        WorkerId::from_raw(self.next_id.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Reserves a slot for `id`, spawns its thread without holding the table lock,
    /// then fills the slot.
    ///
    /// Nothing is inserted if the table is full or `spawn` fails; the reservation is
    /// rolled back in the latter case.
    pub(crate) fn insert<F>(
        &self,
        id: WorkerId,
        shared: Arc<WorkerShared>,
        spawn: F,
    ) -> Result<(), DispatchError>
    where
        F: FnOnce() -> Result<JoinHandle<ExitReason>, DispatchError>,
    {
        {
            let mut table = self.table.write();
            if table.slots.len() + table.reserved >= self.capacity {
                return Err(DispatchError::CapacityExhausted {
                    capacity: self.capacity,
                });
            }
            table.reserved += 1;
        }

        let spawned = spawn();

        let mut table = self.table.write();
        table.reserved -= 1;
        let join = spawned?;
        table.slots.insert(
            id,
            Slot {
                shared,
                thread: join.thread().id(),
                join: Arc::new(Mutex::new(Some(join))),
            },
        );
        Ok(())
    }

    /// Resolves an id to its worker state.
    pub(crate) fn lookup(&self, id: WorkerId) -> Result<Arc<WorkerShared>, DispatchError> {
        let raw = id.get();
        if !id.is_valid() || raw > self.next_id.load(Ordering::Acquire) {
            return Err(DispatchError::InvalidId { id: raw });
        }

        self.table
            .read()
            .slots
            .get(&id)
            .map(|slot| Arc::clone(&slot.shared))
            .ok_or(DispatchError::UnknownWorker { id: raw })
    }

    /// Returns the workers that have not executed a stop request yet.
    pub(crate) fn running(&self) -> Vec<(WorkerId, Arc<WorkerShared>)> {
        let table = self.table.read();
        let mut out: Vec<_> = table
            .slots
            .iter()
            .filter(|(_, slot)| slot.shared.is_running())
            .map(|(id, slot)| (*id, Arc::clone(&slot.shared)))
            .collect();
        out.sort_unstable_by_key(|(id, _)| *id);
        out
    }

    /// Joins every registered worker in id order and frees its slot.
    ///
    /// The calling thread's own slot is skipped. A worker that a concurrent caller is
    /// already joining blocks this call until that join finished, and is reported by
    /// that caller only.
    pub(crate) fn join_all(&self) -> Vec<(WorkerId, ExitReason)> {
        let mut exited = Vec::new();

        for (id, cell) in self.joinable() {
            let mut join = cell.lock();
            let Some(handle) = join.take() else {
                // joined (and removed) by a concurrent caller
                continue;
            };
            let reason = handle.join().unwrap_or(ExitReason::Panicked);
            self.table.write().slots.remove(&id);
            drop(join);
            exited.push((id, reason));
        }
        exited
    }

    /// Join cells of every slot not owned by the calling thread, sorted by id.
    fn joinable(&self) -> Vec<(WorkerId, JoinCell)> {
        let me = thread::current().id();
        let table = self.table.read();
        let mut out: Vec<_> = table
            .slots
            .iter()
            .filter(|(_, slot)| slot.thread != me)
            .map(|(id, slot)| (*id, Arc::clone(&slot.join)))
            .collect();
        out.sort_unstable_by_key(|(id, _)| *id);
        out
    }

    /// Returns a snapshot of all registered workers, sorted by id.
    pub(crate) fn infos(&self) -> Vec<WorkerInfo> {
        let table = self.table.read();
        let mut out: Vec<WorkerInfo> = table
            .slots
            .iter()
            .map(|(id, slot)| WorkerInfo {
                id: *id,
                name: slot.shared.name().as_str().to_owned(),
                running: slot.shared.is_running(),
                queued: slot.shared.queue.len(),
            })
            .collect();
        out.sort_unstable_by_key(|info| info.id);
        out
    }

    pub(crate) fn len(&self) -> usize {
        self.table.read().slots.len()
    }
}
