//! Error types used by the threadvisor registry and worker queues.
//!
//! This module defines two error enums:
//!
//! - [`DispatchError`]: errors raised by the lifecycle API (`create`, `enqueue`, `stop`).
//! - [`QueueError`]: errors raised by the per-worker [`EventQueue`](crate::EventQueue).
//!
//! Both types provide `as_label` for logging/metrics. No error is retried by the runtime.

use std::io;
use thiserror::Error;

/// # Errors produced by the lifecycle API.
///
/// Every failed call leaves the registry as it was before the call:
/// a failed `create` releases whatever it had allocated, a failed
/// `enqueue`/`stop` never touches worker state.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The process-wide dispatcher was used before `global::init`.
    #[error("dispatcher not initialized; call init() first")]
    NotInitialized,

    /// The id is `0` or was never issued by this dispatcher.
    #[error("invalid worker id {id}")]
    InvalidId {
        /// Raw id passed by the caller.
        id: u64,
    },

    /// The id was issued but no worker is registered under it
    /// (creation failed, or the worker was already joined).
    #[error("no worker registered with id {id}")]
    UnknownWorker {
        /// Raw id passed by the caller.
        id: u64,
    },

    /// The worker already executed a stop request.
    #[error("worker {id} is not running")]
    NotRunning {
        /// Raw id passed by the caller.
        id: u64,
    },

    /// The worker's queue is closed; its loop has exited.
    #[error("worker {id} stopped; queue closed")]
    WorkerStopped {
        /// Raw id passed by the caller.
        id: u64,
    },

    /// All registry slots are taken.
    #[error("worker capacity {capacity} exhausted")]
    CapacityExhausted {
        /// Configured registry capacity.
        capacity: usize,
    },

    /// A name, queue, or event allocation failed.
    #[error("failed to allocate {what}")]
    Allocation {
        /// What was being allocated.
        what: &'static str,
    },

    /// The OS refused to spawn the worker thread.
    #[error("failed to spawn worker thread {name:?}: {source}")]
    Spawn {
        /// Name of the worker being created.
        name: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use threadvisor::DispatchError;
    ///
    /// let err = DispatchError::InvalidId { id: 0 };
    /// assert_eq!(err.as_label(), "dispatch_invalid_id");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::NotInitialized => "dispatch_not_initialized",
            DispatchError::InvalidId { .. } => "dispatch_invalid_id",
            DispatchError::UnknownWorker { .. } => "dispatch_unknown_worker",
            DispatchError::NotRunning { .. } => "dispatch_not_running",
            DispatchError::WorkerStopped { .. } => "dispatch_worker_stopped",
            DispatchError::CapacityExhausted { .. } => "dispatch_capacity_exhausted",
            DispatchError::Allocation { .. } => "dispatch_allocation_failed",
            DispatchError::Spawn { .. } => "dispatch_spawn_failed",
        }
    }

    /// Converts a queue push failure into a dispatch error for worker `id`.
    pub(crate) fn from_queue(id: u64, err: QueueError) -> Self {
        match err {
            QueueError::Closed => DispatchError::WorkerStopped { id },
            QueueError::Alloc => DispatchError::Allocation { what: "event" },
        }
    }
}

/// # Errors produced by [`EventQueue`](crate::EventQueue) producers.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was closed by its consumer; no further items are accepted.
    #[error("queue closed")]
    Closed,

    /// The queue could not grow to hold one more item.
    #[error("queue allocation failed")]
    Alloc,
}

impl QueueError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            QueueError::Closed => "queue_closed",
            QueueError::Alloc => "queue_alloc_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_errors_map_to_dispatch_errors() {
        assert!(matches!(
            DispatchError::from_queue(7, QueueError::Closed),
            DispatchError::WorkerStopped { id: 7 }
        ));
        assert!(matches!(
            DispatchError::from_queue(7, QueueError::Alloc),
            DispatchError::Allocation { what: "event" }
        ));
    }

    #[test]
    fn test_messages_carry_ids() {
        let err = DispatchError::NotRunning { id: 3 };
        assert_eq!(err.to_string(), "worker 3 is not running");
        assert_eq!(err.as_label(), "dispatch_not_running");
    }
}
