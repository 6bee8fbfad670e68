//! # threadvisor
//!
//! **Threadvisor** is a minimal actor-style dispatch library.
//!
//! A process spins up a small bounded set of named workers. Each worker owns a
//! dedicated OS thread, a private FIFO queue of deferred closures, and an optional
//! update callback that runs on every loop iteration. Any thread can hand work to a
//! worker by id; the worker runs it strictly in order, on its own thread, never
//! interleaved with another worker's events.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   caller A        caller B        caller C
//!      │ create        │ enqueue(id)   │ stop(id)
//!      ▼               ▼               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher                                                       │
//! │  - Registry (bounded slots, AtomicU64 id counter)                 │
//! │  - Bus (broadcast runtime events)                                 │
//! │  - SubscriberSet (optional fan-out to user subscribers)           │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌────────────┐     ┌────────────┐     ┌────────────┐
//!  │ EventQueue │     │ EventQueue │     │ EventQueue │
//!  └─────┬──────┘     └─────┬──────┘     └─────┬──────┘
//!        ▼                  ▼                  ▼
//!  ┌────────────┐     ┌────────────┐     ┌────────────┐
//!  │ Worker #1  │     │ Worker #2  │     │ Worker #N  │
//!  │ (thread)   │     │ (thread)   │     │ (thread)   │
//!  └────────────┘     └────────────┘     └────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! create ──► queue = [Update] ──► spawn thread ──► Worker::run()
//!
//! while running {
//!   ├─► update(&wake_token)
//!   └─► pop (may park)
//!         ├─ Event(f) ─► f()
//!         └─ Stop     ─► running = false
//! }
//!
//! On exit: close queue, drop leftovers unrun, WorkerExited
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                       |
//! |-------------------|--------------------------------------------------------------|------------------------------------------|
//! | **Dispatch**      | Create workers, queue closures, stop and join them.          | [`Dispatcher`], [`WorkerSpec`]           |
//! | **Global API**    | Process-wide free functions over one dispatcher.             | [`global`]                               |
//! | **Queue**         | Blocking FIFO with cancellable pop.                          | [`EventQueue`], [`Pop`]                  |
//! | **Subscriber API**| Observe worker lifecycle, rejections, panics.                | [`Subscribe`], [`Event`], [`EventKind`]  |
//! | **Errors**        | Typed errors with stable labels.                             | [`DispatchError`], [`QueueError`]        |
//! | **Configuration** | Capacity, queue sizing, idle pacing.                         | [`Config`]                               |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a subscriber rendering events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use threadvisor::{Config, Dispatcher, WorkerSpec};
//!
//! let dispatcher = Dispatcher::new(Config::default());
//!
//! let ticks = Arc::new(AtomicUsize::new(0));
//! let t = Arc::clone(&ticks);
//! let id = dispatcher
//!     .create(WorkerSpec::new("net").with_update(move |_token| {
//!         t.fetch_add(1, Ordering::Relaxed);
//!     }))
//!     .unwrap();
//!
//! dispatcher.enqueue(id, || println!("runs on the net worker")).unwrap();
//! dispatcher.shutdown();
//! assert!(ticks.load(Ordering::Relaxed) >= 1);
//! ```
mod config;
mod core;
mod error;
mod events;
mod queue;
mod subscribers;
mod worker;

pub mod global;

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::{Dispatcher, DispatcherBuilder, ExitReason, WorkerInfo};
pub use error::{DispatchError, QueueError};
pub use events::{Bus, Event, EventKind};
pub use queue::{EventQueue, Pop};
pub use subscribers::{Subscribe, SubscriberSet};
pub use worker::{EventFn, UpdateFn, WorkerId, WorkerSpec};

// Re-exported so update callbacks can name the wake token type.
pub use tokio_util::sync::CancellationToken;

// Optional: expose a built-in tracing subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
