//! Runtime core: registry, dispatch loop and lifecycle.
//!
//! The public API from this module is [`Dispatcher`] (plus its builder and the
//! value types it returns). Internal modules:
//! - [`dispatcher`]: lifecycle API (`create`, `enqueue`, `stop`, `wait`, `shutdown`);
//! - [`builder`]: wires the bus and the optional subscriber fan-out;
//! - [`registry`]: bounded slot table and atomic id issuance;
//! - [`worker`]: the per-thread dispatch loop.

mod builder;
mod dispatcher;
mod registry;
mod worker;

pub use builder::DispatcherBuilder;
pub use dispatcher::Dispatcher;
pub use registry::WorkerInfo;
pub use worker::ExitReason;
