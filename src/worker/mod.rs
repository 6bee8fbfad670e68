//! # Worker-facing types.
//!
//! This module provides the values callers hand to the dispatcher:
//! - [`WorkerId`] - 1-based id issued by `create` (`0` is never issued)
//! - [`WorkerSpec`] - name plus optional update callback for a new worker
//! - [`EventFn`], [`UpdateFn`] - boxed closures run on the worker thread
//!
//! The queued envelope type is internal; callers only ever pass closures.

mod envelope;
mod id;
mod spec;

pub(crate) use envelope::Envelope;
pub use envelope::{EventFn, UpdateFn};
pub use id::WorkerId;
pub use spec::WorkerSpec;
