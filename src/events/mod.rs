//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the dispatcher, the worker
//! loops and the subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Dispatcher` (create/stop/wait/rejections), worker loops
//!   (start/exit/setup failure/panics), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the dispatcher's fan-out listener (feeds `SubscriberSet`) and
//!   any raw receiver obtained through `Dispatcher::subscribe`.

mod bus;
mod event;

pub use bus::Bus;
pub(crate) use event::panic_message;
pub use event::{Event, EventKind};
