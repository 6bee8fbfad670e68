//! # Event subscribers for the threadvisor runtime.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] fan-out
//! used by the [`Dispatcher`](crate::Dispatcher) to deliver runtime events
//! broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   worker loop ── publish(Event) ──► Bus ──► fan-out listener ──► SubscriberSet
//!                                                                    │
//!                                                          ┌─────────┼─────────┐
//!                                                          ▼         ▼         ▼
//!                                                       LogWriter  Metrics   Custom
//! ```
//!
//! With the `logging` feature, [`LogWriter`] renders every event through `tracing`.

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
