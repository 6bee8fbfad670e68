//! # LogWriter: runtime events as `tracing` records
//!
//! A minimal subscriber that renders incoming [`Event`]s through [`tracing`].
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output
//! ```text
//! INFO  [created] worker=1 name="net-io"
//! DEBUG [started] worker=1 name="net-io"
//! INFO  [stop-requested] worker=1 name="net-io"
//! INFO  [exited] worker=1 name="net-io" discarded=0
//! WARN  [rejected] worker=9 reason="dispatch_invalid_id"
//! ERROR [callback-panicked] worker=1 name="net-io" info="boom"
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Subscribe for LogWriter {
    fn on_event(&self, e: &Event) {
        let name = e.name.as_deref().unwrap_or("");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::WorkerCreated => {
                tracing::info!(worker = ?e.worker, name, "[created]");
            }
            EventKind::CreateFailed => {
                tracing::warn!(worker = ?e.worker, name, reason, "[create-failed]");
            }
            EventKind::WorkerStarted => {
                tracing::debug!(worker = ?e.worker, name, "[started]");
            }
            EventKind::SetupFailed => {
                tracing::error!(worker = ?e.worker, name, reason, "[setup-failed]");
            }
            EventKind::StopRequested => {
                tracing::info!(worker = ?e.worker, name, "[stop-requested]");
            }
            EventKind::WorkerExited => {
                tracing::info!(worker = ?e.worker, name, discarded = ?e.discarded, "[exited]");
            }
            EventKind::EnqueueRejected => {
                tracing::warn!(worker = ?e.worker, reason, "[rejected]");
            }
            EventKind::CallbackPanicked => {
                tracing::error!(worker = ?e.worker, name, info = reason, "[callback-panicked]");
            }
            EventKind::ShutdownRequested => {
                tracing::info!("[shutdown-requested]");
            }
            EventKind::AllStopped => {
                tracing::info!(joined = ?e.joined, "[all-stopped]");
            }
            EventKind::DispatcherClosed => {
                tracing::debug!("[dispatcher-closed]");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = name, reason, "[subscriber-overflow]");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(subscriber = name, info = reason, "[subscriber-panicked]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
