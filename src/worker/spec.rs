//! # Worker specification.
//!
//! Defines [`WorkerSpec`] the bundle passed to `create`: a name and an optional
//! update callback.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use threadvisor::WorkerSpec;
//!
//! let ticks = Arc::new(AtomicU64::new(0));
//! let t = Arc::clone(&ticks);
//! let spec = WorkerSpec::new("poller").with_update(move |_token| {
//!     t.fetch_add(1, Ordering::Relaxed);
//! });
//! assert_eq!(spec.name(), "poller");
//! assert!(spec.has_update());
//! ```

use std::borrow::Cow;

use tokio_util::sync::CancellationToken;

use crate::worker::UpdateFn;

/// Specification of a worker to create.
pub struct WorkerSpec {
    name: Cow<'static, str>,
    update: Option<UpdateFn>,
}

impl WorkerSpec {
    /// Creates a spec for a worker without update callback.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            update: None,
        }
    }

    /// Attaches the update callback run on every loop iteration.
    pub fn with_update<F>(mut self, f: F) -> Self
    where
        F: FnMut(&CancellationToken) + Send + 'static,
    {
        self.update = Some(Box::new(f));
        self
    }

    /// Returns the worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if an update callback is attached.
    pub fn has_update(&self) -> bool {
        self.update.is_some()
    }

    pub(crate) fn into_parts(self) -> (Cow<'static, str>, Option<UpdateFn>) {
        (self.name, self.update)
    }
}

impl std::fmt::Debug for WorkerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSpec")
            .field("name", &self.name)
            .field("update", &self.update.is_some())
            .finish()
    }
}
