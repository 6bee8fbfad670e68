use std::fmt;

use tokio_util::sync::CancellationToken;

/// One-shot event closure. Owns whatever it captured; dropped right after it runs,
/// or unrun if it is still queued when its worker exits.
pub type EventFn = Box<dyn FnOnce() + Send + 'static>;

/// Recurring update callback, invoked once per dispatch-loop iteration.
///
/// Receives the worker's wake token. The token is cancelled as soon as a stop is
/// requested, so a callback blocked on its own I/O can poll it and return early.
pub type UpdateFn = Box<dyn FnMut(&CancellationToken) + Send + 'static>;

/// Item carried by a worker queue.
pub(crate) enum Envelope {
    /// Always the first envelope of a queue; retained by the loop for its lifetime.
    Update(Option<UpdateFn>),
    /// Caller-submitted event.
    Event(EventFn),
    /// Stop request; flips `running` when the worker itself dequeues it.
    Stop,
}

impl Envelope {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Envelope::Update(_) => "update",
            Envelope::Event(_) => "event",
            Envelope::Stop => "stop",
        }
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}
