//! # Blocking FIFO queue with targeted wake-up.
//!
//! [`EventQueue`] is the per-worker mailbox: any thread may push, exactly one
//! worker thread pops. It is a `VecDeque` behind a [`parking_lot::Mutex`] with a
//! [`parking_lot::Condvar`] for parking the consumer.
//!
//! ## Rules
//! - **FIFO**: items are popped in the order their `push` returned `Ok`.
//! - **Never blocks producers**: the queue starts at a fixed capacity and grows;
//!   growth uses fallible reservation and reports [`QueueError::Alloc`].
//! - **Cancellable pop**: [`EventQueue::pop`] takes a [`CancellationToken`]. Once the
//!   token is cancelled and [`EventQueue::wake`] was called, a parked consumer returns
//!   [`Pop::Cancelled`] instead of waiting. Queued items still take precedence.
//! - **Close**: [`EventQueue::close`] rejects further pushes and hands back everything
//!   still queued.
//!
//! ## Pop status
//! ```text
//! pop(token, timeout)
//!   ├─ item queued        → Pop::Item(item)
//!   ├─ queue closed       → Pop::Closed
//!   ├─ token cancelled    → Pop::Cancelled
//!   ├─ timeout elapsed    → Pop::TimedOut
//!   └─ otherwise          → park on the condvar and re-check
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;

/// Outcome of a blocking [`EventQueue::pop`].
#[derive(Debug, PartialEq, Eq)]
pub enum Pop<T> {
    /// An item was dequeued.
    Item(T),
    /// The queue is empty and the token was cancelled.
    Cancelled,
    /// The queue stayed empty for the whole timeout.
    TimedOut,
    /// The queue is empty and closed.
    Closed,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Multi-producer, single-consumer blocking FIFO.
pub struct EventQueue<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> EventQueue<T> {
    /// Creates an empty queue with room for `capacity` items (min 1).
    ///
    /// Returns [`QueueError::Alloc`] if the initial buffer cannot be reserved.
    pub fn with_capacity(capacity: usize) -> Result<Self, QueueError> {
        let mut items = VecDeque::new();
        items
            .try_reserve(capacity.max(1))
            .map_err(|_| QueueError::Alloc)?;
        Ok(Self {
            state: Mutex::new(State {
                items,
                closed: false,
            }),
            ready: Condvar::new(),
        })
    }

    /// Appends an item and wakes the consumer.
    ///
    /// Fails with [`QueueError::Closed`] after [`close`](Self::close), or with
    /// [`QueueError::Alloc`] if the buffer cannot grow. On failure the item is dropped
    /// and the queue is unchanged.
    pub fn push(&self, item: T) -> Result<(), QueueError> {
        let mut st = self.state.lock();
        if st.closed {
            return Err(QueueError::Closed);
        }
        st.items.try_reserve(1).map_err(|_| QueueError::Alloc)?;
        st.items.push_back(item);
        drop(st);

        self.ready.notify_one();
        Ok(())
    }

    /// Dequeues the front item without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Dequeues the front item, parking while the queue is empty.
    ///
    /// `timeout = None` parks until an item, a close, or a cancelled-and-woken token.
    pub fn pop(&self, token: &CancellationToken, timeout: Option<Duration>) -> Pop<T> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut st = self.state.lock();

        loop {
            if let Some(item) = st.items.pop_front() {
                return Pop::Item(item);
            }
            if st.closed {
                return Pop::Closed;
            }
            if token.is_cancelled() {
                return Pop::Cancelled;
            }

            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut st, deadline).timed_out() {
                        return match st.items.pop_front() {
                            Some(item) => Pop::Item(item),
                            None => Pop::TimedOut,
                        };
                    }
                }
                None => self.ready.wait(&mut st),
            }
        }
    }

    /// Wakes a parked consumer so it re-checks its token.
    ///
    /// Cancel the token first; the lock is taken before notifying so a consumer
    /// between its token check and its park cannot miss the wake-up.
    pub fn wake(&self) {
        let _st = self.state.lock();
        self.ready.notify_all();
    }

    /// Closes the queue and returns every item still queued, in FIFO order.
    ///
    /// Later pushes fail with [`QueueError::Closed`]. Closing twice returns an empty deque.
    pub fn close(&self) -> VecDeque<T> {
        let mut st = self.state.lock();
        st.closed = true;
        let rest = std::mem::take(&mut st.items);
        drop(st);

        self.ready.notify_all();
        rest
    }

    /// Returns the number of queued items.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns true if no item is queued.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
