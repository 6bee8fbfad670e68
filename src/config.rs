//! # Global dispatcher configuration.
//!
//! Provides [`Config`] centralized settings for a [`Dispatcher`](crate::Dispatcher).
//!
//! Config is used in two ways:
//! 1. **Dispatcher creation**: `Dispatcher::new(config)`
//! 2. **Process-wide API**: `threadvisor::global::init_with(config)`
//!
//! ## Sentinel values
//! - `idle_timeout = 0s` → a parked worker waits until an event or a wake arrives
//! - `stack_size = 0` → platform default stack size for worker threads
//! - `capacity`, `queue_capacity`, `bus_capacity` are clamped to a minimum of 1

use std::time::Duration;

/// Configuration for the worker registry and its dispatch loops.
///
/// Defines:
/// - **Registry bounds**: how many workers may be registered at once
/// - **Queue sizing**: initial capacity of every worker queue
/// - **Loop pacing**: how long an idle worker parks before running its update callback again
/// - **Event system**: bus capacity for lifecycle event delivery
///
/// ## Field semantics
/// - `capacity`: Maximum registered workers (created and not yet joined)
/// - `queue_capacity`: Initial capacity of each worker queue (queues grow past it)
/// - `idle_timeout`: Park timeout of an idle worker (`0s` = wait for an event or a wake)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `stack_size`: Worker thread stack size in bytes (`0` = platform default)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of workers registered at the same time.
    ///
    /// A worker occupies its slot from a successful `create` until `wait`
    /// (or `shutdown`) has joined its thread, even if it already exited.
    pub capacity: usize,

    /// Initial capacity of each worker queue.
    ///
    /// The queue reserves this many envelopes up front and grows beyond it;
    /// producers are never blocked and never rejected for a full queue.
    pub queue_capacity: usize,

    /// How long an idle worker parks in `pop` before looping again.
    ///
    /// - `Duration::ZERO` = park until an event is queued or the worker is woken
    /// - `> 0` = the update callback runs at least once per `idle_timeout`
    pub idle_timeout: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Stack size for worker threads in bytes (`0` = platform default).
    pub stack_size: usize,
}

impl Config {
    /// Returns the registry capacity clamped to a minimum of 1.
    #[inline]
    pub fn capacity_clamped(&self) -> usize {
        self.capacity.max(1)
    }

    /// Returns the initial queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Returns the idle park timeout as an `Option`.
    ///
    /// - `None` → park until an event or a wake arrives
    /// - `Some(d)` → park for at most `d`
    #[inline]
    pub fn park_timeout(&self) -> Option<Duration> {
        if self.idle_timeout == Duration::ZERO {
            None
        } else {
            Some(self.idle_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    ///
    /// The `Bus` should use this value to avoid constructing an invalid channel.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the worker thread stack size as an `Option`.
    #[inline]
    pub fn thread_stack_size(&self) -> Option<usize> {
        if self.stack_size == 0 {
            None
        } else {
            Some(self.stack_size)
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `capacity = 32` (small bounded set of workers)
    /// - `queue_capacity = 32`
    /// - `idle_timeout = 0s` (park until woken)
    /// - `bus_capacity = 1024` (good baseline)
    /// - `stack_size = 0` (platform default)
    fn default() -> Self {
        Self {
            capacity: 32,
            queue_capacity: 32,
            idle_timeout: Duration::from_secs(0),
            bus_capacity: 1024,
            stack_size: 0,
        }
    }
}
