use std::sync::Arc;
use std::thread;

use crate::{
    config::Config,
    events::{Bus, EventKind},
    subscribers::{Subscribe, SubscriberSet},
};

use super::{dispatcher::Dispatcher, registry::Registry};

/// Builder for constructing a [`Dispatcher`] with optional subscribers.
pub struct DispatcherBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl DispatcherBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (worker lifecycle, rejections, panics)
    /// through dedicated threads with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the dispatcher.
    ///
    /// With subscribers attached, this also starts the fan-out listener thread:
    /// `Bus ─► listener ─► SubscriberSet`. The listener is subscribed before this
    /// returns, so no event published by the dispatcher is missed.
    pub fn build(self) -> Dispatcher {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let registry = Registry::new(self.cfg.capacity_clamped());

        let fanout = if self.subscribers.is_empty() {
            None
        } else {
            spawn_fanout(&bus, self.subscribers)
        };

        Dispatcher::new_internal(self.cfg, bus, registry, fanout)
    }
}

/// Forwards bus events to subscribers until the dispatcher announces it closed.
fn spawn_fanout(
    bus: &Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
) -> Option<thread::JoinHandle<()>> {
    let mut rx = bus.subscribe();
    let set = SubscriberSet::new(subscribers, bus.clone());

    let spawned = thread::Builder::new()
        .name("threadvisor-fanout".to_string())
        .spawn(move || {
            use tokio::sync::broadcast::error::RecvError;

            loop {
                match rx.blocking_recv() {
                    Ok(ev) => {
                        let closing = ev.kind == EventKind::DispatcherClosed;
                        set.emit_arc(Arc::new(ev));
                        if closing {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber fan-out lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            set.shutdown();
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(err) => {
            tracing::warn!(error = %err, "failed to spawn subscriber fan-out; events are not delivered");
            None
        }
    }
}
