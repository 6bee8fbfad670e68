//! # Two-stage pipeline with logging
//!
//! Demonstrates:
//! - a `Dispatcher` built with the `LogWriter` subscriber (`--features logging`)
//! - workers handing work to each other by id
//! - an idle timeout keeping the update callback ticking
//! - the wake token cutting a blocking update short on stop

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use threadvisor::{Config, Dispatcher, LogWriter, Subscribe, WorkerSpec};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let cfg = Config {
        idle_timeout: Duration::from_millis(100),
        ..Config::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let dispatcher = Arc::new(Dispatcher::builder(cfg).with_subscribers(subs).build());

    let total = Arc::new(AtomicU64::new(0));
    let sink = dispatcher.create(WorkerSpec::new("sink"))?;

    let heartbeat = dispatcher.create(WorkerSpec::new("heartbeat").with_update(|token| {
        // stands in for a blocking poll; returns early once a stop is requested
        for _ in 0..10 {
            if token.is_cancelled() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }))?;

    let parser = dispatcher.create(WorkerSpec::new("parser"))?;
    for line in ["1", "2", "x", "40"] {
        let d = Arc::clone(&dispatcher);
        let total = Arc::clone(&total);
        dispatcher.enqueue(parser, move || match line.parse::<u64>() {
            Ok(n) => {
                let _ = d.enqueue(sink, move || {
                    total.fetch_add(n, Ordering::Relaxed);
                });
            }
            Err(err) => tracing::warn!(line, error = %err, "skipping unparsable line"),
        })?;
    }

    // queued behind the lines, so the sink stops only after every number reached it
    let d = Arc::clone(&dispatcher);
    dispatcher.enqueue(parser, move || {
        let _ = d.stop(sink);
    })?;

    std::thread::sleep(Duration::from_millis(300));
    dispatcher.stop(heartbeat)?;
    dispatcher.stop(parser)?;
    dispatcher.wait();

    println!("sum = {}", total.load(Ordering::Relaxed));
    Ok(())
}
