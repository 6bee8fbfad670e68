//! # Basic dispatch
//!
//! Demonstrates the process-wide API:
//! - one worker with an update callback
//! - events queued from several threads, run in order on the worker
//! - graceful shutdown

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use threadvisor::{WorkerSpec, global};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    global::init();

    let ticks = Arc::new(AtomicU64::new(0));
    let t = Arc::clone(&ticks);
    let id = global::create(WorkerSpec::new("printer").with_update(move |_token| {
        t.fetch_add(1, Ordering::Relaxed);
    }))?;

    let producers: Vec<_> = (0..3)
        .map(|p| {
            thread::spawn(move || {
                for n in 0..3 {
                    let _ = global::enqueue(id, move || {
                        println!("producer {p} / event {n} on {:?}", thread::current().name());
                    });
                }
            })
        })
        .collect();
    for p in producers {
        let _ = p.join();
    }

    for (id, reason) in global::shutdown() {
        println!("worker {id} exited: {}", reason.as_label());
    }
    println!("update ran {} times", ticks.load(Ordering::Relaxed));
    Ok(())
}
