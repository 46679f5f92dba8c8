//! Halt reaching the process-wide stop hook from a non-main thread.
//!
//! Kept in its own test binary: it replaces the panic hook.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use fprog_cmt::{fatal, halt};

static STOPS: AtomicUsize = AtomicUsize::new(0);

fn record_stop() {
    STOPS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn halt_on_worker_thread_runs_stop_hook() {
    halt::install_stop_on_panic(record_stop);

    let joined = thread::Builder::new()
        .name("cmt-tick".into())
        .spawn(|| {
            fatal!("queue full on {}", "Core1");
        })
        .unwrap()
        .join();

    assert!(joined.is_err());
    assert_eq!(STOPS.load(Ordering::SeqCst), 1);
}
