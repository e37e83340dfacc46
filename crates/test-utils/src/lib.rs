//! Shared helpers for taskloom's integration and property tests: a
//! one-shot tracing initializer, a timeout guard for tests that could hang
//! on a deadlocked condition variable, and controllable fake work for
//! asserting exact ordering/cascade behavior.

mod builders;
mod controllable;

pub use builders::{chain, diamond, failing, leaf, panicking};
pub use controllable::ControllableWork;

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a tracing subscriber for test output. Safe to call from every
/// test; only the first call has an effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        taskloom::logging::init();
    });
}

/// Run `f` on the current thread, failing the test if it doesn't return
/// within `timeout`. Intended for executor/scheduler tests that could
/// otherwise hang forever on a missed condvar notification instead of
/// failing fast.
pub fn with_timeout<T: Send + 'static>(
    timeout: std::time::Duration,
    f: impl FnOnce() -> T + Send + 'static,
) -> T {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(timeout)
        .expect("operation did not complete within timeout")
}
