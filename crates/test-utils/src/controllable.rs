//! Work whose completion a test controls explicitly, for asserting ordering
//! and cascade behavior that would otherwise race against real timing.

use std::sync::{Arc, Condvar, Mutex};

use taskloom::unit::{Work, WorkResult};

struct Gate {
    mutex: Mutex<bool>,
    condvar: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            mutex: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut released = self.mutex.lock().unwrap();
        while !*released {
            released = self.condvar.wait(released).unwrap();
        }
    }

    fn release(&self) {
        *self.mutex.lock().unwrap() = true;
        self.condvar.notify_all();
    }
}

/// [`Work`] that blocks inside `perform` until the test calls
/// [`ControllableWork::release`], then either succeeds or fails depending
/// on construction. Lets a test observe "this unit has started running but
/// not yet finished" as a stable intermediate state.
#[derive(Clone)]
pub struct ControllableWork {
    gate: Arc<Gate>,
    should_fail: bool,
    tag: String,
}

impl ControllableWork {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Gate::new()),
            should_fail: false,
            tag: "default".to_string(),
        }
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Let a blocked (or future) `perform` call proceed to completion.
    pub fn release(&self) {
        self.gate.release();
    }
}

impl Default for ControllableWork {
    fn default() -> Self {
        Self::new()
    }
}

impl Work for ControllableWork {
    fn perform(&self) -> WorkResult {
        self.gate.wait();
        if self.should_fail {
            Err(Arc::new("controllable work failed".to_string()))
        } else {
            Ok(Arc::new(()))
        }
    }

    fn tag(&self) -> String {
        self.tag.clone()
    }
}
