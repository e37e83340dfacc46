//! A single piece of user-supplied work with prerequisites and a lifecycle.
//!
//! [`Unit`] is the only extension point a caller touches: implement [`Work`]
//! (or just hand a closure to [`Unit::builder`]) and the engine takes care of
//! status transitions, cancellation, and hook wiring. Everything else on
//! `Unit` (the status machine, the cancel flag, the hooks) is installed and
//! driven by [`crate::dag::Scheduler`] and [`crate::executor::Executor`].

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// Opaque, unique identity of a [`Unit`].
pub type UnitId = String;

/// The value a successful [`Work::perform`] produces.
pub type WorkOutput = Arc<dyn Any + Send + Sync>;

/// The value a failed [`Work::perform`] raises.
pub type WorkError = Arc<dyn Any + Send + Sync>;

/// The outcome of running a unit's work exactly once.
pub type WorkResult = Result<WorkOutput, WorkError>;

/// The user's extension point: what a unit actually does, and which pool it
/// runs in.
///
/// A blanket implementation is provided for any `Fn() -> WorkResult`, so the
/// common case is just a closure handed to [`Unit::builder`]; implement this
/// trait directly only when a unit needs a named type (e.g. to carry extra
/// fields, or to give a non-default `tag`).
pub trait Work: Send + Sync {
    /// Run the unit's logic. Called at most once, from a worker thread.
    fn perform(&self) -> WorkResult;

    /// Dispatch key used to select a worker pool. Defaults to `"default"`.
    fn tag(&self) -> String {
        "default".to_string()
    }
}

impl<F> Work for F
where
    F: Fn() -> WorkResult + Send + Sync,
{
    fn perform(&self) -> WorkResult {
        self()
    }
}

/// Lifecycle state of a [`Unit`], per §3/§4.1 of the design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl UnitStatus {
    /// Terminal states are COMPLETED, FAILED, CANCELED; no further
    /// transitions occur once a unit reaches one of these.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UnitStatus::Completed | UnitStatus::Failed | UnitStatus::Canceled
        )
    }
}

/// Hook set installed by the [`crate::dag::Scheduler`] during registration.
///
/// Stored as `Arc` rather than `Box` so firing a hook only needs the lock
/// held long enough to clone the handle, not for the duration of the
/// callback itself.
#[derive(Clone, Default)]
struct Hooks {
    on_completed: Option<Arc<dyn Fn(&Unit) + Send + Sync>>,
    on_failed: Option<Arc<dyn Fn(&Unit) + Send + Sync>>,
    on_canceled: Option<Arc<dyn Fn(&Unit) + Send + Sync>>,
}

struct UnitInner {
    id: UnitId,
    tag: String,
    work: Box<dyn Work>,
    prerequisites: Vec<Unit>,
    status: Mutex<UnitStatus>,
    result: Mutex<Option<WorkResult>>,
    cancel_requested: AtomicBool,
    hooks: Mutex<Hooks>,
}

/// A unit of work with prerequisites and a lifecycle.
///
/// Cheap to clone: internally an `Arc`, so holding onto a `Unit` after
/// registering it with a [`crate::dag::Scheduler`] is the normal way to
/// inspect `status()`/`result()` later.
#[derive(Clone)]
pub struct Unit(Arc<UnitInner>);

impl Unit {
    /// Start building a unit around the given work.
    pub fn builder(work: impl Work + 'static) -> UnitBuilder {
        UnitBuilder {
            work: Box::new(work),
            id: None,
            prerequisites: Vec::new(),
            tag_override: None,
        }
    }

    /// Build a unit with no prerequisites, a random id, and no tag override
    /// (the common case for leaf units).
    pub fn new(work: impl Work + 'static) -> Unit {
        Self::builder(work).build()
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    pub fn prerequisites(&self) -> &[Unit] {
        &self.0.prerequisites
    }

    pub fn status(&self) -> UnitStatus {
        *self.0.status.lock().unwrap()
    }

    /// The value `perform` returned, or the error it raised. `None` until a
    /// terminal, non-canceled transition has happened.
    pub fn result(&self) -> Option<WorkResult> {
        self.0.result.lock().unwrap().clone()
    }

    /// Idempotent. May be called from any thread at any time; only has an
    /// effect if the unit has not yet started running.
    pub fn request_cancel(&self) {
        self.0.cancel_requested.store(true, Ordering::SeqCst);
    }

    fn cancel_requested(&self) -> bool {
        self.0.cancel_requested.load(Ordering::SeqCst)
    }

    fn set_status(&self, status: UnitStatus) {
        *self.0.status.lock().unwrap() = status;
    }

    /// Transition PENDING -> SCHEDULED. Called by
    /// [`crate::dag::scheduler::ReadyUnits`] under the Scheduler's own
    /// mutex, right before yielding the unit to its consumer.
    pub(crate) fn mark_scheduled(&self) {
        self.set_status(UnitStatus::Scheduled);
    }

    /// Installed exclusively by [`crate::dag::Scheduler::schedule`].
    pub(crate) fn install_hooks(
        &self,
        on_completed: Arc<dyn Fn(&Unit) + Send + Sync>,
        on_failed: Arc<dyn Fn(&Unit) + Send + Sync>,
        on_canceled: Arc<dyn Fn(&Unit) + Send + Sync>,
    ) {
        let mut hooks = self.0.hooks.lock().unwrap();
        hooks.on_completed = Some(on_completed);
        hooks.on_failed = Some(on_failed);
        hooks.on_canceled = Some(on_canceled);
    }

    /// The driver a worker calls. Never panics or propagates a panic from
    /// `perform`; both are converted into a terminal transition.
    pub fn run_once(&self) {
        if self.cancel_requested() {
            self.set_status(UnitStatus::Canceled);
            tracing::debug!(unit = self.id(), "unit canceled before starting");
            self.fire(|h| h.on_canceled.clone());
            return;
        }

        self.set_status(UnitStatus::Running);
        tracing::debug!(unit = self.id(), tag = self.tag(), "unit started");

        match panic::catch_unwind(AssertUnwindSafe(|| self.0.work.perform())) {
            Ok(Ok(value)) => {
                *self.0.result.lock().unwrap() = Some(Ok(value));
                self.set_status(UnitStatus::Completed);
                tracing::info!(unit = self.id(), "unit completed");
                self.fire(|h| h.on_completed.clone());
            }
            Ok(Err(err)) => {
                *self.0.result.lock().unwrap() = Some(Err(err));
                self.set_status(UnitStatus::Failed);
                tracing::warn!(unit = self.id(), "unit failed");
                self.fire(|h| h.on_failed.clone());
            }
            Err(panic) => {
                let message = panic_message(&panic);
                tracing::error!(
                    unit = self.id(),
                    panic = %message,
                    "unit's perform panicked; treating as failed"
                );
                *self.0.result.lock().unwrap() = Some(Err(Arc::new(message) as WorkError));
                self.set_status(UnitStatus::Failed);
                self.fire(|h| h.on_failed.clone());
            }
        }
    }

    fn fire(&self, select: impl FnOnce(&Hooks) -> Option<Arc<dyn Fn(&Unit) + Send + Sync>>) {
        let hook = select(&self.0.hooks.lock().unwrap());
        if let Some(hook) = hook {
            hook(self);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unit panicked with a non-string payload".to_string()
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.0.id)
            .field("tag", &self.0.tag)
            .field("status", &self.status())
            .field(
                "prerequisites",
                &self.0.prerequisites.iter().map(Unit::id).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Unit {}

impl Hash for Unit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

/// Builder for [`Unit`]: optional id, optional prerequisites, optional tag
/// override.
pub struct UnitBuilder {
    work: Box<dyn Work>,
    id: Option<UnitId>,
    prerequisites: Vec<Unit>,
    tag_override: Option<String>,
}

impl UnitBuilder {
    /// Assign a specific id instead of a randomly generated one.
    pub fn id(mut self, id: impl Into<UnitId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Replace the prerequisite set wholesale.
    pub fn prerequisites(mut self, prerequisites: impl IntoIterator<Item = Unit>) -> Self {
        self.prerequisites = prerequisites.into_iter().collect();
        self
    }

    /// Add a single prerequisite.
    pub fn prerequisite(mut self, unit: Unit) -> Self {
        self.prerequisites.push(unit);
        self
    }

    /// Override the tag the work's own [`Work::tag`] would otherwise supply.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag_override = Some(tag.into());
        self
    }

    pub fn build(self) -> Unit {
        let id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let tag = self.tag_override.unwrap_or_else(|| self.work.tag());

        Unit(Arc::new(UnitInner {
            id,
            tag,
            work: self.work,
            prerequisites: self.prerequisites,
            status: Mutex::new(UnitStatus::Pending),
            result: Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
            hooks: Mutex::new(Hooks::default()),
        }))
    }
}
