//! The dependency-aware scheduler: registration, the blocking readiness
//! iterator, and cascade cancellation.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use crate::dag::graph::Graph;
use crate::errors::{Result, SchedulingError};
use crate::unit::{Unit, UnitId, UnitStatus};

struct State {
    graph: Graph,
    cycle_checked: bool,
    cycle_error: Option<Vec<UnitId>>,
}

/// Registers units, detects cycles, and exposes the readiness sequence the
/// [`crate::executor::Executor`] drives.
///
/// All readiness decisions and cascade callbacks happen under a single
/// mutex/condvar pair; each unit's own status lives behind its own
/// lightweight synchronization, so only the readiness *decision* needs one
/// global serialization point.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    state: Mutex<State>,
    condvar: Condvar,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(State {
                    graph: Graph::new(),
                    cycle_checked: false,
                    cycle_error: None,
                }),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Construct with a set of units pre-registered, in iteration order.
    pub fn with_units(units: impl IntoIterator<Item = Unit>) -> Result<Self> {
        let scheduler = Self::new();
        for unit in units {
            scheduler.schedule(unit)?;
        }
        Ok(scheduler)
    }

    /// Register a unit (and, recursively, any not-yet-registered
    /// prerequisite it names). Fails if the unit's own id is already
    /// registered.
    ///
    /// Every node this call adds to the graph, including auto-registered
    /// prerequisites, gets its hooks installed here before
    /// `Graph::insert` sees it. `Graph::insert` itself never auto-registers
    /// anything; it only stores the single node it is handed, so there is
    /// no path by which a node can end up in the graph without hooks.
    pub fn schedule(&self, unit: Unit) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        if state.graph.contains(unit.id()) {
            return Err(SchedulingError::DuplicateUnit(unit.id().to_string()));
        }
        self.register_with_prerequisites(&unit, &mut state)
    }

    /// Registers `unit` after first registering, recursively, any
    /// prerequisite of its that the graph doesn't already know about.
    /// Shared prerequisites (already present from an earlier `schedule`
    /// call) are left alone rather than treated as duplicates.
    fn register_with_prerequisites(&self, unit: &Unit, state: &mut State) -> Result<()> {
        for prereq in unit.prerequisites() {
            if !state.graph.contains(prereq.id()) {
                tracing::debug!(unit = prereq.id(), "auto-registering prerequisite");
                self.register_with_prerequisites(prereq, state)?;
            }
        }

        self.install_hooks(unit);
        tracing::debug!(unit = unit.id(), "registering unit");
        state.graph.insert(unit.clone())
    }

    fn install_hooks(&self, unit: &Unit) {
        let inner = Arc::clone(&self.inner);
        let on_completed = Arc::new({
            let inner = Arc::clone(&inner);
            move |u: &Unit| inner.on_completed(u)
        });
        let on_failed = Arc::new({
            let inner = Arc::clone(&inner);
            move |u: &Unit| inner.on_failed(u)
        });
        let on_canceled = Arc::new(move |u: &Unit| inner.on_canceled(u));
        unit.install_hooks(on_completed, on_failed, on_canceled);
    }

    /// The blocking readiness sequence. Consuming this fully drives every
    /// registered unit to a terminal state (COMPLETED, FAILED, or
    /// CANCELED), so long as something dispatches the yielded units (this
    /// is what [`crate::executor::Executor::run`] does).
    pub fn ready_units(&self) -> ReadyUnits {
        ReadyUnits {
            inner: Arc::clone(&self.inner),
            started: false,
            buffer: VecDeque::new(),
        }
    }

    /// Force an extra dependency edge directly onto the graph, bypassing
    /// `Unit::prerequisites()`. Real cycles cannot arise through the public
    /// API since prerequisites are fixed at construction; this exists only
    /// to exercise the cycle-detection path the same way the original test
    /// suite this is grounded on does (by mutating a dependency set after
    /// the fact).
    #[cfg(test)]
    pub(crate) fn force_dependency_edge_for_test(&self, from: &str, to: &str) {
        let mut state = self.inner.state.lock().unwrap();
        state.graph.force_dependency_edge_for_test(from, to);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerInner {
    fn on_completed(&self, _unit: &Unit) {
        let _state = self.state.lock().unwrap();
        self.condvar.notify_all();
    }

    fn on_failed(&self, unit: &Unit) {
        let state = self.state.lock().unwrap();
        self.cascade_cancel(&state, unit);
        self.condvar.notify_all();
    }

    fn on_canceled(&self, unit: &Unit) {
        let state = self.state.lock().unwrap();
        self.cascade_cancel(&state, unit);
        self.condvar.notify_all();
    }

    /// Requests cancellation on every *direct* dependent of `unit`. Does not
    /// recurse: a dependent that is itself canceled as a result will fire
    /// its own hook (this same method) when `run_once` processes it,
    /// carrying the cascade one level further.
    fn cascade_cancel(&self, state: &State, unit: &Unit) {
        let dependents = state.graph.dependents_of(unit.id());
        if !dependents.is_empty() {
            tracing::debug!(
                unit = unit.id(),
                dependents = dependents.len(),
                "cascading cancellation to direct dependents"
            );
        }
        for dependent_id in dependents {
            if let Some(node) = state.graph.get(dependent_id) {
                node.unit.request_cancel();
            }
        }
    }
}

/// Blocking lazy sequence of ready units, paired with the Scheduler's mutex
/// and condition variable.
pub struct ReadyUnits {
    inner: Arc<SchedulerInner>,
    started: bool,
    /// Units from the most recent readiness scan that have already been
    /// marked SCHEDULED but not yet handed to the consumer. A single
    /// scan's whole ready batch is claimed at once so it cannot be
    /// re-discovered by a concurrent scan before it drains.
    buffer: VecDeque<Unit>,
}

impl ReadyUnits {
    fn ensure_acyclic(&self, state: &mut State) -> Result<()> {
        if state.cycle_checked {
            return match &state.cycle_error {
                Some(unresolved) => Err(SchedulingError::Cycle(unresolved.clone())),
                None => Ok(()),
            };
        }

        state.cycle_checked = true;
        if let Some(unresolved) = state.graph.find_cycle() {
            tracing::warn!(count = unresolved.len(), "circular dependencies detected");
            state.cycle_error = Some(unresolved.clone());
            return Err(SchedulingError::Cycle(unresolved));
        }
        Ok(())
    }
}

impl Iterator for ReadyUnits {
    type Item = Result<Unit>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(unit) = self.buffer.pop_front() {
            return Some(Ok(unit));
        }

        let mut state = self.inner.state.lock().unwrap();

        if !self.started {
            self.started = true;
            if let Err(err) = self.ensure_acyclic(&mut state) {
                return Some(Err(err));
            }
        }

        loop {
            let pending_exists = state
                .graph
                .units()
                .any(|u| u.status() == UnitStatus::Pending);
            if !pending_exists {
                return None;
            }

            let ready: Vec<Unit> = state
                .graph
                .units()
                .filter(|u| {
                    u.status() == UnitStatus::Pending && state.graph.deps_satisfied(u.id())
                })
                .cloned()
                .collect();

            if !ready.is_empty() {
                for unit in &ready {
                    unit.mark_scheduled();
                    tracing::debug!(unit = unit.id(), "unit became ready");
                }
                self.buffer = ready.into_iter().collect();
                return self.buffer.pop_front().map(Ok);
            }

            state = self.inner.condvar.wait(state).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::WorkResult;
    use std::collections::HashSet;

    fn leaf(id: &str) -> Unit {
        Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
            .id(id)
            .build()
    }

    fn depends_on(id: &str, prereqs: &[&Unit]) -> Unit {
        let mut builder = Unit::builder(|| -> WorkResult { Ok(Arc::new(())) }).id(id);
        for prereq in prereqs {
            builder = builder.prerequisite((*prereq).clone());
        }
        builder.build()
    }

    #[test]
    fn diamond_drains_in_topological_levels() {
        let a = leaf("a");
        let b = depends_on("b", &[&a]);
        let c = depends_on("c", &[&a]);
        let d = depends_on("d", &[&b, &c]);

        // Scheduling just the sink auto-registers b, c, and a transitively;
        // their hooks are installed along the way, so this also exercises
        // the auto-registration path rather than only the explicit one.
        let scheduler = Scheduler::new();
        scheduler.schedule(d.clone()).unwrap();

        let mut iter = scheduler.ready_units();

        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.id(), "a");
        first.run_once();

        let mut second_level: HashSet<String> = HashSet::new();
        for _ in 0..2 {
            let unit = iter.next().unwrap().unwrap();
            second_level.insert(unit.id().to_string());
            unit.run_once();
        }
        assert_eq!(
            second_level,
            ["b".to_string(), "c".to_string()].into_iter().collect()
        );

        let last = iter.next().unwrap().unwrap();
        assert_eq!(last.id(), "d");
        last.run_once();

        assert!(iter.next().is_none());
    }

    #[test]
    fn failure_cascades_cancellation_to_dependents_only_not_siblings() {
        let x = Unit::builder(|| -> WorkResult { Err(Arc::new("boom") as _) })
            .id("x")
            .build();
        let y = depends_on("y", &[&x]);
        let sibling = leaf("sibling");

        let scheduler = Scheduler::new();
        scheduler.schedule(x).unwrap();
        scheduler.schedule(y).unwrap();
        scheduler.schedule(sibling).unwrap();

        let mut iter = scheduler.ready_units();

        let mut first_batch = HashSet::new();
        for _ in 0..2 {
            let unit = iter.next().unwrap().unwrap();
            first_batch.insert(unit.id().to_string());
            unit.run_once();
        }
        assert_eq!(
            first_batch,
            ["x".to_string(), "sibling".to_string()].into_iter().collect()
        );

        let next = iter.next().unwrap().unwrap();
        assert_eq!(next.id(), "y");
        assert_eq!(next.status(), UnitStatus::Scheduled);
        next.run_once();
        assert_eq!(next.status(), UnitStatus::Canceled);

        assert!(iter.next().is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let scheduler = Scheduler::new();
        scheduler.schedule(leaf("a")).unwrap();
        let err = scheduler.schedule(leaf("a")).unwrap_err();
        assert_eq!(err, SchedulingError::DuplicateUnit("a".to_string()));
    }

    #[test]
    fn empty_scheduler_yields_nothing() {
        let scheduler = Scheduler::new();
        let mut iter = scheduler.ready_units();
        assert!(iter.next().is_none());
    }

    #[test]
    fn cycle_introduced_after_registration_fails_on_first_readiness_use() {
        let a = leaf("a");
        let b = depends_on("b", &[&a]);
        let c = depends_on("c", &[&b]);

        let scheduler = Scheduler::new();
        scheduler.schedule(a).unwrap();
        scheduler.schedule(b).unwrap();
        scheduler.schedule(c).unwrap();

        // Close the loop a -> b -> c -> a.
        scheduler.force_dependency_edge_for_test("a", "c");

        let mut iter = scheduler.ready_units();
        match iter.next() {
            Some(Err(SchedulingError::Cycle(unresolved))) => {
                assert_eq!(unresolved.len(), 3);
            }
            other => panic!("expected a Cycle error, got {other:?}"),
        }
    }
}
