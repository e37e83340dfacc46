//! Bidirectional dependency graph over [`Unit`]s.
//!
//! Stores `deps` and `dependents` maps side by side so the scheduler never
//! has to walk the whole unit set to answer "what does X block?" or "is X
//! ready?" (both are O(1) lookups).

use std::collections::HashMap;

use crate::errors::SchedulingError;
use crate::unit::{Unit, UnitId};

/// A registered unit plus its graph edges.
pub(crate) struct Node {
    pub(crate) unit: Unit,
    pub(crate) deps: Vec<UnitId>,
    pub(crate) dependents: Vec<UnitId>,
}

/// The dependency graph backing a [`crate::dag::Scheduler`].
///
/// `Graph` itself only ever stores the single node it is handed; it does
/// not walk `Unit::prerequisites()` to discover and register anything on
/// its own. Auto-registration of unnamed prerequisites, and installing
/// each node's hooks, is the caller's job (`crate::dag::Scheduler::schedule`
/// does both, recursively, before ever calling `insert`).
#[derive(Default)]
pub(crate) struct Graph {
    nodes: HashMap<UnitId, Node>,
}

impl Graph {
    pub(crate) fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn units(&self) -> impl Iterator<Item = &Unit> {
        self.nodes.values().map(|node| &node.unit)
    }

    /// Register the single node `unit`. Returns
    /// [`SchedulingError::DuplicateUnit`] if `unit`'s own id collides with an
    /// already-registered unit.
    ///
    /// Does not look at `unit.prerequisites()` beyond recording their ids:
    /// a prerequisite that isn't already present in the graph is wired into
    /// `dependents` once it is inserted in its own right, not auto-discovered
    /// here. Callers (`crate::dag::Scheduler::schedule`) are expected to have
    /// already registered every prerequisite before calling this.
    pub(crate) fn insert(&mut self, unit: Unit) -> Result<(), SchedulingError> {
        if self.nodes.contains_key(unit.id()) {
            return Err(SchedulingError::DuplicateUnit(unit.id().to_string()));
        }

        let id = unit.id().to_string();
        let deps: Vec<UnitId> = unit
            .prerequisites()
            .iter()
            .map(|prereq| prereq.id().to_string())
            .collect();

        self.nodes.insert(
            id.clone(),
            Node {
                unit: unit.clone(),
                deps: deps.clone(),
                dependents: Vec::new(),
            },
        );

        for dep_id in &deps {
            if let Some(dep_node) = self.nodes.get_mut(dep_id) {
                dep_node.dependents.push(id.clone());
            }
        }

        Ok(())
    }

    /// Direct dependents of `id` (the cascade hooks only ever walk one
    /// level of this).
    pub(crate) fn dependents_of(&self, id: &str) -> &[UnitId] {
        self.nodes
            .get(id)
            .map(|node| node.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Whether every prerequisite of `id` has reached *some* terminal state
    /// (COMPLETED, FAILED, or CANCELED). A dependent becomes eligible as
    /// soon as its prerequisites are decided, not only when they succeed.
    /// Whether it actually runs or gets cascaded into CANCELED is resolved
    /// separately, by the cancel flag checked in `Unit::run_once`.
    pub(crate) fn deps_satisfied(&self, id: &str) -> bool {
        match self.nodes.get(id) {
            Some(node) => node.deps.iter().all(|dep_id| {
                self.nodes
                    .get(dep_id)
                    .map(|dep| dep.unit.status().is_terminal())
                    .unwrap_or(false)
            }),
            None => false,
        }
    }

    /// Kahn's algorithm: detect a cycle among the currently-registered
    /// nodes. Returns the ids that could not be resolved to an in-degree of
    /// zero (the units participating in, or downstream of, a cycle).
    pub(crate) fn find_cycle(&self) -> Option<Vec<UnitId>> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .keys()
            .map(|id| (id.as_str(), 0usize))
            .collect();

        for node in self.nodes.values() {
            for dep_id in &node.deps {
                if self.nodes.contains_key(dep_id) {
                    *in_degree.get_mut(node.unit.id()).unwrap() += 1;
                }
            }
        }

        let mut queue: std::collections::VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut processed = 0usize;
        while let Some(id) = queue.pop_front() {
            processed += 1;
            for dependent_id in self.dependents_of(id) {
                if let Some(degree) = in_degree.get_mut(dependent_id.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent_id.as_str());
                    }
                }
            }
        }

        if processed == self.nodes.len() {
            None
        } else {
            let unresolved: Vec<UnitId> = in_degree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            Some(unresolved)
        }
    }

    /// Force an extra dependency edge `from -> to` directly onto already
    /// -registered nodes, bypassing `Unit::prerequisites()` entirely.
    ///
    /// Real cycles cannot arise through the public API since a unit's
    /// prerequisites are fixed at construction; this mirrors how a cycle is
    /// produced in the original test suite this behavior is grounded on
    /// (by reaching past the constructor to mutate a task's dependency set
    /// directly), so the cycle-detection path itself stays covered.
    #[cfg(test)]
    pub(crate) fn force_dependency_edge_for_test(&mut self, from: &str, to: &str) {
        if let Some(node) = self.nodes.get_mut(from) {
            node.deps.push(to.to_string());
        }
        if let Some(node) = self.nodes.get_mut(to) {
            node.dependents.push(from.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{Unit, WorkResult};
    use std::sync::Arc;

    fn leaf(id: &str) -> Unit {
        Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
            .id(id)
            .build()
    }

    #[test]
    fn insert_wires_dependents_when_prerequisite_already_present() {
        let a = leaf("a");
        let b = Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
            .id("b")
            .prerequisite(a.clone())
            .build();

        let mut graph = Graph::new();
        graph.insert(a).unwrap();
        graph.insert(b).unwrap();

        assert_eq!(graph.len(), 2);
        assert!(graph.contains("a"));
        assert_eq!(graph.dependents_of("a"), ["b".to_string()]);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut graph = Graph::new();
        graph.insert(leaf("a")).unwrap();
        let err = graph.insert(leaf("a")).unwrap_err();
        assert_eq!(err, SchedulingError::DuplicateUnit("a".to_string()));
    }

    #[test]
    fn cycle_is_detected() {
        let a = leaf("a");
        let b = Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
            .id("b")
            .prerequisite(a.clone())
            .build();
        let c = Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
            .id("c")
            .prerequisite(b.clone())
            .build();

        let mut graph = Graph::new();
        graph.insert(a).unwrap();
        graph.insert(b).unwrap();
        graph.insert(c).unwrap();
        assert!(graph.find_cycle().is_none());

        // Force a back-edge c -> a, closing the loop a -> b -> c -> a.
        graph.force_dependency_edge_for_test("a", "c");

        let unresolved = graph.find_cycle().expect("cycle should be detected");
        let unresolved: std::collections::HashSet<_> = unresolved.into_iter().collect();
        assert_eq!(
            unresolved,
            ["a".to_string(), "b".to_string(), "c".to_string()]
                .into_iter()
                .collect()
        );
    }

    #[test]
    fn no_cycle_in_diamond() {
        let a = leaf("a");
        let b = Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
            .id("b")
            .prerequisite(a.clone())
            .build();
        let c = Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
            .id("c")
            .prerequisite(a.clone())
            .build();
        let d = Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
            .id("d")
            .prerequisite(b.clone())
            .prerequisite(c.clone())
            .build();

        let mut graph = Graph::new();
        graph.insert(a).unwrap();
        graph.insert(b).unwrap();
        graph.insert(c).unwrap();
        graph.insert(d).unwrap();

        assert_eq!(graph.len(), 4);
        assert!(graph.find_cycle().is_none());
        assert!(!graph.deps_satisfied("d"));
    }
}
