//! Deterministic ordering and cascade tests driven directly against the
//! readiness iterator, without real worker threads — uses
//! `ControllableWork` so the exact moment a unit finishes is under the
//! test's control instead of racing against a sleep.

use std::collections::HashSet;
use std::time::Duration;

use taskloom::dag::Scheduler;
use taskloom::unit::UnitStatus;
use taskloom_test_utils::{diamond, with_timeout, ControllableWork};

#[test]
fn diamond_yields_top_then_both_middles_then_bottom() {
    with_timeout(Duration::from_secs(5), || {
        let (top, left, right, bottom) = diamond("d");

        let scheduler = Scheduler::new();
        for unit in [top.clone(), left.clone(), right.clone(), bottom.clone()] {
            scheduler.schedule(unit).unwrap();
        }

        let mut iter = scheduler.ready_units();

        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.id(), top.id());
        first.run_once();

        let mut middle_ids = HashSet::new();
        for _ in 0..2 {
            let unit = iter.next().unwrap().unwrap();
            middle_ids.insert(unit.id().to_string());
            unit.run_once();
        }
        assert_eq!(
            middle_ids,
            [left.id().to_string(), right.id().to_string()]
                .into_iter()
                .collect()
        );

        let last = iter.next().unwrap().unwrap();
        assert_eq!(last.id(), bottom.id());
        last.run_once();

        assert!(iter.next().is_none());
    });
}

#[test]
fn a_unit_still_running_blocks_its_dependent_from_becoming_ready() {
    with_timeout(Duration::from_secs(5), || {
        use std::sync::Arc;
        use taskloom::unit::Unit;

        let gate_work = ControllableWork::new();
        let gate_work_clone = gate_work.clone();

        let upstream = Unit::builder(gate_work_clone).id("upstream").build();
        let downstream = taskloom::unit::Unit::builder(|| -> taskloom::unit::WorkResult {
            Ok(Arc::new(()))
        })
        .id("downstream")
        .prerequisite(upstream.clone())
        .build();

        let scheduler = Scheduler::new();
        scheduler.schedule(upstream.clone()).unwrap();
        scheduler.schedule(downstream.clone()).unwrap();

        let mut iter = scheduler.ready_units();
        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.id(), "upstream");

        // Run upstream on a background thread so it blocks on the gate
        // instead of the test thread.
        let handle = {
            let first = first.clone();
            std::thread::spawn(move || first.run_once())
        };

        // While upstream is still RUNNING, downstream must not be ready:
        // the iterator would block on the condvar instead of yielding.
        // Release the gate, then the next `next()` call must eventually
        // produce downstream.
        gate_work.release();
        handle.join().unwrap();

        assert_eq!(upstream.status(), UnitStatus::Completed);

        let next = iter.next().unwrap().unwrap();
        assert_eq!(next.id(), "downstream");
    });
}
