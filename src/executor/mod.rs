//! Drives a [`crate::dag::Scheduler`]'s readiness sequence against
//! tag-partitioned worker pools.

use std::collections::HashMap;

use threadpool::ThreadPool;

use crate::dag::Scheduler;
use crate::errors::Result;

/// Dispatches ready units onto bounded, per-tag worker pools.
///
/// One pool per distinct `unit.tag()`, created lazily the first time that
/// tag is seen, each with a fixed size of `workers_per_tag`. An overloaded
/// tag queues against its own pool and cannot starve another tag's pool.
pub struct Executor<'a> {
    scheduler: &'a Scheduler,
    workers_per_tag: usize,
    pools: HashMap<String, ThreadPool>,
}

impl<'a> Executor<'a> {
    /// `workers_per_tag` must be positive (zero would deadlock every pool
    /// before its first unit could run), so it is rejected here rather than
    /// silently clamped.
    ///
    /// # Panics
    /// Panics if `workers_per_tag` is zero. This is a programmer error (a
    /// misconfigured constant), not a runtime condition callers are
    /// expected to recover from.
    pub fn new(scheduler: &'a Scheduler, workers_per_tag: usize) -> Self {
        assert!(
            workers_per_tag > 0,
            "workers_per_tag must be positive, got 0"
        );
        Self {
            scheduler,
            workers_per_tag,
            pools: HashMap::new(),
        }
    }

    /// `workers_per_tag` defaults to 3.
    pub fn with_default_workers(scheduler: &'a Scheduler) -> Self {
        Self::new(scheduler, 3)
    }

    fn pool_for(&mut self, tag: &str) -> &ThreadPool {
        if !self.pools.contains_key(tag) {
            tracing::debug!(tag, workers = self.workers_per_tag, "creating worker pool");
            let pool = threadpool::Builder::new()
                .num_threads(self.workers_per_tag)
                .thread_name(format!("taskloom-{tag}"))
                .build();
            self.pools.insert(tag.to_string(), pool);
        }
        self.pools.get(tag).unwrap()
    }

    /// Drive the scheduler's readiness sequence to completion: submit every
    /// ready unit to its tag's pool, then shut every pool down once no
    /// units remain pending.
    ///
    /// Returns the first [`crate::errors::SchedulingError`] encountered (a
    /// cycle, detected on the first readiness scan). Units that merely
    /// fail or get canceled during a normal run are not reported here;
    /// inspect each unit's `status()`/`result()` after `run` returns.
    pub fn run(&mut self) -> Result<()> {
        for item in self.scheduler.ready_units() {
            let unit = item?;
            let tag = unit.tag().to_string();
            let pool = self.pool_for(&tag);
            pool.execute(move || {
                unit.run_once();
            });
        }

        self.shutdown(true);
        Ok(())
    }

    /// Shut down every pool created so far. With `wait = true`, blocks
    /// until all submitted work has drained from every pool. Pools are not
    /// usable after this call.
    pub fn shutdown(&mut self, wait: bool) {
        for (tag, pool) in self.pools.drain() {
            tracing::debug!(tag, "shutting down worker pool");
            if wait {
                pool.join();
            }
        }
    }
}

impl Drop for Executor<'_> {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}
