//! A dependency-aware, tag-partitioned concurrent task execution engine.
//!
//! Three pieces compose the engine:
//! - [`unit::Unit`] (a piece of work with prerequisites and a lifecycle).
//! - [`dag::Scheduler`] (registers units and exposes a blocking readiness
//!   sequence that yields each unit once every prerequisite is decided).
//! - [`executor::Executor`] (drives that sequence onto bounded, per-tag
//!   worker pools).
//!
//! A unit that fails cancels its direct dependents; they in turn cancel
//! *their* dependents when their own cancellation hook fires, so the
//! cascade reaches the whole downstream subgraph without the scheduler
//! ever walking more than one level of `dependents` in a single hook.
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskloom::dag::Scheduler;
//! use taskloom::executor::Executor;
//! use taskloom::unit::{Unit, WorkResult};
//!
//! let read = Unit::builder(|| -> WorkResult {
//!     Ok(Arc::new("file contents".to_string()))
//! })
//! .id("read")
//! .tag("io")
//! .build();
//!
//! let process = Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
//!     .id("process")
//!     .tag("cpu")
//!     .prerequisite(read.clone())
//!     .build();
//!
//! let scheduler = Scheduler::new();
//! scheduler.schedule(read).unwrap();
//! scheduler.schedule(process.clone()).unwrap();
//!
//! let mut executor = Executor::new(&scheduler, 2);
//! executor.run().unwrap();
//!
//! assert_eq!(process.status(), taskloom::unit::UnitStatus::Completed);
//! ```

pub mod dag;
pub mod errors;
pub mod executor;
pub mod logging;
pub mod unit;

pub use dag::Scheduler;
pub use errors::{Result, SchedulingError};
pub use executor::Executor;
pub use unit::{Unit, UnitStatus, Work};
