//! Crate-wide error type.
//!
//! Only *structural* failures of the engine itself are represented here:
//! duplicate registration and cyclic graphs. A unit's own failure is never
//! surfaced through this type; it is captured on the unit (see
//! [`crate::unit::UnitStatus::Failed`]) and observed through the cascade
//! hooks instead, per the engine's error handling policy.

use thiserror::Error;

use crate::unit::UnitId;

/// Structural errors raised by [`crate::dag::Scheduler`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    /// A unit with this id was already registered.
    #[error("unit '{0}' is already registered with the scheduler")]
    DuplicateUnit(UnitId),

    /// The dependency graph contains a cycle, detected by Kahn's algorithm on
    /// the first use of the readiness iterator.
    #[error("circular dependencies detected in dependency graph (unresolved units: {0:?})")]
    Cycle(Vec<UnitId>),
}

pub type Result<T> = std::result::Result<T, SchedulingError>;
