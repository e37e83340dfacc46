//! Small constructors for the unit shapes integration tests build
//! repeatedly: independent leaves, linear chains, diamonds, and units whose
//! work always fails or panics.

use std::sync::Arc;

use taskloom::unit::{Unit, WorkResult};

/// A unit with no prerequisites that always succeeds.
pub fn leaf(id: &str) -> Unit {
    Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
        .id(id)
        .build()
}

/// A unit whose work always returns an error.
pub fn failing(id: &str) -> Unit {
    Unit::builder(|| -> WorkResult { Err(Arc::new(format!("{id} failed")) as _) })
        .id(id)
        .build()
}

/// A unit whose work always panics, exercising the `catch_unwind` boundary.
pub fn panicking(id: &str) -> Unit {
    let id_owned = id.to_string();
    Unit::builder(move || -> WorkResult { panic!("{id_owned} panicked") })
        .id(id)
        .build()
}

/// `count` units in a straight line, each depending on the previous one.
/// Returns them in dependency order (index 0 has no prerequisites).
pub fn chain(prefix: &str, count: usize) -> Vec<Unit> {
    let mut units = Vec::with_capacity(count);
    for i in 0..count {
        let id = format!("{prefix}-{i}");
        let mut builder = Unit::builder(|| -> WorkResult { Ok(Arc::new(())) }).id(id);
        if let Some(prev) = units.last() {
            builder = builder.prerequisite(Unit::clone(prev));
        }
        units.push(builder.build());
    }
    units
}

/// The classic diamond: `top` has no prerequisites; `left` and `right` both
/// depend on `top`; `bottom` depends on both. Returned as
/// `(top, left, right, bottom)`.
pub fn diamond(prefix: &str) -> (Unit, Unit, Unit, Unit) {
    let top = leaf(&format!("{prefix}-top"));
    let left = Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
        .id(format!("{prefix}-left"))
        .prerequisite(top.clone())
        .build();
    let right = Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
        .id(format!("{prefix}-right"))
        .prerequisite(top.clone())
        .build();
    let bottom = Unit::builder(|| -> WorkResult { Ok(Arc::new(())) })
        .id(format!("{prefix}-bottom"))
        .prerequisite(left.clone())
        .prerequisite(right.clone())
        .build();
    (top, left, right, bottom)
}
