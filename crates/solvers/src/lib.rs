//! Numerical back ends for the GDS evolution engine.
//!
//! - [`ode`]: adaptive single-step integrators that advance one micro-step at
//!   a time toward a movable horizon, so callers can adjust the state between
//!   micro-steps
//! - [`convex`]: a disciplined-convex expression layer and a warm-startable
//!   solver for per-step optimization problems

pub mod convex;
pub mod ode;
