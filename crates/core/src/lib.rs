//! Core types for the GDS evolution engine.
//!
//! This crate defines the pieces every evolving system is built on:
//!
//! - [`Domain`]: a bijection between opaque, hashable points and the dense
//!   index range `[0, ndim)`
//! - [`DomainPoint`]: the bound a point type must satisfy
//! - [`TimeIncrement`]: a validated, strictly positive step size

mod domain;
mod time;

pub use domain::{Domain, DomainError, DomainPoint};
pub use time::{TimeIncrement, TimeIncrementError};
