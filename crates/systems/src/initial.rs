use std::fmt;

use gds_core::{Domain, DomainPoint};
use indexmap::IndexSet;

use crate::ConfigError;

/// An initial condition: a value per point or a precomputed array.
pub enum Initial<P> {
    /// `point → value` for the first block; higher blocks start at zero.
    Fn(Box<dyn Fn(&P) -> f64>),
    /// Values in domain order: either `ndim` values for the first block or
    /// `order · ndim` values for the whole companion state.
    Values(Vec<f64>),
}

impl<P> Initial<P> {
    pub fn from_fn(f: impl Fn(&P) -> f64 + 'static) -> Self {
        Self::Fn(Box::new(f))
    }

    /// Every point starts at zero.
    #[must_use]
    pub fn zeros() -> Self {
        Self::Values(Vec::new())
    }

    pub(crate) fn check(&self, ndim: usize, order: usize) -> Result<(), ConfigError> {
        match self {
            Self::Values(values)
                if !values.is_empty() && values.len() != ndim && values.len() != ndim * order =>
            {
                Err(ConfigError::InitialLength {
                    ndim,
                    full: ndim * order,
                    got: values.len(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Builds a full state, leaving points in `skip` at zero.
    pub(crate) fn state(&self, domain: &Domain<P>, order: usize, skip: &IndexSet<P>) -> Vec<f64>
    where
        P: DomainPoint,
    {
        let ndim = domain.ndim();
        let mut state = vec![0.0; ndim * order];
        match self {
            Self::Fn(f) => {
                for (i, point) in domain.difference(skip) {
                    state[i] = f(point);
                }
            }
            Self::Values(values) => {
                for (i, _) in domain.difference(skip) {
                    for (k, v) in values.iter().skip(i).step_by(ndim).enumerate() {
                        state[k * ndim + i] = *v;
                    }
                }
            }
        }
        state
    }
}

impl<P> From<Vec<f64>> for Initial<P> {
    fn from(values: Vec<f64>) -> Self {
        Self::Values(values)
    }
}

impl<P> From<&[f64]> for Initial<P> {
    fn from(values: &[f64]) -> Self {
        Self::Values(values.to_vec())
    }
}

impl<P, const N: usize> From<[f64; N]> for Initial<P> {
    fn from(values: [f64; N]) -> Self {
        Self::Values(values.to_vec())
    }
}

impl<P> fmt::Debug for Initial<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fn(_) => f.write_str("Fn(..)"),
            Self::Values(values) => f.debug_tuple("Values").field(values).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn functions_skip_excluded_points() {
        let domain = Domain::new(["a", "b", "c"]).unwrap();
        let skip: IndexSet<&str> = ["b"].into_iter().collect();
        let initial = Initial::from_fn(|p: &&str| if *p == "b" { f64::NAN } else { 2.0 });

        assert_eq!(initial.state(&domain, 2, &skip), vec![2.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn full_length_arrays_fill_every_block() {
        let domain = Domain::new([0, 1]).unwrap();
        let initial = Initial::from([1.0, 2.0, 3.0, 4.0]);
        assert!(initial.check(2, 2).is_ok());
        assert_eq!(
            initial.state(&domain, 2, &IndexSet::new()),
            vec![1.0, 2.0, 3.0, 4.0]
        );

        let short = Initial::<i32>::from(vec![1.0, 2.0]);
        assert_eq!(short.state(&domain, 2, &IndexSet::new()), vec![1.0, 2.0, 0.0, 0.0]);
        assert!(Initial::<i32>::from(vec![1.0; 3]).check(2, 2).is_err());
    }
}
