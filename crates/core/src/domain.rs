use std::{fmt::Debug, hash::Hash};

use indexmap::IndexSet;
use thiserror::Error;

/// Bound for the opaque points a [`Domain`] indexes.
///
/// Points are typically graph vertices (`usize`, `(i, j)` grid coordinates) or
/// edges (`(u, v)` pairs). Any cloneable, hashable, debuggable type qualifies.
pub trait DomainPoint: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> DomainPoint for T {}

/// Errors that can occur when constructing a [`Domain`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("domain has no points")]
    Empty,

    #[error("point {0} appears more than once")]
    Duplicate(String),
}

/// An indexed set of points over which a quantity is defined.
///
/// A `Domain` maps every point to exactly one index in `[0, ndim)` and every
/// index back to exactly one point. Index order is the order in which points
/// were supplied at construction. Domains are immutable once built and are
/// shared read-only by every system defined on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain<P: DomainPoint> {
    points: IndexSet<P>,
}

impl<P: DomainPoint> Domain<P> {
    /// Builds a domain from points, assigning indices in iteration order.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Empty`] if no points are supplied, or
    /// [`DomainError::Duplicate`] if a point is supplied twice.
    pub fn new(points: impl IntoIterator<Item = P>) -> Result<Self, DomainError> {
        let mut set = IndexSet::new();
        for point in points {
            if set.contains(&point) {
                return Err(DomainError::Duplicate(format!("{point:?}")));
            }
            set.insert(point);
        }

        if set.is_empty() {
            return Err(DomainError::Empty);
        }

        Ok(Self { points: set })
    }

    /// Returns the number of points.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.points.len()
    }

    /// Returns the dense index of `point`, if it belongs to the domain.
    #[must_use]
    pub fn index_of(&self, point: &P) -> Option<usize> {
        self.points.get_index_of(point)
    }

    /// Returns the point stored at `index`.
    #[must_use]
    pub fn point(&self, index: usize) -> Option<&P> {
        self.points.get_index(index)
    }

    /// Returns `true` if `point` belongs to the domain.
    #[must_use]
    pub fn contains(&self, point: &P) -> bool {
        self.points.contains(point)
    }

    /// Iterates over the points in index order.
    pub fn points(&self) -> impl Iterator<Item = &P> {
        self.points.iter()
    }

    /// Iterates over `(index, point)` pairs in index order.
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &P)> {
        self.points.iter().enumerate()
    }

    /// Iterates over the `(index, point)` pairs not contained in `excluded`.
    ///
    /// This is how a system separates its free points from its constrained
    /// ones.
    pub fn difference<'a>(
        &'a self,
        excluded: &'a IndexSet<P>,
    ) -> impl Iterator<Item = (usize, &'a P)> + 'a {
        self.indexed().filter(move |(_, p)| !excluded.contains(*p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_insertion_order() {
        let domain = Domain::new(["a", "b", "c"]).unwrap();

        assert_eq!(domain.ndim(), 3);
        assert_eq!(domain.index_of(&"b"), Some(1));
        assert_eq!(domain.point(2), Some(&"c"));
        assert_eq!(domain.index_of(&"z"), None);
        assert_eq!(domain.point(3), None);
    }

    #[test]
    fn every_index_round_trips_through_its_point() {
        let domain = Domain::new((0..4).flat_map(|i| (0..3).map(move |j| (i, j)))).unwrap();

        for (i, p) in domain.indexed() {
            assert_eq!(domain.index_of(p), Some(i));
        }
    }

    #[test]
    fn rejects_duplicates_and_empty() {
        assert_eq!(
            Domain::new([1, 2, 1]),
            Err(DomainError::Duplicate("1".into()))
        );
        assert_eq!(Domain::<u32>::new([]), Err(DomainError::Empty));
    }

    #[test]
    fn difference_skips_excluded_points() {
        let domain = Domain::new(['w', 'x', 'y', 'z']).unwrap();
        let excluded: IndexSet<char> = ['x', 'z'].into_iter().collect();

        let free: Vec<_> = domain.difference(&excluded).collect();

        assert_eq!(free, vec![(0, &'w'), (2, &'y')]);
    }
}
