use std::ops::Range;

use indexmap::IndexMap;

use crate::Siblings;

/// A continuous member's address in the shared state vector.
#[derive(Debug, Clone)]
pub(super) struct Slot {
    pub(super) name: String,
    pub(super) member: usize,
    pub(super) range: Range<usize>,
    pub(super) ndim: usize,
}

impl Slot {
    /// Indices of the member's value block.
    pub(super) fn value_range(&self) -> Range<usize> {
        self.range.start..self.range.start + self.ndim
    }
}

/// Continuous state a discrete catch-up is allowed to read.
#[derive(Debug, Clone, Copy)]
pub(super) struct Continuum<'a> {
    pub(super) t: f64,
    pub(super) y: &'a [f64],
    pub(super) slots: &'a [Slot],
}

impl Continuum<'_> {
    pub(super) fn empty() -> Self {
        Continuum {
            t: 0.0,
            y: &[],
            slots: &[],
        }
    }
}

/// Resolves sibling names against the shared vector and published values.
pub(super) struct Lookup<'a> {
    pub(super) continuum: Continuum<'a>,
    pub(super) clock: f64,
    pub(super) published: &'a IndexMap<String, Vec<f64>>,
}

impl Lookup<'_> {
    fn slot(&self, name: &str) -> Option<&Slot> {
        self.continuum.slots.iter().find(|slot| slot.name == name)
    }
}

impl Siblings for Lookup<'_> {
    fn value(&self, name: &str) -> Option<&[f64]> {
        match self.slot(name) {
            Some(slot) => self.continuum.y.get(slot.value_range()),
            None => self.published.get(name).map(Vec::as_slice),
        }
    }

    fn time(&self, name: &str) -> Option<f64> {
        if self.slot(name).is_some() {
            Some(self.continuum.t)
        } else if self.published.contains_key(name) {
            Some(self.clock)
        } else {
            None
        }
    }
}
