//! The three evolution modes behind [`EvolvingSystem`](crate::EvolvingSystem).

mod continuous;
mod convex_step;
mod discrete;

use std::fmt;

pub(crate) use continuous::{ContinuousSystem, evaluate};
pub use convex_step::CostContext;
pub(crate) use convex_step::ConvexStepSystem;
pub(crate) use discrete::DiscreteSystem;

use gds_core::DomainPoint;

/// Which evolution law a system follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    /// No law has been set yet.
    Undefined,
    Continuous,
    ConvexStep,
    Discrete,
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::Continuous => "continuous",
            Self::ConvexStep => "convex-step",
            Self::Discrete => "discrete",
        };
        f.write_str(name)
    }
}

/// Mode-specific solver state.
pub(crate) enum Mode<P: DomainPoint> {
    Undefined,
    Continuous(ContinuousSystem<P>),
    Convex(ConvexStepSystem),
    Discrete(DiscreteSystem<P>),
}

impl<P: DomainPoint> Mode<P> {
    pub(crate) fn kind(&self) -> ModeKind {
        match self {
            Self::Undefined => ModeKind::Undefined,
            Self::Continuous(_) => ModeKind::Continuous,
            Self::Convex(_) => ModeKind::ConvexStep,
            Self::Discrete(_) => ModeKind::Discrete,
        }
    }

    /// Number of `ndim` blocks in the state.
    pub(crate) fn order(&self) -> usize {
        match self {
            Self::Continuous(system) => system.law().order(),
            _ => 1,
        }
    }
}
