use std::{fmt, ops::Deref};

use thiserror::Error;

/// A finite, strictly positive duration used to advance simulation time.
///
/// Every `step` in the engine is driven by a `TimeIncrement`, so a zero,
/// negative, or non-finite step is rejected before any state is touched.
///
/// ```
/// use gds_core::TimeIncrement;
///
/// let dt = TimeIncrement::new(0.25).unwrap();
/// assert_eq!(dt.get(), 0.25);
/// assert!(TimeIncrement::new(0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeIncrement(f64);

/// Error returned when constructing an invalid [`TimeIncrement`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimeIncrementError {
    #[error("time increment must be greater than zero, got {0}")]
    NotPositive(f64),

    #[error("time increment must be finite, got {0}")]
    NotFinite(f64),
}

impl TimeIncrement {
    /// Constructs a `TimeIncrement` from a raw duration.
    ///
    /// # Errors
    ///
    /// Returns [`TimeIncrementError::NotFinite`] for NaN or infinite values
    /// and [`TimeIncrementError::NotPositive`] for zero or negative values.
    pub fn new(dt: f64) -> Result<Self, TimeIncrementError> {
        if !dt.is_finite() {
            return Err(TimeIncrementError::NotFinite(dt));
        }
        if dt <= 0.0 {
            return Err(TimeIncrementError::NotPositive(dt));
        }
        Ok(Self(dt))
    }

    /// Returns the duration.
    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for TimeIncrement {
    type Error = TimeIncrementError;

    fn try_from(dt: f64) -> Result<Self, Self::Error> {
        Self::new(dt)
    }
}

impl Deref for TimeIncrement {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for TimeIncrement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
