use thiserror::Error;

/// Configuration for the convex solver.
///
/// Nonsmooth atoms (`abs`, `pos`, `norm2`, `max`) are replaced by smooth
/// approximations controlled by a smoothing width. The solver minimizes a
/// sequence of approximations, shrinking the width by `smoothing_factor`
/// from `smoothing_initial` down to `smoothing_min`, warm-starting each
/// stage from the last. Smooth objectives are solved in a single stage.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    max_iters: usize,
    tolerance: f64,
    smoothing_initial: f64,
    smoothing_factor: f64,
    smoothing_min: f64,
}

/// Errors that can occur when validating a convex solver config.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("max_iters must be at least one")]
    MaxIters,

    #[error("tolerance must be finite and positive, got {0}")]
    Tolerance(f64),

    #[error("smoothing widths must satisfy 0 < min <= initial, got min {min} and initial {initial}")]
    SmoothingWidth { initial: f64, min: f64 },

    #[error("smoothing factor must lie strictly between 0 and 1, got {0}")]
    SmoothingFactor(f64),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iters: 100,
            tolerance: 1e-10,
            smoothing_initial: 1.0,
            smoothing_factor: 0.1,
            smoothing_min: 1e-10,
        }
    }
}

impl Config {
    /// Creates a new config with the default smoothing schedule.
    ///
    /// `max_iters` bounds the Newton iterations of each smoothing stage and
    /// `tolerance` is the stopping threshold on half the squared Newton
    /// decrement.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_iters` is zero or `tolerance` is not finite
    /// and positive.
    pub fn new(max_iters: usize, tolerance: f64) -> Result<Self, ConfigError> {
        if max_iters == 0 {
            return Err(ConfigError::MaxIters);
        }
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(ConfigError::Tolerance(tolerance));
        }
        Ok(Self {
            max_iters,
            tolerance,
            ..Self::default()
        })
    }

    /// Returns a copy with a new smoothing schedule.
    ///
    /// # Errors
    ///
    /// Returns an error if the widths are not finite with
    /// `0 < min <= initial`, or if `factor` is not in `(0, 1)`.
    pub fn with_smoothing(self, initial: f64, factor: f64, min: f64) -> Result<Self, ConfigError> {
        if !(initial.is_finite() && min.is_finite() && min > 0.0 && min <= initial) {
            return Err(ConfigError::SmoothingWidth { initial, min });
        }
        if !(factor > 0.0 && factor < 1.0) {
            return Err(ConfigError::SmoothingFactor(factor));
        }
        Ok(Self {
            smoothing_initial: initial,
            smoothing_factor: factor,
            smoothing_min: min,
            ..self
        })
    }

    /// Returns the Newton iteration limit per smoothing stage.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Returns the sequence of smoothing widths, largest first.
    pub(super) fn smoothing_schedule(&self) -> impl Iterator<Item = f64> + '_ {
        let factor = self.smoothing_factor;
        let min = self.smoothing_min;
        let mut next = Some(self.smoothing_initial);
        std::iter::from_fn(move || {
            let current = next?;
            next = if current > min {
                Some((current * factor).max(min))
            } else {
                None
            };
            Some(current)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_ends_at_minimum_width() {
        let config = Config::default().with_smoothing(1.0, 0.5, 0.2).unwrap();
        let widths: Vec<f64> = config.smoothing_schedule().collect();
        assert_eq!(widths, vec![1.0, 0.5, 0.25, 0.2]);
    }

    #[test]
    fn rejects_invalid_values() {
        assert_eq!(Config::new(0, 1e-8), Err(ConfigError::MaxIters));
        assert!(matches!(
            Config::new(10, f64::NAN),
            Err(ConfigError::Tolerance(_))
        ));
        assert!(Config::default().with_smoothing(1.0, 1.0, 0.1).is_err());
        assert!(Config::default().with_smoothing(0.1, 0.5, 1.0).is_err());
    }
}
