use crate::Error;

/// Anything that can be advanced in time and returned to its start.
///
/// Implemented by [`EvolvingSystem`](crate::EvolvingSystem) and
/// [`CoupledSystem`](crate::CoupledSystem) so drivers can step either.
pub trait Steppable {
    /// Advances by `dt`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dt` is invalid or the underlying step fails.
    fn step(&mut self, dt: f64) -> Result<(), Error>;

    /// Restores the initial condition.
    ///
    /// # Errors
    ///
    /// Returns an error if solver state cannot be rebuilt.
    fn reset(&mut self) -> Result<(), Error>;

    /// Current time.
    fn t(&self) -> f64;

    /// Steps `n` times by `dt`, calling `observe` after every step.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first step error.
    fn run(&mut self, dt: f64, n: usize, mut observe: impl FnMut(&Self)) -> Result<(), Error>
    where
        Self: Sized,
    {
        for _ in 0..n {
            self.step(dt)?;
            observe(self);
        }
        Ok(())
    }
}
