use nalgebra::DVector;

/// A first-order system `dy/dt = f(t, y)`.
///
/// The integrator calls [`OdeSystem::derivative`] at every trial time. The
/// receiver is `&mut self` so implementations may advance auxiliary state
/// (for example, discrete subsystems catching up to `t`) before computing
/// the derivative.
pub trait OdeSystem {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes `f(t, y)` into `dydt`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the derivative cannot be computed.
    fn derivative(
        &mut self,
        t: f64,
        y: &DVector<f64>,
        dydt: &mut DVector<f64>,
    ) -> Result<(), Self::Error>;
}

/// Adapts a closure into an [`OdeSystem`].
pub struct FnSystem<F>(F);

impl<F> FnSystem<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F, E> OdeSystem for FnSystem<F>
where
    F: FnMut(f64, &DVector<f64>, &mut DVector<f64>) -> Result<(), E>,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    fn derivative(
        &mut self,
        t: f64,
        y: &DVector<f64>,
        dydt: &mut DVector<f64>,
    ) -> Result<(), Self::Error> {
        (self.0)(t, y, dydt)
    }
}
