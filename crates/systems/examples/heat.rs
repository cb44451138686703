//! Heat flow along a rod, warmed at one end by a pulsing source.
//!
//! The rod is a continuous system; the source is a discrete system that
//! toggles once per second. The rod reads the source through the coupling.
//!
//! ```text
//! cargo run --example heat
//! RUST_LOG=debug cargo run --example heat
//! ```

use std::{error::Error, sync::Arc};

use gds_core::Domain;
use gds_systems::{
    Condition, Constraints, Continuous, CoupledSystem, Discrete, EvolvingSystem, Steppable,
};
use tracing_subscriber::EnvFilter;

const CELLS: usize = 10;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let rod_domain = Arc::new(Domain::new(0..CELLS)?);
    let mut rod = EvolvingSystem::new(rod_domain);
    rod.set_evolution(Continuous::new(|_, view, dy| {
        let u = view.value();
        let source = view.sibling("source").map_or(0.0, |s| s[0]);
        for i in 1..u.len() - 1 {
            dy[i] = u[i - 1] - 2.0 * u[i] + u[i + 1];
        }
        dy[0] = source - u[0] + (u[1] - u[0]);
    }))?;
    rod.set_initial(0.0, vec![0.0; CELLS])?;
    rod.set_constraints(
        Constraints::new().dirichlet(Condition::from_fn(|&i: &usize| {
            (i == CELLS - 1).then_some(0.0)
        })),
    )?;

    let mut source = EvolvingSystem::new(Arc::new(Domain::new([0_usize])?));
    source.set_evolution(Discrete::new(|view, next| next[0] = 1.0 - view.value()[0]))?;
    source.set_initial(0.0, vec![1.0])?;

    let mut coupled = CoupledSystem::new([("rod", rod), ("source", source)])?;
    println!("integrating with {:?}", coupled.method());

    coupled.run(0.5, 12, |c| {
        let rod = c.value("rod").unwrap_or_default();
        let profile: Vec<String> = rod.iter().map(|u| format!("{u:5.3}")).collect();
        println!("t = {:4.1}  [{}]", c.t(), profile.join(" "));
    })?;
    Ok(())
}
