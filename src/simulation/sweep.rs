//! Independent simulations run in parallel.
//!
//! Each point builds its own circuit and simulation on a rayon worker, so no
//! state is shared between points. Results come back in input order.

use rayon::prelude::*;

use super::biasing::{OpResult, Simulation};
use super::config::{BiasingConfig, TimeConfig};
use super::transient::{Transient, TransientResult};
use crate::circuit::Circuit;
use crate::error::Result;

/// Run `job` for every point on the rayon thread pool.
pub fn run_parallel<P, R, F>(points: &[P], job: F) -> Vec<Result<R>>
where
    P: Sync,
    R: Send,
    F: Fn(&P) -> Result<R> + Sync + Send,
{
    log::info!(
        "running {} simulations on {} threads",
        points.len(),
        rayon::current_num_threads()
    );
    points.par_iter().map(|point| job(point)).collect()
}

/// Operating point of the circuit `build` returns for every point.
pub fn sweep_operating_points<P, F>(
    points: &[P],
    config: &BiasingConfig,
    build: F,
) -> Vec<Result<OpResult>>
where
    P: Sync,
    F: Fn(&P) -> Result<Circuit> + Sync + Send,
{
    run_parallel(points, |point| {
        let mut simulation = Simulation::new(build(point)?, config.clone())?;
        simulation.operating_point()?;
        Ok(simulation.result())
    })
}

/// Transient run of the circuit `build` returns for every point.
pub fn sweep_transients<P, F>(
    points: &[P],
    biasing: &BiasingConfig,
    time: &TimeConfig,
    build: F,
) -> Vec<Result<TransientResult>>
where
    P: Sync,
    F: Fn(&P) -> Result<Circuit> + Sync + Send,
{
    run_parallel(points, |point| {
        Transient::new(build(point)?, biasing.clone(), time.clone())?.run()
    })
}
