//! Transient analysis.

use log::{info, warn};

use super::biasing::{Simulation, Statistics};
use super::config::{BiasingConfig, TimeConfig};
use super::state::{Domain, InitMode};
use crate::circuit::{Circuit, VariableMap};
use crate::error::{EngineError, Result};
use crate::integration::IntegrationMethod;

/// Time-domain simulation of a circuit.
#[derive(Debug)]
pub struct Transient {
    simulation: Simulation,
    config: TimeConfig,
    /// Resolved initial conditions (unknown index, value)
    initial_conditions: Vec<(usize, f64)>,
}

impl Transient {
    /// Bind `circuit` for a transient run.
    pub fn new(circuit: Circuit, biasing: BiasingConfig, config: TimeConfig) -> Result<Self> {
        config.validate()?;
        let simulation = Simulation::new(circuit, biasing)?;
        let initial_conditions = config
            .initial_conditions
            .iter()
            .map(|(name, value)| Ok((simulation.variables().index(name)?, *value)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            simulation,
            config,
            initial_conditions,
        })
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn config(&self) -> &TimeConfig {
        &self.config
    }

    /// Run from start to stop, recording every accepted time point.
    pub fn run(&mut self) -> Result<TransientResult> {
        let mut result = TransientResult::new(self.simulation.variables().clone());
        self.run_with(|time, solution| result.push(time, solution))?;
        result.statistics = self.simulation.statistics();
        Ok(result)
    }

    /// Run from start to stop, handing every accepted time point to `observer`.
    pub fn run_with(&mut self, mut observer: impl FnMut(f64, &[f64])) -> Result<()> {
        let config = &self.config;
        let sim = &mut self.simulation;
        let params = config.integration_parameters(&sim.config);
        let min_step = params.min_step;
        let mut method = IntegrationMethod::new(config.method, params)?;

        for behavior in &mut sim.behaviors {
            if let Some(reactive) = behavior.as_integrate() {
                reactive.create_states(&mut method);
            }
        }
        method.initialize(
            sim.variables.size() + 1,
            config.start,
            config.stop,
            config.initial_step(),
        );
        method.set_truncation_nodes(sim.variables.voltage_indices());
        for &time in &config.extra_breakpoints {
            method.schedule_breakpoint(time);
        }

        info!(
            "transient analysis from {:e} to {:e} ({:?}, max order {})",
            config.start, config.stop, config.method, config.max_order
        );

        // Starting point
        if config.use_ic {
            let state = &mut sim.state;
            state.solution.iter_mut().for_each(|v| *v = 0.0);
            for &(index, value) in &self.initial_conditions {
                state.solution[index] = value;
            }
            state.domain = Domain::Time;
            state.use_dc = false;
            state.use_ic = true;
            sim.iterate(config.tran_max_iterations, Some(&mut method))?;
        } else {
            sim.operating_point()?;
        }

        let use_ic = config.use_ic;
        for behavior in &mut sim.behaviors {
            if let Some(reactive) = behavior.as_integrate() {
                reactive.initialize_states(&sim.state.solution, use_ic, &mut method);
            }
        }
        method.initialize_states(&sim.state.solution);
        for behavior in &mut sim.behaviors {
            if let Some(reactive) = behavior.as_integrate() {
                reactive.accept(&sim.state.solution, &mut method);
            }
        }
        observer(config.start, &sim.state.solution);

        let state = &mut sim.state;
        state.domain = Domain::Time;
        state.use_dc = false;
        state.use_ic = false;

        while !method.is_finished() {
            let mut delta = method.continue_step();
            loop {
                delta = method.probe(delta)?;
                sim.state.solution.copy_from_slice(method.prediction());
                sim.state.init = InitMode::Transient;
                sim.statistics.time_points += 1;

                if !sim.iterate(config.tran_max_iterations, Some(&mut method))? {
                    sim.statistics.rejected += 1;
                    delta = method.non_convergence();
                    warn!(
                        "no convergence after t = {:e}, step cut to {:e}",
                        method.base_time(),
                        delta
                    );
                    check_step(&method, delta, min_step)?;
                    continue;
                }

                method.store_solution(&sim.state.solution);
                if method.evaluate() {
                    break;
                }
                sim.statistics.rejected += 1;
                delta = method.next_delta();
                check_step(&method, delta, min_step)?;
            }

            method.accept();
            sim.statistics.accepted += 1;
            for behavior in &mut sim.behaviors {
                if let Some(reactive) = behavior.as_integrate() {
                    reactive.accept(&sim.state.solution, &mut method);
                }
            }
            observer(method.base_time(), &sim.state.solution);
        }

        info!(
            "transient analysis done: {} points accepted, {} rejected, {} iterations",
            sim.statistics.accepted, sim.statistics.rejected, sim.statistics.iterations
        );
        Ok(())
    }
}

fn check_step(method: &IntegrationMethod, delta: f64, min_step: f64) -> Result<()> {
    if delta < min_step {
        return Err(EngineError::TimestepTooSmall {
            time: method.base_time(),
            delta,
        });
    }
    Ok(())
}

/// Accepted time points of a transient run.
#[derive(Debug, Clone)]
pub struct TransientResult {
    variables: VariableMap,
    times: Vec<f64>,
    solutions: Vec<Vec<f64>>,
    statistics: Statistics,
}

impl TransientResult {
    fn new(variables: VariableMap) -> Self {
        Self {
            variables,
            times: Vec::new(),
            solutions: Vec::new(),
            statistics: Statistics::default(),
        }
    }

    fn push(&mut self, time: f64, solution: &[f64]) {
        self.times.push(time);
        self.solutions.push(solution.to_vec());
    }

    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    /// Time of every accepted point, increasing.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Solution vector at point `index`.
    pub fn solution(&self, index: usize) -> &[f64] {
        &self.solutions[index]
    }

    /// Waveform of unknown `name` over every accepted point.
    pub fn waveform(&self, name: &str) -> Result<Vec<f64>> {
        let index = self.variables.index(name)?;
        Ok(self.solutions.iter().map(|s| s[index]).collect())
    }

    /// Value of unknown `name` at `time`, linearly interpolated between points.
    pub fn value_at(&self, name: &str, time: f64) -> Result<f64> {
        let index = self.variables.index(name)?;
        let pos = self.times.partition_point(|&t| t < time);
        if pos == 0 {
            return Ok(self.solutions.first().map_or(0.0, |s| s[index]));
        }
        if pos == self.times.len() {
            return Ok(self.solutions[pos - 1][index]);
        }
        let (t0, t1) = (self.times[pos - 1], self.times[pos]);
        let (v0, v1) = (self.solutions[pos - 1][index], self.solutions[pos][index]);
        if t1 == t0 {
            return Ok(v1);
        }
        Ok(v0 + (v1 - v0) * (time - t0) / (t1 - t0))
    }
}
