//! Small-signal AC analysis.

use std::f64::consts::PI;

use log::{debug, info};
use num_complex::Complex64;

use super::behavior::FrequencyContext;
use super::biasing::Simulation;
use super::config::{BiasingConfig, FrequencyConfig};
use crate::circuit::{Circuit, VariableMap};
use crate::error::Result;
use crate::solver::{ComplexSolver, Markowitz};

/// Frequency sweep of the circuit linearized around its operating point.
#[derive(Debug)]
pub struct AcAnalysis {
    simulation: Simulation,
    config: FrequencyConfig,
}

impl AcAnalysis {
    /// Bind `circuit` for a frequency sweep.
    pub fn new(circuit: Circuit, biasing: BiasingConfig, config: FrequencyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            simulation: Simulation::new(circuit, biasing)?,
            config,
        })
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Solve the operating point, then the small-signal system at every frequency.
    pub fn run(&mut self) -> Result<AcResult> {
        let sim = &mut self.simulation;
        sim.operating_point()?;

        let biasing = &sim.config;
        let mut solver =
            ComplexSolver::with_strategy(Markowitz::new(biasing.pivot_rel_tol, biasing.pivot_abs_tol));
        for behavior in &mut sim.behaviors {
            if let Some(small_signal) = behavior.as_frequency() {
                small_signal.bind_frequency(&mut solver);
            }
        }
        let size = sim.variables.size();
        solver.ensure_size(size);
        solver.preorder_mna();

        info!(
            "AC analysis over {} frequencies",
            self.config.frequencies.len()
        );
        let mut solutions = Vec::with_capacity(self.config.frequencies.len());
        for &frequency in &self.config.frequencies {
            solver.clear();
            {
                let mut ctx = FrequencyContext {
                    solver: &mut solver,
                    omega: 2.0 * PI * frequency,
                };
                for behavior in &mut sim.behaviors {
                    if let Some(small_signal) = behavior.as_frequency() {
                        small_signal.load_frequency(&mut ctx);
                    }
                }
            }
            // Reuses the previous pivot order while its pivots stay acceptable
            solver.order_and_factor()?;
            debug!("solved {:e} Hz ({} fill-ins)", frequency, solver.fillins());
            let mut solution = vec![Complex64::new(0.0, 0.0); size + 1];
            solver.solve(&mut solution)?;
            solutions.push(solution);
        }

        Ok(AcResult {
            variables: sim.variables.clone(),
            frequencies: self.config.frequencies.clone(),
            solutions,
        })
    }
}

/// Phasors of every unknown at every frequency.
#[derive(Debug, Clone)]
pub struct AcResult {
    variables: VariableMap,
    frequencies: Vec<f64>,
    solutions: Vec<Vec<Complex64>>,
}

impl AcResult {
    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Solution vector at frequency point `index`.
    pub fn solution(&self, index: usize) -> &[Complex64] {
        &self.solutions[index]
    }

    /// Phasor of unknown `name` at every frequency.
    pub fn phasor(&self, name: &str) -> Result<Vec<Complex64>> {
        let index = self.variables.index(name)?;
        Ok(self.solutions.iter().map(|s| s[index]).collect())
    }

    /// Magnitude of unknown `name` in decibels.
    pub fn magnitude_db(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self
            .phasor(name)?
            .into_iter()
            .map(|v| 20.0 * v.norm().log10())
            .collect())
    }

    /// Phase of unknown `name` in degrees.
    pub fn phase_deg(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self
            .phasor(name)?
            .into_iter()
            .map(|v| v.arg().to_degrees())
            .collect())
    }
}
