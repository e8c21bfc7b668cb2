//! Biasing simulation: binding, state and the DC operating point.

use log::{debug, info, warn};

use super::behavior::{BindContext, Behavior};
use super::config::BiasingConfig;
use super::state::{BiasingState, Domain, InitMode};
use crate::circuit::{Circuit, VariableKind, VariableMap};
use crate::error::{EngineError, Result};
use crate::solver::{ElementId, Markowitz, RealSolver, RhsId};

/// Conductance tying a nodeset to its target voltage.
pub(crate) const NODESET_CONDUCTANCE: f64 = 1e10;

/// Counters collected over the lifetime of a simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Newton-Raphson iterations
    pub iterations: usize,
    /// Full reorderings of the matrix
    pub reorders: usize,
    /// Time points attempted
    pub time_points: usize,
    /// Time points accepted
    pub accepted: usize,
    /// Time points rejected (truncation error or no convergence)
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Nodeset {
    pub value: f64,
    pub diagonal: ElementId,
    pub rhs: RhsId,
}

/// A bound circuit together with the state of its biasing iteration.
///
/// Transient and AC analyses build on top of this; on its own it computes
/// the DC operating point.
pub struct Simulation {
    pub(crate) variables: VariableMap,
    pub(crate) behaviors: Vec<Box<dyn Behavior>>,
    pub(crate) state: BiasingState,
    pub(crate) config: BiasingConfig,
    pub(crate) nodesets: Vec<Nodeset>,
    pub(crate) statistics: Statistics,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("unknowns", &self.variables.size())
            .field("components", &self.behaviors.len())
            .field("statistics", &self.statistics)
            .finish()
    }
}

impl Simulation {
    /// Bind `circuit` and prepare its biasing state.
    pub fn new(circuit: Circuit, config: BiasingConfig) -> Result<Self> {
        config.validate()?;
        if circuit.is_empty() {
            return Err(EngineError::config("circuit has no components"));
        }

        let mut solver =
            RealSolver::with_strategy(Markowitz::new(config.pivot_rel_tol, config.pivot_abs_tol));
        let mut variables = VariableMap::new();
        let mut behaviors = circuit.into_behaviors();
        {
            let mut ctx = BindContext::new(&mut variables, &mut solver);
            for behavior in &mut behaviors {
                behavior.bind(&mut ctx)?;
            }
        }

        let mut nodesets = Vec::with_capacity(config.nodesets.len());
        for (name, value) in &config.nodesets {
            let index = variables.index(name)?;
            if index == 0 {
                continue;
            }
            nodesets.push(Nodeset {
                value: *value,
                diagonal: solver.get_element(index, index),
                rhs: solver.get_rhs_element(index),
            });
        }

        let size = variables.size();
        solver.ensure_size(size);
        let mut state = BiasingState::new(solver, size);
        state.gmin = config.gmin;
        state.had_node_set = !nodesets.is_empty();

        debug!(
            "bound {} components over {} unknowns",
            behaviors.len(),
            size
        );

        Ok(Self {
            variables,
            behaviors,
            state,
            config,
            nodesets,
            statistics: Statistics::default(),
        })
    }

    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    pub fn config(&self) -> &BiasingConfig {
        &self.config
    }

    pub fn state(&self) -> &BiasingState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut BiasingState {
        &mut self.state
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    /// Latest solution, indexed by unknown (index 0 is ground).
    pub fn solution(&self) -> &[f64] {
        &self.state.solution
    }

    /// Value of the unknown called `name` in the latest solution.
    pub fn value(&self, name: &str) -> Result<f64> {
        Ok(self.state.solution[self.variables.index(name)?])
    }

    /// Compute the DC operating point.
    ///
    /// Tries a plain Newton-Raphson iteration first, then Gmin stepping,
    /// then source stepping. A singular matrix during an attempt counts as
    /// that attempt failing.
    pub fn operating_point(&mut self) -> Result<()> {
        let max_iterations = self.config.dc_max_iterations;
        let start = self.statistics.iterations;
        let state = &mut self.state;
        state.domain = Domain::Dc;
        state.use_dc = true;
        state.use_ic = false;
        state.source_factor = 1.0;
        state.diagonal_gmin = 0.0;
        state.init = InitMode::Junction;
        state.solution.iter_mut().for_each(|v| *v = 0.0);

        if self.attempt(max_iterations)? {
            debug!(
                "operating point found in {} iterations",
                self.statistics.iterations - start
            );
            return Ok(());
        }
        if self.config.gmin_steps > 0 && self.gmin_stepping(max_iterations)? {
            return Ok(());
        }
        if self.config.source_steps > 0 && self.source_stepping(max_iterations)? {
            return Ok(());
        }
        Err(EngineError::convergence_failure(
            "operating point",
            self.statistics.iterations - start,
        ))
    }

    fn attempt(&mut self, max_iterations: usize) -> Result<bool> {
        match self.iterate(max_iterations, None) {
            Ok(converged) => Ok(converged),
            Err(e) if e.is_singular() => {
                warn!("{}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn gmin_stepping(&mut self, max_iterations: usize) -> Result<bool> {
        info!("direct operating point failed, trying Gmin stepping");
        let steps = self.config.gmin_steps;
        let base = if self.config.gmin > 0.0 { self.config.gmin } else { 1e-12 };
        let mut diagonal = base * 10f64.powi(steps as i32);

        self.state.init = InitMode::Junction;
        for _ in 0..=steps {
            self.state.diagonal_gmin = diagonal;
            self.state.is_convergent = false;
            if !self.attempt(max_iterations)? {
                warn!("Gmin stepping failed at diagonal Gmin {:e}", diagonal);
                self.state.diagonal_gmin = 0.0;
                return Ok(false);
            }
            diagonal /= 10.0;
            self.state.init = InitMode::Float;
        }
        self.state.diagonal_gmin = 0.0;
        self.attempt(max_iterations)
    }

    fn source_stepping(&mut self, max_iterations: usize) -> Result<bool> {
        info!("trying source stepping");
        let steps = self.config.source_steps;
        self.state.diagonal_gmin = 0.0;
        self.state.init = InitMode::Junction;
        for i in 0..=steps {
            self.state.source_factor = i as f64 / steps as f64;
            if !self.attempt(max_iterations)? {
                warn!(
                    "source stepping failed at factor {:.3}",
                    self.state.source_factor
                );
                self.state.source_factor = 1.0;
                return Ok(false);
            }
            self.state.init = InitMode::Float;
        }
        self.state.source_factor = 1.0;
        Ok(true)
    }

    /// Snapshot of the current solution with the names needed to read it.
    pub fn result(&self) -> OpResult {
        OpResult {
            variables: self.variables.clone(),
            solution: self.state.solution.clone(),
            iterations: self.statistics.iterations,
        }
    }
}

/// Outcome of an operating point analysis.
#[derive(Debug, Clone)]
pub struct OpResult {
    pub variables: VariableMap,
    pub solution: Vec<f64>,
    pub iterations: usize,
}

impl OpResult {
    /// Voltage of node `name`.
    pub fn voltage(&self, name: &str) -> Result<f64> {
        let index = self.variables.index(name)?;
        match self.variables.kind(index) {
            Some(VariableKind::Voltage) => Ok(self.solution[index]),
            _ => Err(EngineError::UnknownNode {
                name: name.to_string(),
            }),
        }
    }

    /// Branch current of component `name`.
    pub fn current(&self, name: &str) -> Result<f64> {
        let index = self.variables.index(&format!("{}#branch", name))?;
        Ok(self.solution[index])
    }
}

/// Compute the operating point of `circuit`.
pub fn operating_point(circuit: Circuit, config: BiasingConfig) -> Result<OpResult> {
    let mut simulation = Simulation::new(circuit, config)?;
    simulation.operating_point()?;
    Ok(simulation.result())
}
