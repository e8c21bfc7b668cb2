//! Shared state of the biasing (nonlinear DC and transient) iteration.

use std::fmt;

use crate::solver::RealSolver;

/// Initialization phase of the Newton-Raphson iteration.
///
/// Devices use it to pick their starting point: junctions start from a
/// critical voltage in [`Junction`](Self::Junction), keep it during
/// [`Fix`](Self::Fix) and follow the solution in [`Float`](Self::Float).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMode {
    None,
    Junction,
    Fix,
    Float,
    /// First iteration of a time point
    Transient,
    /// Small-signal analysis; not valid for the biasing iteration
    SmallSignal,
}

impl fmt::Display for InitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitMode::None => "None",
            InitMode::Junction => "InitJunction",
            InitMode::Fix => "InitFix",
            InitMode::Float => "InitFloat",
            InitMode::Transient => "InitTransient",
            InitMode::SmallSignal => "SmallSignal",
        };
        f.write_str(name)
    }
}

/// Whether the circuit is solved at rest or along the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Dc,
    Time,
}

/// Everything the iteration engine reads and writes between iterations.
#[derive(Debug)]
pub struct BiasingState {
    pub solver: RealSolver,
    /// Latest solution, indexed by unknown (index 0 is ground)
    pub solution: Vec<f64>,
    /// Solution of the previous iteration
    pub old_solution: Vec<f64>,
    pub init: InitMode,
    pub domain: Domain,
    /// Iterating towards a DC operating point
    pub use_dc: bool,
    /// Nodesets are present
    pub had_node_set: bool,
    /// Start from user initial conditions
    pub use_ic: bool,
    pub did_preorder: bool,
    /// Force a full reorder on the next factorization
    pub should_reorder: bool,
    /// Conductance added to every diagonal during Gmin stepping
    pub diagonal_gmin: f64,
    /// Junction conductance devices add
    pub gmin: f64,
    /// Scale applied to every independent source
    pub source_factor: f64,
    pub is_convergent: bool,
}

impl BiasingState {
    /// Create the state for `size` unknowns (ground excluded).
    pub fn new(solver: RealSolver, size: usize) -> Self {
        Self {
            solver,
            solution: vec![0.0; size + 1],
            old_solution: vec![0.0; size + 1],
            init: InitMode::Junction,
            domain: Domain::Dc,
            use_dc: true,
            had_node_set: false,
            use_ic: false,
            did_preorder: false,
            should_reorder: true,
            diagonal_gmin: 0.0,
            gmin: 1e-12,
            source_factor: 1.0,
            is_convergent: false,
        }
    }

    /// Number of unknowns, excluding ground.
    pub fn size(&self) -> usize {
        self.solution.len() - 1
    }

    /// Remember the current solution as the previous iterate.
    pub fn store_solution(&mut self) {
        self.old_solution.copy_from_slice(&self.solution);
    }
}
