//! Traits components implement to take part in an analysis.
//!
//! A component binds once (resolving node names and fetching matrix element
//! handles) and is then loaded every iteration. Components that store charge
//! or flux also implement [`Integrate`]; components with a small-signal model
//! implement [`Frequency`].

use crate::circuit::VariableMap;
use crate::error::Result;
use crate::integration::IntegrationMethod;
use crate::solver::{ComplexSolver, ElementId, RealSolver, RhsId};

use super::state::{Domain, InitMode};

/// Access to the unknowns and the matrix while binding.
pub struct BindContext<'a> {
    variables: &'a mut VariableMap,
    solver: &'a mut RealSolver,
}

impl<'a> BindContext<'a> {
    pub(crate) fn new(variables: &'a mut VariableMap, solver: &'a mut RealSolver) -> Self {
        Self { variables, solver }
    }

    /// Index of node `name`, registering it on first use.
    pub fn node(&mut self, name: &str) -> usize {
        self.variables.map_node(name)
    }

    /// Register the branch current of component `owner`.
    pub fn branch(&mut self, owner: &str) -> Result<usize> {
        self.variables.create_branch(&format!("{}#branch", owner))
    }

    /// Matrix element handle. Rows or columns on ground give a discarded element.
    pub fn element(&mut self, row: usize, column: usize) -> ElementId {
        self.solver.get_element(row, column)
    }

    /// Right-hand side handle.
    pub fn rhs(&mut self, row: usize) -> RhsId {
        self.solver.get_rhs_element(row)
    }

    pub fn variables(&self) -> &VariableMap {
        self.variables
    }
}

/// Everything a component needs to stamp its contribution.
pub struct LoadContext<'a> {
    pub solver: &'a mut RealSolver,
    /// Latest iterate
    pub solution: &'a [f64],
    pub init: InitMode,
    pub domain: Domain,
    pub use_ic: bool,
    pub source_factor: f64,
    pub gmin: f64,
    /// Simulated time (0 outside the time domain)
    pub time: f64,
}

impl LoadContext<'_> {
    /// Add `value` to a matrix element.
    pub fn add(&mut self, id: ElementId, value: f64) {
        self.solver.add(id, value);
    }

    /// Add `value` to a right-hand side entry.
    pub fn add_rhs(&mut self, id: RhsId, value: f64) {
        self.solver.add_rhs(id, value);
    }

    /// Voltage between two unknowns in the latest iterate.
    pub fn voltage(&self, positive: usize, negative: usize) -> f64 {
        self.solution[positive] - self.solution[negative]
    }
}

/// Inputs of the per-device convergence check.
pub struct ConvergenceContext<'a> {
    pub solution: &'a [f64],
    pub old_solution: &'a [f64],
    pub rel_tol: f64,
    pub abs_tol: f64,
    pub volt_tol: f64,
}

/// Small-signal load inputs.
pub struct FrequencyContext<'a> {
    pub solver: &'a mut ComplexSolver,
    /// Angular frequency (rad/s)
    pub omega: f64,
}

/// Stamping into the real-valued system.
pub trait Stamps {
    /// Resolve nodes and fetch the element handles used by [`load`](Self::load).
    fn bind(&mut self, ctx: &mut BindContext<'_>) -> Result<()>;

    /// Add this component's contribution for the current iterate.
    fn load(&mut self, ctx: &mut LoadContext<'_>);
}

/// A component taking part in a simulation.
pub trait Behavior: Stamps + Send {
    /// Unique component name.
    fn name(&self) -> &str;

    /// Check device-level convergence after an iteration.
    fn is_convergent(&self, _ctx: &ConvergenceContext<'_>) -> bool {
        true
    }

    /// Time-domain capabilities, if any.
    fn as_integrate(&mut self) -> Option<&mut dyn Integrate> {
        None
    }

    /// Small-signal capabilities, if any.
    fn as_frequency(&mut self) -> Option<&mut dyn Frequency> {
        None
    }
}

/// Time-domain behavior.
///
/// Every method has an empty default so that sources only need to provide
/// [`accept`](Self::accept) for scheduling their breakpoints.
pub trait Integrate {
    /// Allocate derivative states in the integration method.
    fn create_states(&mut self, _method: &mut IntegrationMethod) {}

    /// Derive the initial state values from the starting solution.
    fn initialize_states(&mut self, _solution: &[f64], _use_ic: bool, _method: &mut IntegrationMethod) {}

    /// Stamp the discretized reactive contribution. Called after [`Stamps::load`].
    fn load_transient(&mut self, _ctx: &mut LoadContext<'_>, _method: &mut IntegrationMethod) {}

    /// Called once per accepted time point, including the starting point.
    fn accept(&mut self, _solution: &[f64], _method: &mut IntegrationMethod) {}
}

/// Small-signal behavior around the operating point.
pub trait Frequency {
    /// Fetch the element handles of the complex system.
    fn bind_frequency(&mut self, solver: &mut ComplexSolver);

    /// Stamp the admittance at the current frequency.
    fn load_frequency(&mut self, ctx: &mut FrequencyContext<'_>);
}
