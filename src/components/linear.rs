//! Linear passive components: Resistor, Capacitor, Inductor.

use num_complex::Complex64;

use super::{require_positive, BranchStamp, ConductanceStamp};
use crate::error::Result;
use crate::integration::{IntegrationMethod, StateDerivative};
use crate::simulation::{
    Behavior, BindContext, Frequency, FrequencyContext, Integrate, LoadContext, Stamps,
};
use crate::solver::{ComplexSolver, ElementId, RhsId};

/// A resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    name: String,
    nodes: [String; 2],
    resistance: f64,
    indices: [usize; 2],
    stamp: ConductanceStamp,
    ac_stamp: ConductanceStamp,
}

impl Resistor {
    /// Create a resistor between `pos` and `neg`.
    pub fn new(name: &str, pos: &str, neg: &str, resistance: f64) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            nodes: [pos.to_string(), neg.to_string()],
            resistance: require_positive(name, "resistance", resistance)?,
            indices: [0; 2],
            stamp: ConductanceStamp::default(),
            ac_stamp: ConductanceStamp::default(),
        })
    }

    pub fn resistance(&self) -> f64 {
        self.resistance
    }

    /// Get the conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }

    /// Current from the positive to the negative node for a given solution.
    pub fn current(&self, solution: &[f64]) -> f64 {
        (solution[self.indices[0]] - solution[self.indices[1]]) * self.conductance()
    }
}

impl Stamps for Resistor {
    fn bind(&mut self, ctx: &mut BindContext<'_>) -> Result<()> {
        self.indices = [ctx.node(&self.nodes[0]), ctx.node(&self.nodes[1])];
        self.stamp = ConductanceStamp::new(|r, c| ctx.element(r, c), self.indices[0], self.indices[1]);
        Ok(())
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) {
        self.stamp.load(ctx.solver, self.conductance());
    }
}

impl Behavior for Resistor {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_frequency(&mut self) -> Option<&mut dyn Frequency> {
        Some(self)
    }
}

impl Frequency for Resistor {
    fn bind_frequency(&mut self, solver: &mut ComplexSolver) {
        self.ac_stamp =
            ConductanceStamp::new(|r, c| solver.get_element(r, c), self.indices[0], self.indices[1]);
    }

    fn load_frequency(&mut self, ctx: &mut FrequencyContext<'_>) {
        self.ac_stamp
            .load(ctx.solver, Complex64::new(self.conductance(), 0.0));
    }
}

/// A capacitor.
///
/// Open in DC. In the time domain the stored charge `q = C v` is integrated
/// by the active method, which turns it into a conductance in parallel with
/// a current source.
#[derive(Debug, Clone)]
pub struct Capacitor {
    name: String,
    nodes: [String; 2],
    capacitance: f64,
    initial_condition: Option<f64>,
    indices: [usize; 2],
    stamp: ConductanceStamp,
    rhs: [RhsId; 2],
    ac_stamp: ConductanceStamp,
    charge: Option<StateDerivative>,
}

impl Capacitor {
    /// Create a capacitor between `pos` and `neg`.
    pub fn new(name: &str, pos: &str, neg: &str, capacitance: f64) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            nodes: [pos.to_string(), neg.to_string()],
            capacitance: require_positive(name, "capacitance", capacitance)?,
            initial_condition: None,
            indices: [0; 2],
            stamp: ConductanceStamp::default(),
            rhs: [RhsId::TRASH; 2],
            ac_stamp: ConductanceStamp::default(),
            charge: None,
        })
    }

    /// Voltage to start from when the analysis uses initial conditions.
    pub fn with_initial_condition(mut self, voltage: f64) -> Self {
        self.initial_condition = Some(voltage);
        self
    }

    pub fn capacitance(&self) -> f64 {
        self.capacitance
    }
}

impl Stamps for Capacitor {
    fn bind(&mut self, ctx: &mut BindContext<'_>) -> Result<()> {
        let [pos, neg] = [ctx.node(&self.nodes[0]), ctx.node(&self.nodes[1])];
        self.indices = [pos, neg];
        self.stamp = ConductanceStamp::new(|r, c| ctx.element(r, c), pos, neg);
        self.rhs = [ctx.rhs(pos), ctx.rhs(neg)];
        Ok(())
    }

    fn load(&mut self, _ctx: &mut LoadContext<'_>) {}
}

impl Behavior for Capacitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_integrate(&mut self) -> Option<&mut dyn Integrate> {
        Some(self)
    }

    fn as_frequency(&mut self) -> Option<&mut dyn Frequency> {
        Some(self)
    }
}

impl Integrate for Capacitor {
    fn create_states(&mut self, method: &mut IntegrationMethod) {
        self.charge = Some(method.create_derivative(true));
    }

    fn initialize_states(&mut self, solution: &[f64], use_ic: bool, method: &mut IntegrationMethod) {
        let Some(charge) = self.charge else {
            return;
        };
        let voltage = match self.initial_condition {
            Some(ic) if use_ic => ic,
            _ => solution[self.indices[0]] - solution[self.indices[1]],
        };
        method.set_value(charge, self.capacitance * voltage);
    }

    fn load_transient(&mut self, ctx: &mut LoadContext<'_>, method: &mut IntegrationMethod) {
        let Some(charge) = self.charge else {
            return;
        };
        let voltage = ctx.voltage(self.indices[0], self.indices[1]);
        method.set_value(charge, self.capacitance * voltage);
        method.integrate(charge);
        let info = method.contributions_at(charge, self.capacitance, voltage);

        self.stamp.load(ctx.solver, info.jacobian);
        ctx.add_rhs(self.rhs[0], -info.rhs);
        ctx.add_rhs(self.rhs[1], info.rhs);
    }
}

impl Frequency for Capacitor {
    fn bind_frequency(&mut self, solver: &mut ComplexSolver) {
        self.ac_stamp =
            ConductanceStamp::new(|r, c| solver.get_element(r, c), self.indices[0], self.indices[1]);
    }

    fn load_frequency(&mut self, ctx: &mut FrequencyContext<'_>) {
        self.ac_stamp
            .load(ctx.solver, Complex64::new(0.0, ctx.omega * self.capacitance));
    }
}

/// An inductor.
///
/// Adds a branch current unknown. Short in DC; in the time domain the flux
/// `phi = L i` is integrated by the active method.
#[derive(Debug, Clone)]
pub struct Inductor {
    name: String,
    nodes: [String; 2],
    inductance: f64,
    initial_condition: Option<f64>,
    branch: usize,
    stamp: BranchStamp,
    branch_branch: ElementId,
    branch_rhs: RhsId,
    ac_stamp: BranchStamp,
    ac_branch_branch: ElementId,
    indices: [usize; 2],
    flux: Option<StateDerivative>,
}

impl Inductor {
    /// Create an inductor between `pos` and `neg`.
    pub fn new(name: &str, pos: &str, neg: &str, inductance: f64) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            nodes: [pos.to_string(), neg.to_string()],
            inductance: require_positive(name, "inductance", inductance)?,
            initial_condition: None,
            branch: 0,
            stamp: BranchStamp::default(),
            branch_branch: ElementId::TRASH,
            branch_rhs: RhsId::TRASH,
            ac_stamp: BranchStamp::default(),
            ac_branch_branch: ElementId::TRASH,
            indices: [0; 2],
            flux: None,
        })
    }

    /// Current to start from when the analysis uses initial conditions.
    pub fn with_initial_condition(mut self, current: f64) -> Self {
        self.initial_condition = Some(current);
        self
    }

    pub fn inductance(&self) -> f64 {
        self.inductance
    }

    /// Index of the branch current unknown.
    pub fn branch(&self) -> usize {
        self.branch
    }
}

impl Stamps for Inductor {
    fn bind(&mut self, ctx: &mut BindContext<'_>) -> Result<()> {
        let [pos, neg] = [ctx.node(&self.nodes[0]), ctx.node(&self.nodes[1])];
        let branch = ctx.branch(&self.name)?;
        self.indices = [pos, neg];
        self.branch = branch;
        self.stamp = BranchStamp::new(|r, c| ctx.element(r, c), pos, neg, branch);
        self.branch_branch = ctx.element(branch, branch);
        self.branch_rhs = ctx.rhs(branch);
        Ok(())
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) {
        self.stamp.load(ctx.solver);
    }
}

impl Behavior for Inductor {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_integrate(&mut self) -> Option<&mut dyn Integrate> {
        Some(self)
    }

    fn as_frequency(&mut self) -> Option<&mut dyn Frequency> {
        Some(self)
    }
}

impl Integrate for Inductor {
    fn create_states(&mut self, method: &mut IntegrationMethod) {
        self.flux = Some(method.create_derivative(true));
    }

    fn initialize_states(&mut self, solution: &[f64], use_ic: bool, method: &mut IntegrationMethod) {
        let Some(flux) = self.flux else {
            return;
        };
        let current = match self.initial_condition {
            Some(ic) if use_ic => ic,
            _ => solution[self.branch],
        };
        method.set_value(flux, self.inductance * current);
    }

    fn load_transient(&mut self, ctx: &mut LoadContext<'_>, method: &mut IntegrationMethod) {
        let Some(flux) = self.flux else {
            return;
        };
        let current = ctx.solution[self.branch];
        method.set_value(flux, self.inductance * current);
        method.integrate(flux);
        let info = method.contributions_at(flux, self.inductance, current);

        // v(pos) - v(neg) = L di/dt
        ctx.add(self.branch_branch, -info.jacobian);
        ctx.add_rhs(self.branch_rhs, info.rhs);
    }
}

impl Frequency for Inductor {
    fn bind_frequency(&mut self, solver: &mut ComplexSolver) {
        self.ac_stamp = BranchStamp::new(
            |r, c| solver.get_element(r, c),
            self.indices[0],
            self.indices[1],
            self.branch,
        );
        self.ac_branch_branch = solver.get_element(self.branch, self.branch);
    }

    fn load_frequency(&mut self, ctx: &mut FrequencyContext<'_>) {
        self.ac_stamp.load(ctx.solver);
        ctx.solver.add(
            self.ac_branch_branch,
            Complex64::new(0.0, -ctx.omega * self.inductance),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_resistor_conductance() {
        let r = Resistor::new("R1", "1", "0", 1000.0).unwrap();
        assert!((r.conductance() - 0.001).abs() < 1e-10);
    }

    #[test]
    fn test_rejects_non_positive_values() {
        assert!(matches!(
            Resistor::new("R1", "a", "0", 0.0),
            Err(EngineError::InvalidParameter { .. })
        ));
        assert!(Capacitor::new("C1", "a", "0", -1e-6).is_err());
        assert!(Inductor::new("L1", "a", "0", f64::NAN).is_err());
    }
}
