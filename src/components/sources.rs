//! Voltage and current sources.

use num_complex::Complex64;

use super::waveform::Waveform;
use super::BranchStamp;
use crate::error::{EngineError, Result};
use crate::integration::IntegrationMethod;
use crate::simulation::{
    Behavior, BindContext, Frequency, FrequencyContext, Integrate, LoadContext, Stamps,
};
use crate::solver::{ComplexSolver, RhsId};

/// Source value shared by voltage and current sources.
#[derive(Debug, Clone)]
struct Excitation {
    dc: f64,
    waveform: Option<Waveform>,
    ac: Complex64,
}

impl Excitation {
    fn new(dc: f64) -> Self {
        Self {
            dc,
            waveform: None,
            ac: Complex64::new(0.0, 0.0),
        }
    }

    /// Value at the point being loaded, scaled by the source stepping factor.
    fn value(&self, ctx: &LoadContext<'_>) -> f64 {
        let value = match &self.waveform {
            Some(waveform) => waveform.value(ctx.time),
            None => self.dc,
        };
        value * ctx.source_factor
    }

    fn schedule_next(&self, method: &mut IntegrationMethod) {
        if let Some(waveform) = &self.waveform {
            let after = method.base_time() + method.breakpoints().min_spacing();
            if let Some(time) = waveform.next_breakpoint(after) {
                method.schedule_breakpoint(time);
            }
        }
    }
}

fn check_value(component: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::invalid_parameter(component, "value", "must be finite"))
    }
}

/// An independent voltage source.
///
/// Adds a branch current unknown and enforces `V(pos) - V(neg) = value`.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    name: String,
    nodes: [String; 2],
    excitation: Excitation,
    branch: usize,
    indices: [usize; 2],
    stamp: BranchStamp,
    rhs: RhsId,
    ac_stamp: BranchStamp,
    ac_rhs: RhsId,
}

impl VoltageSource {
    /// Create a DC voltage source.
    pub fn new(name: &str, pos: &str, neg: &str, dc: f64) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            nodes: [pos.to_string(), neg.to_string()],
            excitation: Excitation::new(check_value(name, dc)?),
            branch: 0,
            indices: [0; 2],
            stamp: BranchStamp::default(),
            rhs: RhsId::TRASH,
            ac_stamp: BranchStamp::default(),
            ac_rhs: RhsId::TRASH,
        })
    }

    /// Follow `waveform` instead of the DC value.
    pub fn with_waveform(mut self, waveform: Waveform) -> Result<Self> {
        waveform.validate(&self.name)?;
        self.excitation.waveform = Some(waveform);
        Ok(self)
    }

    /// Small-signal excitation (magnitude in volts, phase in degrees).
    pub fn with_ac(mut self, magnitude: f64, phase_deg: f64) -> Self {
        self.excitation.ac = Complex64::from_polar(magnitude, phase_deg.to_radians());
        self
    }

    /// Index of the branch current unknown.
    pub fn branch(&self) -> usize {
        self.branch
    }
}

impl Stamps for VoltageSource {
    fn bind(&mut self, ctx: &mut BindContext<'_>) -> Result<()> {
        let [pos, neg] = [ctx.node(&self.nodes[0]), ctx.node(&self.nodes[1])];
        let branch = ctx.branch(&self.name)?;
        self.indices = [pos, neg];
        self.branch = branch;
        self.stamp = BranchStamp::new(|r, c| ctx.element(r, c), pos, neg, branch);
        self.rhs = ctx.rhs(branch);
        Ok(())
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) {
        self.stamp.load(ctx.solver);
        let value = self.excitation.value(ctx);
        ctx.add_rhs(self.rhs, value);
    }
}

impl Behavior for VoltageSource {
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

impl Integrate for VoltageSource {
    fn accept(&mut self, _solution: &[f64], method: &mut IntegrationMethod) {
        self.excitation.schedule_next(method);
    }
}

impl Frequency for VoltageSource {
    fn bind_frequency(&mut self, solver: &mut ComplexSolver) {
        self.ac_stamp = BranchStamp::new(
            |r, c| solver.get_element(r, c),
            self.indices[0],
            self.indices[1],
            self.branch,
        );
        self.ac_rhs = solver.get_rhs_element(self.branch);
    }

    fn load_frequency(&mut self, ctx: &mut FrequencyContext<'_>) {
        self.ac_stamp.load(ctx.solver);
        ctx.solver.add_rhs(self.ac_rhs, self.excitation.ac);
    }
}

/// An independent current source.
///
/// The current flows from the positive node through the source into the
/// negative node.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    name: String,
    nodes: [String; 2],
    excitation: Excitation,
    rhs: [RhsId; 2],
    indices: [usize; 2],
    ac_rhs: [RhsId; 2],
}

impl CurrentSource {
    /// Create a DC current source.
    pub fn new(name: &str, pos: &str, neg: &str, dc: f64) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            nodes: [pos.to_string(), neg.to_string()],
            excitation: Excitation::new(check_value(name, dc)?),
            rhs: [RhsId::TRASH; 2],
            indices: [0; 2],
            ac_rhs: [RhsId::TRASH; 2],
        })
    }

    /// Follow `waveform` instead of the DC value.
    pub fn with_waveform(mut self, waveform: Waveform) -> Result<Self> {
        waveform.validate(&self.name)?;
        self.excitation.waveform = Some(waveform);
        Ok(self)
    }

    /// Small-signal excitation (magnitude in amperes, phase in degrees).
    pub fn with_ac(mut self, magnitude: f64, phase_deg: f64) -> Self {
        self.excitation.ac = Complex64::from_polar(magnitude, phase_deg.to_radians());
        self
    }
}

impl Stamps for CurrentSource {
    fn bind(&mut self, ctx: &mut BindContext<'_>) -> Result<()> {
        self.indices = [ctx.node(&self.nodes[0]), ctx.node(&self.nodes[1])];
        self.rhs = [ctx.rhs(self.indices[0]), ctx.rhs(self.indices[1])];
        Ok(())
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) {
        let value = self.excitation.value(ctx);
        ctx.add_rhs(self.rhs[0], -value);
        ctx.add_rhs(self.rhs[1], value);
    }
}

impl Behavior for CurrentSource {
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

impl Integrate for CurrentSource {
    fn accept(&mut self, _solution: &[f64], method: &mut IntegrationMethod) {
        self.excitation.schedule_next(method);
    }
}

impl Frequency for CurrentSource {
    fn bind_frequency(&mut self, solver: &mut ComplexSolver) {
        self.ac_rhs = [
            solver.get_rhs_element(self.indices[0]),
            solver.get_rhs_element(self.indices[1]),
        ];
    }

    fn load_frequency(&mut self, ctx: &mut FrequencyContext<'_>) {
        ctx.solver.add_rhs(self.ac_rhs[0], -self.excitation.ac);
        ctx.solver.add_rhs(self.ac_rhs[1], self.excitation.ac);
    }
}
