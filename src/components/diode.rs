//! Diode model.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / (n * Vt)) - 1)
//!
//! For Newton-Raphson iteration, we linearize around the current operating point:
//!   I ≈ I0 + G_d * (V - V0)
//!
//! where G_d = dI/dV = Is/(n*Vt) * exp(V0/(n*Vt))

use std::f64::consts::SQRT_2;

use num_complex::Complex64;

use super::{require_positive, ConductanceStamp};
use crate::error::Result;
use crate::integration::IntegrationMethod;
use crate::simulation::{
    Behavior, BindContext, ConvergenceContext, Frequency, FrequencyContext, InitMode, Integrate,
    LoadContext, Stamps,
};
use crate::solver::{ComplexSolver, RhsId};
use crate::THERMAL_VOLTAGE;

/// Parameters for a diode model.
#[derive(Debug, Clone)]
pub struct DiodeParams {
    /// Saturation current (Is), typically 1e-14 to 1e-12 A
    pub is: f64,
    /// Ideality factor (n), typically 1.0 to 2.0
    pub n: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self { is: 1e-14, n: 1.0 }
    }
}

impl DiodeParams {
    /// Create parameters for a germanium diode (lower forward voltage).
    pub fn germanium() -> Self {
        Self { is: 1e-9, n: 1.5 }
    }

    /// Thermal voltage times ideality factor.
    pub fn n_vt(&self) -> f64 {
        self.n * THERMAL_VOLTAGE
    }

    /// Voltage above which the exponential is limited between iterations.
    pub fn v_crit(&self) -> f64 {
        let n_vt = self.n_vt();
        n_vt * (n_vt / (SQRT_2 * self.is)).ln()
    }
}

/// A junction diode from anode to cathode.
#[derive(Debug, Clone)]
pub struct Diode {
    name: String,
    nodes: [String; 2],
    params: DiodeParams,
    off: bool,
    v_crit: f64,
    indices: [usize; 2],
    stamp: ConductanceStamp,
    rhs: [RhsId; 2],
    ac_stamp: ConductanceStamp,
    /// Linearization point of the latest load
    v_op: f64,
    i_op: f64,
    g_op: f64,
    /// Junction voltage at the last accepted time point
    v_accepted: f64,
}

impl Diode {
    /// Create a diode.
    pub fn new(name: &str, anode: &str, cathode: &str, params: DiodeParams) -> Result<Self> {
        require_positive(name, "is", params.is)?;
        require_positive(name, "n", params.n)?;
        Ok(Self {
            name: name.to_string(),
            nodes: [anode.to_string(), cathode.to_string()],
            v_crit: params.v_crit(),
            params,
            off: false,
            indices: [0; 2],
            stamp: ConductanceStamp::default(),
            rhs: [RhsId::TRASH; 2],
            ac_stamp: ConductanceStamp::default(),
            v_op: 0.0,
            i_op: 0.0,
            g_op: 0.0,
            v_accepted: 0.0,
        })
    }

    /// Start the operating point search with the junction switched off.
    pub fn with_off(mut self) -> Self {
        self.off = true;
        self
    }

    pub fn params(&self) -> &DiodeParams {
        &self.params
    }

    /// Junction voltage of the latest linearization.
    pub fn voltage(&self) -> f64 {
        self.v_op
    }

    /// Diode current and conductance at `v`, with `gmin` in parallel.
    pub fn evaluate(&self, v: f64, gmin: f64) -> (f64, f64) {
        let n_vt = self.params.n_vt();
        let is = self.params.is;
        if v >= -3.0 * n_vt {
            let e = (v / n_vt).exp();
            (is * (e - 1.0) + gmin * v, is * e / n_vt + gmin)
        } else {
            // Smooth reverse region approaching -Is
            let arg = 3.0 * n_vt / (v * std::f64::consts::E);
            let arg = arg * arg * arg;
            (-is * (1.0 + arg) + gmin * v, is * 3.0 * arg / v + gmin)
        }
    }

    /// Limit the junction voltage step between iterations.
    ///
    /// Above the critical voltage the exponential is followed logarithmically
    /// so that a single iteration cannot overflow the current.
    pub fn limit_voltage_step(&self, v_old: f64, v_new: f64) -> f64 {
        let n_vt = self.params.n_vt();
        if v_new > self.v_crit && (v_new - v_old).abs() > 2.0 * n_vt {
            if v_old > 0.0 {
                let arg = 1.0 + (v_new - v_old) / n_vt;
                if arg > 0.0 {
                    v_old + n_vt * arg.ln()
                } else {
                    self.v_crit
                }
            } else {
                n_vt * (v_new / n_vt).ln()
            }
        } else {
            v_new
        }
    }
}

impl Stamps for Diode {
    fn bind(&mut self, ctx: &mut BindContext<'_>) -> Result<()> {
        let [anode, cathode] = [ctx.node(&self.nodes[0]), ctx.node(&self.nodes[1])];
        self.indices = [anode, cathode];
        self.stamp = ConductanceStamp::new(|r, c| ctx.element(r, c), anode, cathode);
        self.rhs = [ctx.rhs(anode), ctx.rhs(cathode)];
        Ok(())
    }

    fn load(&mut self, ctx: &mut LoadContext<'_>) {
        let v = match ctx.init {
            InitMode::Junction if self.off => 0.0,
            InitMode::Junction => self.v_crit,
            InitMode::Fix if self.off => 0.0,
            InitMode::Transient => self.v_accepted,
            _ => {
                let v = ctx.voltage(self.indices[0], self.indices[1]);
                self.limit_voltage_step(self.v_op, v)
            }
        };
        let (i, g) = self.evaluate(v, ctx.gmin);
        self.v_op = v;
        self.i_op = i;
        self.g_op = g;

        // I = G * V + I_eq
        let i_eq = i - g * v;
        self.stamp.load(ctx.solver, g);
        ctx.add_rhs(self.rhs[0], -i_eq);
        ctx.add_rhs(self.rhs[1], i_eq);
    }
}

impl Behavior for Diode {
    fn name(&self) -> &str {
        &self.name
    }

    /// The current predicted by the linearization must match the model.
    fn is_convergent(&self, ctx: &ConvergenceContext<'_>) -> bool {
        let v = ctx.solution[self.indices[0]] - ctx.solution[self.indices[1]];
        let i_hat = self.i_op + self.g_op * (v - self.v_op);
        let tol = ctx.rel_tol * i_hat.abs().max(self.i_op.abs()) + ctx.abs_tol;
        (i_hat - self.i_op).abs() <= tol
    }

    fn as_integrate(&mut self) -> Option<&mut dyn Integrate> {
        Some(self)
    }

    fn as_frequency(&mut self) -> Option<&mut dyn Frequency> {
        Some(self)
    }
}

impl Integrate for Diode {
    fn initialize_states(&mut self, _solution: &[f64], _use_ic: bool, _method: &mut IntegrationMethod) {
        self.v_accepted = self.v_op;
    }

    fn accept(&mut self, _solution: &[f64], _method: &mut IntegrationMethod) {
        self.v_accepted = self.v_op;
    }
}

impl Frequency for Diode {
    fn bind_frequency(&mut self, solver: &mut ComplexSolver) {
        self.ac_stamp =
            ConductanceStamp::new(|r, c| solver.get_element(r, c), self.indices[0], self.indices[1]);
    }

    fn load_frequency(&mut self, ctx: &mut FrequencyContext<'_>) {
        self.ac_stamp.load(ctx.solver, Complex64::new(self.g_op, 0.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diode() -> Diode {
        Diode::new("D1", "1", "0", DiodeParams::default()).unwrap()
    }

    #[test]
    fn test_diode_forward_bias() {
        let d = diode();

        // At 0V, current should be approximately 0
        assert!(d.evaluate(0.0, 0.0).0.abs() < 1e-10);

        // At forward bias, current should increase exponentially
        let i_small = d.evaluate(0.3, 0.0).0;
        let i_large = d.evaluate(0.6, 0.0).0;
        assert!(i_large > i_small * 100.0);
    }

    #[test]
    fn test_diode_reverse_bias() {
        let d = diode();

        // In reverse bias, current should approach -Is
        let (i_rev, g_rev) = d.evaluate(-1.0, 0.0);
        assert!(i_rev < 0.0);
        assert!(i_rev > -2.0 * d.params.is);
        assert!(g_rev > 0.0);
    }

    #[test]
    fn test_reverse_region_is_continuous() {
        let d = diode();
        let v = -3.0 * d.params.n_vt();
        let (below, _) = d.evaluate(v - 1e-9, 0.0);
        let (above, _) = d.evaluate(v + 1e-9, 0.0);
        assert!((below - above).abs() < 1e-3 * d.params.is);
    }

    #[test]
    fn test_limiting_slows_large_steps() {
        let d = diode();
        let limited = d.limit_voltage_step(0.6, 5.0);
        assert!(limited > 0.6 && limited < 1.0);
        // Small steps are left alone
        assert_eq!(d.limit_voltage_step(0.6, 0.62), 0.62);
        // Below the critical voltage nothing is limited
        assert_eq!(d.limit_voltage_step(0.0, -2.0), -2.0);
    }

    #[test]
    fn test_critical_voltage() {
        let v_crit = DiodeParams::default().v_crit();
        assert!(v_crit > 0.6 && v_crit < 0.8);
    }
}
