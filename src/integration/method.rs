//! Multistep integration methods.
//!
//! Every tracked quantity (a capacitor charge, an inductor flux) owns a
//! `(value, derivative)` pair in the state vector of each history entry. The
//! method turns the value history into a derivative at the current point and
//! linearizes it for stamping:
//!
//! ```text
//! dq/dt ≈ slope * q + (dq/dt - slope * q)
//!          ^^^^^^^^   ^^^^^^^^^^^^^^^^^^
//!          Jacobian   constant (RHS)
//! ```
//!
//! Step size is controlled by local truncation error, estimated from divided
//! differences over the history.

use log::{debug, trace};

use super::breakpoints::Breakpoints;
use super::history::{History, IntegrationState};
use crate::error::{EngineError, Result};
use crate::solver::DenseLu;

/// Safety factors of the trapezoidal truncation estimate, by order.
const TRAPEZOIDAL_FACTORS: [f64; 2] = [0.5, 0.0833333333];

/// Safety factors of the Gear truncation estimate, by order.
const GEAR_FACTORS: [f64; 6] = [
    0.5,
    0.2222222222,
    0.1363636364,
    0.096,
    0.07299270073,
    0.05830903790,
];

/// Weight of the previous derivative in the second-order trapezoidal rule.
const TRAPEZOIDAL_XMU: f64 = 0.5;

/// Integration method family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum MethodKind {
    /// Trapezoidal rule (backward Euler at order 1)
    #[default]
    Trapezoidal,
    /// Gear / BDF, orders 1 through 6
    Gear,
}

impl MethodKind {
    /// Highest order the method supports.
    pub fn max_supported_order(self) -> usize {
        match self {
            MethodKind::Trapezoidal => 2,
            MethodKind::Gear => 6,
        }
    }

    fn factor(self, order: usize) -> f64 {
        match self {
            MethodKind::Trapezoidal => TRAPEZOIDAL_FACTORS[order - 1],
            MethodKind::Gear => GEAR_FACTORS[order - 1],
        }
    }
}

/// Tolerances and limits used by an [`IntegrationMethod`].
#[derive(Debug, Clone)]
pub struct IntegrationParameters {
    pub max_order: usize,
    pub rel_tol: f64,
    pub abs_tol: f64,
    /// Absolute tolerance for node truncation
    pub volt_tol: f64,
    /// Truncation error overestimation factor
    pub trtol: f64,
    pub chg_tol: f64,
    pub min_step: f64,
    pub max_step: f64,
    /// Also bound the step by the predictor error of the solution vector
    pub truncate_nodes: bool,
}

impl Default for IntegrationParameters {
    fn default() -> Self {
        Self {
            max_order: 2,
            rel_tol: 1e-3,
            abs_tol: 1e-12,
            volt_tol: 1e-6,
            trtol: 7.0,
            chg_tol: 1e-14,
            min_step: 1e-15,
            max_step: f64::INFINITY,
            truncate_nodes: false,
        }
    }
}

/// Handle to a `(value, derivative)` pair in the state vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDerivative {
    index: usize,
}

impl StateDerivative {
    /// Index of the value; the derivative follows it.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Linearized contribution of a derivative to the system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobianInfo {
    /// Goes into the matrix
    pub jacobian: f64,
    /// Goes into the right-hand side
    pub rhs: f64,
}

/// A multistep integration method with its history and breakpoint schedule.
#[derive(Debug, Clone)]
pub struct IntegrationMethod {
    kind: MethodKind,
    params: IntegrationParameters,
    order: usize,
    states: History<IntegrationState>,
    coefficients: Vec<f64>,
    prediction_coefficients: Vec<f64>,
    prediction: Vec<f64>,
    slope: f64,
    state_size: usize,
    truncatable: Vec<StateDerivative>,
    node_indices: Vec<usize>,
    breakpoints: Breakpoints,
    base_time: f64,
    time: f64,
    next_delta: f64,
    saved_delta: f64,
    at_breakpoint: bool,
}

impl IntegrationMethod {
    /// Create a method. Fails if `max_order` is outside `1..=kind.max_supported_order()`.
    pub fn new(kind: MethodKind, params: IntegrationParameters) -> Result<Self> {
        if params.max_order == 0 || params.max_order > kind.max_supported_order() {
            return Err(EngineError::config(format!(
                "{:?} supports orders 1 to {}, got {}",
                kind,
                kind.max_supported_order(),
                params.max_order
            )));
        }
        let depth = params.max_order + 2;
        let max_order = params.max_order;
        Ok(Self {
            kind,
            params,
            order: 1,
            states: History::new(depth, IntegrationState::default()),
            coefficients: vec![0.0; max_order + 1],
            prediction_coefficients: vec![0.0; max_order + 1],
            prediction: Vec::new(),
            slope: 0.0,
            state_size: 0,
            truncatable: Vec::new(),
            node_indices: Vec::new(),
            breakpoints: Breakpoints::new(0.0, 0.0, 0.0),
            base_time: 0.0,
            time: 0.0,
            next_delta: 0.0,
            saved_delta: 0.0,
            at_breakpoint: false,
        })
    }

    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    pub fn parameters(&self) -> &IntegrationParameters {
        &self.params
    }

    /// Current integration order.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Force the integration order.
    pub fn set_order(&mut self, order: usize) -> Result<()> {
        if order == 0 || order > self.params.max_order {
            return Err(EngineError::config(format!(
                "order {} outside 1..={}",
                order, self.params.max_order
            )));
        }
        self.order = order;
        Ok(())
    }

    /// Derivative of the current point with respect to its value (the leading coefficient).
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Time of the point being computed.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Time of the last accepted point.
    pub fn base_time(&self) -> f64 {
        self.base_time
    }

    /// Step from the last accepted point to the current one.
    pub fn delta(&self) -> f64 {
        self.states.current().delta
    }

    /// Step size the method proposes next.
    pub fn next_delta(&self) -> f64 {
        self.next_delta
    }

    /// Predicted solution for the current point.
    pub fn prediction(&self) -> &[f64] {
        &self.prediction
    }

    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    pub fn breakpoints_mut(&mut self) -> &mut Breakpoints {
        &mut self.breakpoints
    }

    /// Schedule a breakpoint ahead of the last accepted point.
    pub fn schedule_breakpoint(&mut self, time: f64) -> bool {
        if time <= self.base_time + self.breakpoints.min_spacing() {
            return false;
        }
        self.breakpoints.set(time)
    }

    /// Whether the last accepted point was a breakpoint.
    pub fn at_breakpoint(&self) -> bool {
        self.at_breakpoint
    }

    /// History of integration states, most recent first.
    pub fn states(&self) -> &History<IntegrationState> {
        &self.states
    }

    // ============ Derivative states ============

    /// Allocate a `(value, derivative)` pair.
    ///
    /// Truncatable states take part in step-size control.
    pub fn create_derivative(&mut self, truncatable: bool) -> StateDerivative {
        let derivative = StateDerivative {
            index: self.state_size,
        };
        self.state_size += 2;
        for i in 0..self.states.len() {
            self.states.previous_mut(i).state.resize(self.state_size, 0.0);
        }
        if truncatable {
            self.truncatable.push(derivative);
        }
        derivative
    }

    /// Value at the current point.
    pub fn value(&self, d: StateDerivative) -> f64 {
        self.states.current().state[d.index]
    }

    /// Set the value at the current point.
    pub fn set_value(&mut self, d: StateDerivative, value: f64) {
        self.states.current_mut().state[d.index] = value;
    }

    /// Derivative at the current point.
    pub fn derivative(&self, d: StateDerivative) -> f64 {
        self.states.current().state[d.index + 1]
    }

    /// Set the derivative at the current point.
    pub fn set_derivative(&mut self, d: StateDerivative, value: f64) {
        self.states.current_mut().state[d.index + 1] = value;
    }

    /// Value `index` points back.
    pub fn previous_value(&self, d: StateDerivative, index: usize) -> f64 {
        self.states.previous(index).state[d.index]
    }

    /// Derivative `index` points back.
    pub fn previous_derivative(&self, d: StateDerivative, index: usize) -> f64 {
        self.states.previous(index).state[d.index + 1]
    }

    /// Recompute the derivative of `d` from the value history.
    pub fn integrate(&mut self, d: StateDerivative) {
        let (value, derivative) = (d.index, d.index + 1);
        match self.kind {
            MethodKind::Trapezoidal => {
                let ag = &self.coefficients;
                let order = self.order;
                let (current, previous) = self.states.current_and_previous_mut();
                current.state[derivative] = match order {
                    1 => ag[0] * current.state[value] + ag[1] * previous.state[value],
                    _ => {
                        -previous.state[derivative] * ag[1]
                            + ag[0] * (current.state[value] - previous.state[value])
                    }
                };
            }
            MethodKind::Gear => {
                let sum: f64 = (0..=self.order)
                    .map(|k| self.coefficients[k] * self.states.previous(k).state[value])
                    .sum();
                self.states.current_mut().state[derivative] = sum;
            }
        }
    }

    /// Linearized contribution of `d` scaled by `coefficient`.
    pub fn contributions(&self, d: StateDerivative, coefficient: f64) -> JacobianInfo {
        let state = &self.states.current().state;
        JacobianInfo {
            jacobian: self.slope * coefficient,
            rhs: state[d.index + 1] - self.slope * state[d.index],
        }
    }

    /// Linearized contribution of `d` around an explicit operating value.
    pub fn contributions_at(
        &self,
        d: StateDerivative,
        coefficient: f64,
        current_value: f64,
    ) -> JacobianInfo {
        let g = self.slope * coefficient;
        JacobianInfo {
            jacobian: g,
            rhs: self.derivative(d) - g * current_value,
        }
    }

    /// Largest step the truncation error of `d` allows.
    pub fn truncate_derivative(&self, d: StateDerivative) -> f64 {
        let (value, derivative) = (d.index, d.index + 1);
        let order = self.order;
        let current = self.states.current();
        let previous = self.states.previous(1);
        let p = &self.params;

        let volt_tol = p.abs_tol
            + p.rel_tol * current.state[derivative].abs().max(previous.state[derivative].abs());
        let charge = current.state[value].abs().max(previous.state[value].abs());
        let charge_tol = p.rel_tol * charge.max(p.chg_tol) / current.delta;
        let tol = volt_tol.max(charge_tol);

        // Divided differences
        let depth = (order + 2).min(self.states.len());
        let mut diff: Vec<f64> = self.states.iter().take(depth).map(|s| s.state[value]).collect();
        let mut deltas: Vec<f64> = self.states.iter().take(depth).map(|s| s.delta).collect();
        let mut j = order as isize;
        loop {
            for i in 0..=j as usize {
                diff[i] = (diff[i] - diff[i + 1]) / deltas[i];
            }
            j -= 1;
            if j < 0 {
                break;
            }
            for i in 0..=j as usize {
                deltas[i] = deltas[i + 1] + self.states.previous(i).delta;
            }
        }

        let factor = self.kind.factor(order);
        let del = p.trtol * tol / p.abs_tol.max(factor * diff[0].abs());
        match order {
            1 => del,
            2 => del.sqrt(),
            _ => (del.ln() / order as f64).exp(),
        }
    }

    // ============ Setup ============

    /// Restrict node truncation to these solution indices.
    pub fn set_truncation_nodes(&mut self, nodes: Vec<usize>) {
        self.node_indices = nodes;
    }

    /// Prepare for a run from `start` to `stop` over `solution_size` unknowns (ground included).
    pub fn initialize(&mut self, solution_size: usize, start: f64, stop: f64, initial_delta: f64) {
        let template = IntegrationState {
            delta: self.params.max_step.min(stop - start),
            solution: vec![0.0; solution_size],
            state: vec![0.0; self.state_size],
        };
        self.states.fill(&template);
        self.prediction = vec![0.0; solution_size];
        self.order = 1;
        self.coefficients.iter_mut().for_each(|c| *c = 0.0);
        self.prediction_coefficients.iter_mut().for_each(|c| *c = 0.0);
        self.slope = 0.0;
        self.base_time = start;
        self.time = start;
        self.next_delta = initial_delta;
        self.saved_delta = (stop - start) / 50.0;

        let min_spacing = self.params.min_step * 5.0;
        self.breakpoints = Breakpoints::new(start, stop, min_spacing);
        // The starting point counts as a breakpoint that has just been passed
        self.breakpoints.clear_first();
        self.at_breakpoint = true;
    }

    /// Copy the current solution and states into every history entry.
    ///
    /// Called once the initial point is known so that the first steps see a
    /// flat history.
    pub fn initialize_states(&mut self, solution: &[f64]) {
        let current = self.states.current_mut();
        current.solution.clear();
        current.solution.extend_from_slice(solution);
        let template = current.clone();
        for i in 1..self.states.len() {
            let entry = self.states.previous_mut(i);
            entry.solution.clone_from(&template.solution);
            entry.state.clone_from(&template.state);
        }
    }

    /// Record the solution of the current point.
    pub fn store_solution(&mut self, solution: &[f64]) {
        let current = self.states.current_mut();
        current.solution.clear();
        current.solution.extend_from_slice(solution);
    }

    // ============ Stepping ============

    /// Step to try next, honoring the maximum step and breakpoints.
    pub fn continue_step(&mut self) -> f64 {
        let mut delta = self.next_delta.min(self.params.max_step);
        if self.at_breakpoint {
            self.order = 1;
            let spacing = self.breakpoints.first() - self.base_time;
            delta = delta.min(0.1 * self.saved_delta.min(spacing));
            delta = delta.max(2.0 * self.params.min_step);
        }
        let (clamped, hit) = self.breakpoints.clamp(self.base_time, delta);
        if hit {
            self.saved_delta = delta;
        }
        clamped
    }

    /// Set up the point `base_time + delta`: coefficients and prediction.
    ///
    /// The step is clamped to the next breakpoint, on which the time then
    /// lands exactly. Returns the step actually used.
    pub fn probe(&mut self, delta: f64) -> Result<f64> {
        let (delta, hit) = self.breakpoints.clamp(self.base_time, delta);
        self.time = if hit {
            self.breakpoints
                .points()
                .iter()
                .copied()
                .find(|&p| p > self.base_time + self.breakpoints.min_spacing())
                .unwrap_or(self.base_time + delta)
        } else {
            self.base_time + delta
        };
        self.states.current_mut().delta = delta;
        self.compute_coefficients()?;
        self.predict();
        trace!(
            "probing t = {:e} (delta = {:e}, order {})",
            self.time,
            delta,
            self.order
        );
        Ok(delta)
    }

    /// Shrink the step after a failed iteration. Returns the new step.
    pub fn non_convergence(&mut self) -> f64 {
        let delta = self.delta() / 8.0;
        self.order = 1;
        self.time = self.base_time;
        self.next_delta = delta;
        delta
    }

    /// Judge the current point by its truncation error.
    ///
    /// Returns `true` if the point is accepted. Either way the step to take
    /// next is available through [`next_delta`](Self::next_delta). After an
    /// accepted point a higher order is tried and kept if it allows a step
    /// more than 5% larger than the one just taken.
    pub fn evaluate(&mut self) -> bool {
        let delta = self.delta();
        let mut new_delta = (2.0 * delta).min(self.truncate());

        if new_delta > 0.9 * delta {
            if self.order < self.params.max_order {
                self.order += 1;
                let higher = (2.0 * delta).min(self.truncate());
                if higher <= 1.05 * delta {
                    self.order -= 1;
                } else {
                    debug!("integration order raised to {}", self.order);
                    new_delta = higher;
                }
            }
            self.next_delta = new_delta;
            true
        } else {
            trace!("point at t = {:e} rejected, delta {:e} -> {:e}", self.time, delta, new_delta);
            self.time = self.base_time;
            self.next_delta = new_delta;
            false
        }
    }

    /// Accept the current point and advance the history.
    pub fn accept(&mut self) {
        self.base_time = self.time;
        self.at_breakpoint = false;
        let spacing = self.breakpoints.min_spacing();
        while self.breakpoints.points().len() > 1 && self.breakpoints.first() <= self.time + spacing {
            self.breakpoints.clear_first();
            self.at_breakpoint = true;
        }
        if self.breakpoints.is_at_first(self.time) {
            self.at_breakpoint = true;
        }

        self.states.cycle();
        let (current, previous) = self.states.current_and_previous_mut();
        current.solution.clone_from(&previous.solution);
        current.state.clone_from(&previous.state);
        current.delta = previous.delta;
    }

    /// Whether the final time has been reached.
    pub fn is_finished(&self) -> bool {
        self.base_time >= self.breakpoints.last() - self.breakpoints.min_spacing()
    }

    // ============ Internals ============

    fn compute_coefficients(&mut self) -> Result<()> {
        let delta = self.delta();
        let order = self.order;
        match self.kind {
            MethodKind::Trapezoidal => {
                match order {
                    1 => {
                        self.coefficients[0] = 1.0 / delta;
                        self.coefficients[1] = -1.0 / delta;
                    }
                    _ => {
                        self.coefficients[0] = 1.0 / delta / (1.0 - TRAPEZOIDAL_XMU);
                        self.coefficients[1] = TRAPEZOIDAL_XMU / (1.0 - TRAPEZOIDAL_XMU);
                    }
                }
            }
            MethodKind::Gear => {
                let n = order + 1;

                // Integration coefficients
                let mut matrix = vec![0.0; n * n];
                let mut arg = 0.0;
                for i in 0..n {
                    matrix[i] = 1.0;
                    if i > 0 {
                        arg += self.states.previous(i - 1).delta;
                    }
                    let mut power = 1.0;
                    for j in 1..n {
                        power *= arg / delta;
                        matrix[j * n + i] = power;
                    }
                }
                let mut rhs = vec![0.0; n];
                rhs[1] = -1.0 / delta;
                let solution = DenseLu::factor(&matrix, n)?.solve(&rhs);
                self.coefficients[..n].copy_from_slice(&solution);

                // Predictor coefficients
                let mut arg = 0.0;
                for i in 0..n {
                    matrix[i] = 1.0;
                    arg += self.states.previous(i).delta;
                    let mut power = 1.0;
                    for j in 1..n {
                        power *= arg / delta;
                        matrix[j * n + i] = power;
                    }
                }
                let mut rhs = vec![0.0; n];
                rhs[0] = 1.0;
                let solution = DenseLu::factor(&matrix, n)?.solve(&rhs);
                self.prediction_coefficients[..n].copy_from_slice(&solution);
            }
        }
        self.slope = self.coefficients[0];
        Ok(())
    }

    fn predict(&mut self) {
        let order = self.order;
        match self.kind {
            MethodKind::Trapezoidal => {
                let delta = self.delta();
                let s1 = self.states.previous(1);
                let s2 = self.states.previous(2);
                let delta1 = s1.delta;
                match order {
                    1 => {
                        for (i, p) in self.prediction.iter_mut().enumerate() {
                            *p = s1.solution[i] + delta * (s1.solution[i] - s2.solution[i]) / delta1;
                        }
                    }
                    _ => {
                        let s3 = self.states.previous(3);
                        let delta2 = s2.delta;
                        let b = -delta / (2.0 * delta1);
                        let a = 1.0 - b;
                        for (i, p) in self.prediction.iter_mut().enumerate() {
                            let dd0 = (s1.solution[i] - s2.solution[i]) / delta1;
                            let dd1 = (s2.solution[i] - s3.solution[i]) / delta2;
                            *p = s1.solution[i] + (b * dd1 + a * dd0) * delta;
                        }
                    }
                }
            }
            MethodKind::Gear => {
                for (i, p) in self.prediction.iter_mut().enumerate() {
                    *p = (0..=order)
                        .map(|k| self.prediction_coefficients[k] * self.states.previous(k + 1).solution[i])
                        .sum();
                }
            }
        }
    }

    /// Smallest step allowed by all truncatable states (and nodes if enabled).
    fn truncate(&self) -> f64 {
        let mut limit = self
            .truncatable
            .iter()
            .map(|&d| self.truncate_derivative(d))
            .fold(f64::INFINITY, f64::min);
        if self.params.truncate_nodes {
            limit = limit.min(self.truncate_nodes());
        }
        limit
    }

    fn truncate_nodes(&self) -> f64 {
        let order = self.order;
        let current = self.states.current();
        let delta = current.delta;
        let delsum: f64 = self.states.iter().take(order + 1).map(|s| s.delta).sum();
        let p = &self.params;

        let mut limit = f64::INFINITY;
        for &index in &self.node_indices {
            let value = current.solution[index];
            let predicted = self.prediction[index];
            let tol = value.abs().max(predicted.abs()) * p.rel_tol + p.volt_tol;
            let diff = value - predicted;
            if diff == 0.0 {
                continue;
            }
            let mut tmp = (tol * p.trtol * delsum / (diff * delta)).abs();
            tmp = match order {
                1 => tmp.sqrt(),
                _ => (tmp.ln() / (order + 1) as f64).exp(),
            };
            limit = limit.min(tmp * delta);
        }
        limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn method(kind: MethodKind, max_order: usize) -> IntegrationMethod {
        let params = IntegrationParameters {
            max_order,
            max_step: 1.0,
            ..Default::default()
        };
        IntegrationMethod::new(kind, params).unwrap()
    }

    /// Integrate `f` with a fixed step and return the derivative estimates.
    fn drive(method: &mut IntegrationMethod, h: f64, steps: usize, f: impl Fn(f64) -> f64) -> Vec<f64> {
        let d = method.create_derivative(true);
        method.initialize(2, 0.0, 1e3, h);
        method.set_value(d, f(0.0));
        method.initialize_states(&[0.0, f(0.0)]);

        let mut derivatives = Vec::new();
        for _ in 0..steps {
            method.probe(h).unwrap();
            let t = method.time();
            method.set_value(d, f(t));
            method.integrate(d);
            derivatives.push(method.derivative(d));
            method.store_solution(&[0.0, f(t)]);
            method.accept();
        }
        derivatives
    }

    #[test]
    fn test_rejects_unsupported_order() {
        let params = IntegrationParameters {
            max_order: 3,
            ..Default::default()
        };
        assert!(IntegrationMethod::new(MethodKind::Trapezoidal, params.clone()).is_err());
        assert!(IntegrationMethod::new(MethodKind::Gear, params).is_ok());
    }

    #[test]
    fn test_constant_has_zero_derivative() {
        for kind in [MethodKind::Trapezoidal, MethodKind::Gear] {
            let mut m = method(kind, 1);
            let derivatives = drive(&mut m, 1e-3, 10, |_| 3.0);
            assert!(derivatives.iter().all(|d| d.abs() < 1e-12));
        }
    }

    #[test]
    fn test_ramp_derivative_order_one() {
        for kind in [MethodKind::Trapezoidal, MethodKind::Gear] {
            let mut m = method(kind, 1);
            let derivatives = drive(&mut m, 1e-3, 10, |t| 5.0 * t);
            for d in derivatives {
                assert_relative_eq!(d, 5.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_gear_second_order_is_exact_on_parabola() {
        let mut m = method(MethodKind::Gear, 2);
        let d = m.create_derivative(true);
        let h = 1e-2;
        m.initialize(2, 0.0, 10.0, h);
        let f = |t: f64| t * t;

        // Two first-order steps build up history
        for _ in 0..2 {
            m.probe(h).unwrap();
            let t = m.time();
            m.set_value(d, f(t));
            m.integrate(d);
            m.accept();
        }
        m.set_order(2).unwrap();
        m.probe(h).unwrap();
        let t = m.time();
        m.set_value(d, f(t));
        m.integrate(d);
        assert_relative_eq!(m.derivative(d), 2.0 * t, epsilon = 1e-9);
    }

    #[test]
    fn test_trapezoidal_second_order_rule() {
        let mut m = method(MethodKind::Trapezoidal, 2);
        let d = m.create_derivative(true);
        m.initialize(2, 0.0, 10.0, 0.1);
        m.set_value(d, 1.0);
        m.set_derivative(d, 4.0);
        m.initialize_states(&[0.0, 1.0]);
        m.set_order(2).unwrap();
        m.probe(0.1).unwrap();
        m.set_value(d, 1.5);
        m.integrate(d);
        // 2/h * (1.5 - 1.0) - 4.0
        assert_relative_eq!(m.derivative(d), 6.0, epsilon = 1e-12);

        let info = m.contributions(d, 2.0);
        assert_relative_eq!(info.jacobian, 40.0, epsilon = 1e-12);
        assert_relative_eq!(info.rhs, 6.0 - 20.0 * 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_gear_predictor_extrapolates_linearly() {
        let mut m = method(MethodKind::Gear, 1);
        m.create_derivative(true);
        m.initialize(2, 0.0, 10.0, 0.1);
        m.initialize_states(&[0.0, 0.0]);
        m.probe(0.1).unwrap();
        m.store_solution(&[0.0, 1.0]);
        m.accept();
        m.probe(0.1).unwrap();
        assert_relative_eq!(m.prediction()[1], 2.0, epsilon = 1e-12);
    }

    /// Truncation limit at the fourth backward-Euler step of `f`.
    fn truncation_after(f: impl Fn(f64) -> f64) -> f64 {
        let mut m = method(MethodKind::Trapezoidal, 1);
        let d = m.create_derivative(true);
        let h = 1e-3;
        m.initialize(2, 0.0, 1e3, h);
        m.set_value(d, f(0.0));
        m.initialize_states(&[0.0, f(0.0)]);
        for _ in 0..3 {
            m.probe(h).unwrap();
            let t = m.time();
            m.set_value(d, f(t));
            m.integrate(d);
            m.accept();
        }
        m.probe(h).unwrap();
        let t = m.time();
        m.set_value(d, f(t));
        m.integrate(d);
        m.truncate_derivative(d)
    }

    #[test]
    fn test_truncation_bounds_curved_signals() {
        let flat = truncation_after(|_| 1.0);
        let curved = truncation_after(|t| 1.0 + 1e6 * t * t);
        assert!(flat > 1.0);
        assert!(curved < 1e-2);
    }

    #[test]
    fn test_step_never_crosses_breakpoint() {
        let mut m = method(MethodKind::Trapezoidal, 2);
        m.initialize(2, 0.0, 1.0, 0.3);
        m.breakpoints_mut().set(0.25);
        m.at_breakpoint = false;

        let delta = m.continue_step();
        let used = m.probe(delta).unwrap();
        assert_eq!(m.time(), 0.25);
        assert_relative_eq!(used, 0.25);
        m.accept();
        assert!(m.at_breakpoint());
        assert_eq!(m.breakpoints().first(), 1.0);
    }

    #[test]
    fn test_breakpoint_resets_order_and_limits_step() {
        let mut m = method(MethodKind::Trapezoidal, 2);
        m.initialize(2, 0.0, 1.0, 1e-3);
        m.set_order(2).unwrap();
        let delta = m.continue_step();
        assert_eq!(m.order(), 1);
        // 0.1 * min(saved delta = 1/50, spacing = 1)
        assert!(delta <= 0.1 * 0.02 + 1e-15);
    }

    #[test]
    fn test_initialize_keeps_only_final_breakpoint() {
        let mut m = method(MethodKind::Gear, 2);
        m.initialize(2, 0.0, 1.0, 0.1);
        assert_eq!(m.breakpoints().points(), &[1.0]);
        assert!(m.at_breakpoint());
    }

    #[test]
    fn test_smooth_signal_raises_order() {
        let mut m = method(MethodKind::Trapezoidal, 2);
        let d = m.create_derivative(true);
        let h = 1e-6;
        let f = |t: f64| 1e-6 * (1.0 - (-t / 1e-3).exp());
        m.initialize(2, 0.0, 1.0, h);
        m.set_value(d, f(0.0));
        m.initialize_states(&[0.0, f(0.0)]);

        let mut orders = Vec::new();
        for _ in 0..8 {
            m.probe(h).unwrap();
            let t = m.time();
            m.set_value(d, f(t));
            m.integrate(d);
            m.store_solution(&[0.0, f(t)]);
            assert!(m.evaluate());
            orders.push(m.order());
            m.accept();
        }
        assert!(orders.contains(&2), "orders {:?}", orders);
    }

    #[test]
    fn test_non_convergence_cuts_step() {
        let mut m = method(MethodKind::Gear, 3);
        m.initialize(2, 0.0, 1.0, 0.08);
        m.probe(0.08).unwrap();
        let delta = m.non_convergence();
        assert_relative_eq!(delta, 0.01);
        assert_eq!(m.order(), 1);
        assert_eq!(m.time(), 0.0);
    }
}
