//! Newton-Raphson iteration engine.

use log::{debug, trace};

use super::behavior::{ConvergenceContext, LoadContext};
use super::biasing::{Simulation, NODESET_CONDUCTANCE};
use super::state::{Domain, InitMode};
use crate::circuit::VariableKind;
use crate::error::{EngineError, Result};
use crate::integration::IntegrationMethod;

impl Simulation {
    /// Iterate until the solution converges or `max_iterations` is exceeded.
    ///
    /// Returns `Ok(false)` when the iteration limit is reached. Errors are
    /// only returned for a singular matrix or an invalid initialization
    /// mode. In the time domain `method` provides the integration
    /// coefficients for reactive components.
    pub fn iterate(
        &mut self,
        max_iterations: usize,
        mut method: Option<&mut IntegrationMethod>,
    ) -> Result<bool> {
        if self.state.init == InitMode::SmallSignal {
            return Err(EngineError::InvalidInitMode {
                mode: self.state.init.to_string(),
            });
        }

        // Fixed initial conditions: one load so devices pick up their state
        if self.state.use_ic && self.state.domain == Domain::Time {
            self.state.store_solution();
            self.load(method);
            return Ok(true);
        }

        let mut pass = false;
        let mut iteration = 0;
        loop {
            self.state.is_convergent = true;
            self.load(method.as_deref_mut());
            iteration += 1;
            self.statistics.iterations += 1;

            let state = &mut self.state;
            if !state.did_preorder {
                state.solver.preorder_mna();
                state.did_preorder = true;
            }
            if matches!(state.init, InitMode::Junction | InitMode::Transient) {
                state.should_reorder = true;
            }

            if state.should_reorder {
                state.solver.apply_diagonal_gmin(state.diagonal_gmin);
                state.solver.order_and_factor()?;
                state.should_reorder = false;
                self.statistics.reorders += 1;
            } else {
                state.solver.apply_diagonal_gmin(state.diagonal_gmin);
                if !state.solver.factor() {
                    trace!("factorization failed, reordering");
                    state.should_reorder = true;
                    continue;
                }
            }

            state.store_solution();
            state.solver.solve(&mut state.solution)?;
            state.solution[0] = 0.0;
            state.old_solution[0] = 0.0;

            if iteration > max_iterations {
                trace!("iteration limit {} reached", max_iterations);
                return Ok(false);
            }

            let converged = self.state.is_convergent && iteration != 1 && self.is_convergent();
            let state = &mut self.state;
            state.is_convergent = converged;

            match state.init {
                InitMode::Float => {
                    if state.use_dc && state.had_node_set {
                        if pass {
                            state.is_convergent = false;
                        }
                        pass = false;
                    }
                    if state.is_convergent {
                        trace!("converged after {} iterations", iteration);
                        return Ok(true);
                    }
                }
                InitMode::Junction => {
                    debug!("junctions initialized, switching to {}", InitMode::Fix);
                    state.init = InitMode::Fix;
                    state.should_reorder = true;
                }
                InitMode::Fix => {
                    if state.is_convergent {
                        debug!("fixed point converged, switching to {}", InitMode::Float);
                        state.init = InitMode::Float;
                    }
                    pass = true;
                }
                InitMode::Transient => {
                    if iteration <= 1 {
                        state.should_reorder = true;
                    }
                    state.init = InitMode::Float;
                }
                InitMode::None => {
                    state.init = InitMode::Float;
                }
                InitMode::SmallSignal => {
                    return Err(EngineError::InvalidInitMode {
                        mode: state.init.to_string(),
                    });
                }
            }
        }
    }

    /// Rebuild the system for the latest iterate.
    pub(crate) fn load(&mut self, method: Option<&mut IntegrationMethod>) {
        let state = &mut self.state;
        state.solver.clear();
        let time = method.as_ref().map_or(0.0, |m| m.time());
        let mut ctx = LoadContext {
            solver: &mut state.solver,
            solution: &state.solution,
            init: state.init,
            domain: state.domain,
            use_ic: state.use_ic,
            source_factor: state.source_factor,
            gmin: state.gmin,
            time,
        };

        for behavior in &mut self.behaviors {
            behavior.load(&mut ctx);
        }
        if let Some(method) = method {
            for behavior in &mut self.behaviors {
                if let Some(reactive) = behavior.as_integrate() {
                    reactive.load_transient(&mut ctx, method);
                }
            }
        }

        // Nodesets hold their voltage until the junctions are initialized
        if ctx.domain == Domain::Dc && matches!(ctx.init, InitMode::Junction | InitMode::Fix) {
            for nodeset in &self.nodesets {
                ctx.add(nodeset.diagonal, NODESET_CONDUCTANCE);
                ctx.add_rhs(
                    nodeset.rhs,
                    NODESET_CONDUCTANCE * nodeset.value * ctx.source_factor,
                );
            }
        }
    }

    /// Node-level check followed by every device's own check.
    fn is_convergent(&self) -> bool {
        let solution = &self.state.solution;
        let old = &self.state.old_solution;
        let rel_tol = self.config.rel_tol;

        for (index, variable) in self.variables.iter().skip(1) {
            let new_value = solution[index];
            let old_value = old[index];
            if !new_value.is_finite() {
                trace!("{} is not finite", variable);
                return false;
            }
            let floor = match variable.kind {
                VariableKind::Voltage => self.config.volt_tol,
                VariableKind::Current => self.config.abs_tol,
            };
            let tol = rel_tol * new_value.abs().max(old_value.abs()) + floor;
            if (new_value - old_value).abs() > tol {
                trace!("{} not converged: {:e} -> {:e}", variable, old_value, new_value);
                return false;
            }
        }

        let ctx = ConvergenceContext {
            solution,
            old_solution: old,
            rel_tol,
            abs_tol: self.config.abs_tol,
            volt_tol: self.config.volt_tol,
        };
        self.behaviors.iter().all(|b| b.is_convergent(&ctx))
    }
}
