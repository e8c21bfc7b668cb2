//! Analysis configuration.

use crate::error::{EngineError, Result};
use crate::integration::{IntegrationParameters, MethodKind};

/// Configuration shared by every analysis that needs an operating point.
#[derive(Debug, Clone)]
pub struct BiasingConfig {
    /// Relative convergence tolerance.
    pub rel_tol: f64,
    /// Absolute tolerance on currents (amperes).
    pub abs_tol: f64,
    /// Absolute tolerance on voltages (volts).
    pub volt_tol: f64,
    /// Minimum conductance devices add across nonlinear junctions.
    pub gmin: f64,
    /// Iteration limit for each operating point attempt.
    pub dc_max_iterations: usize,
    /// Number of Gmin stepping decades (0 disables Gmin stepping).
    pub gmin_steps: usize,
    /// Number of source stepping increments (0 disables source stepping).
    pub source_steps: usize,
    /// Initial guesses for node voltages, held during junction initialization.
    pub nodesets: Vec<(String, f64)>,
    /// Relative pivot threshold of the sparse solver.
    pub pivot_rel_tol: f64,
    /// Absolute pivot threshold of the sparse solver.
    pub pivot_abs_tol: f64,
}

impl Default for BiasingConfig {
    fn default() -> Self {
        Self {
            rel_tol: 1e-3,
            abs_tol: 1e-12,
            volt_tol: 1e-6,
            gmin: 1e-12,
            dc_max_iterations: 100,
            gmin_steps: 10,
            source_steps: 10,
            nodesets: Vec::new(),
            pivot_rel_tol: 1e-3,
            pivot_abs_tol: 0.0,
        }
    }
}

impl BiasingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the relative tolerance.
    pub fn with_rel_tol(mut self, rel_tol: f64) -> Self {
        self.rel_tol = rel_tol;
        self
    }

    /// Set the absolute current tolerance.
    pub fn with_abs_tol(mut self, abs_tol: f64) -> Self {
        self.abs_tol = abs_tol;
        self
    }

    /// Set the absolute voltage tolerance.
    pub fn with_volt_tol(mut self, volt_tol: f64) -> Self {
        self.volt_tol = volt_tol;
        self
    }

    /// Set the minimum conductance.
    pub fn with_gmin(mut self, gmin: f64) -> Self {
        self.gmin = gmin;
        self
    }

    /// Set the operating point iteration limit.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.dc_max_iterations = max_iterations;
        self
    }

    /// Set the number of Gmin and source steps.
    pub fn with_stepping(mut self, gmin_steps: usize, source_steps: usize) -> Self {
        self.gmin_steps = gmin_steps;
        self.source_steps = source_steps;
        self
    }

    /// Add a nodeset.
    pub fn with_nodeset(mut self, node: impl Into<String>, voltage: f64) -> Self {
        self.nodesets.push((node.into(), voltage));
        self
    }

    /// Set the pivot thresholds of the sparse solver.
    pub fn with_pivot_tolerances(mut self, rel: f64, abs: f64) -> Self {
        self.pivot_rel_tol = rel;
        self.pivot_abs_tol = abs;
        self
    }

    /// Check the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.rel_tol > 0.0) {
            return Err(EngineError::config("rel_tol must be positive"));
        }
        if !(self.abs_tol > 0.0) || !(self.volt_tol > 0.0) {
            return Err(EngineError::config("absolute tolerances must be positive"));
        }
        if self.gmin < 0.0 {
            return Err(EngineError::config("gmin cannot be negative"));
        }
        if self.dc_max_iterations == 0 {
            return Err(EngineError::config("dc_max_iterations must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.pivot_rel_tol) || self.pivot_abs_tol < 0.0 {
            return Err(EngineError::config("pivot tolerances out of range"));
        }
        Ok(())
    }
}

/// Configuration of a transient analysis.
#[derive(Debug, Clone)]
pub struct TimeConfig {
    pub start: f64,
    pub stop: f64,
    /// Suggested output step; also bounds the initial step.
    pub step: f64,
    /// Largest step, `(stop - start) / 50` if unset.
    pub max_step: Option<f64>,
    /// Smallest step before giving up, `1e-9 * max_step` if unset.
    pub min_step: Option<f64>,
    pub method: MethodKind,
    pub max_order: usize,
    /// Iteration limit for each time point.
    pub tran_max_iterations: usize,
    /// Skip the operating point and start from `initial_conditions`.
    pub use_ic: bool,
    pub initial_conditions: Vec<(String, f64)>,
    /// Truncation error overestimation factor.
    pub trtol: f64,
    /// Charge tolerance (coulombs).
    pub chg_tol: f64,
    /// Also bound the step by the predictor error on node voltages.
    pub truncate_nodes: bool,
    /// Additional time points to land on exactly.
    pub extra_breakpoints: Vec<f64>,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 1e-3,
            step: 1e-5,
            max_step: None,
            min_step: None,
            method: MethodKind::Trapezoidal,
            max_order: 2,
            tran_max_iterations: 10,
            use_ic: false,
            initial_conditions: Vec::new(),
            trtol: 7.0,
            chg_tol: 1e-14,
            truncate_nodes: false,
            extra_breakpoints: Vec::new(),
        }
    }
}

impl TimeConfig {
    /// Simulate from 0 to `stop` with output step `step`.
    pub fn new(step: f64, stop: f64) -> Self {
        Self {
            step,
            stop,
            ..Self::default()
        }
    }

    /// Set the start time.
    pub fn with_start(mut self, start: f64) -> Self {
        self.start = start;
        self
    }

    /// Set the maximum step.
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = Some(max_step);
        self
    }

    /// Set the minimum step.
    pub fn with_min_step(mut self, min_step: f64) -> Self {
        self.min_step = Some(min_step);
        self
    }

    /// Select the integration method and its maximum order.
    pub fn with_method(mut self, method: MethodKind, max_order: usize) -> Self {
        self.method = method;
        self.max_order = max_order;
        self
    }

    /// Set the iteration limit per time point.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.tran_max_iterations = max_iterations;
        self
    }

    /// Start from the given node voltages instead of an operating point.
    pub fn with_initial_conditions(mut self, conditions: Vec<(String, f64)>) -> Self {
        self.use_ic = true;
        self.initial_conditions = conditions;
        self
    }

    /// Set the truncation error factor.
    pub fn with_trtol(mut self, trtol: f64) -> Self {
        self.trtol = trtol;
        self
    }

    /// Enable or disable node truncation.
    pub fn with_truncate_nodes(mut self, enabled: bool) -> Self {
        self.truncate_nodes = enabled;
        self
    }

    /// Add a time point the analysis must land on.
    pub fn with_breakpoint(mut self, time: f64) -> Self {
        self.extra_breakpoints.push(time);
        self
    }

    /// Largest step the analysis may take.
    pub fn effective_max_step(&self) -> f64 {
        self.max_step.unwrap_or((self.stop - self.start) / 50.0)
    }

    /// Smallest step before the analysis fails.
    pub fn effective_min_step(&self) -> f64 {
        self.min_step.unwrap_or(1e-9 * self.effective_max_step())
    }

    /// Step the analysis starts with.
    pub fn initial_step(&self) -> f64 {
        ((self.stop - self.start) / 50.0).min(self.step) / 10.0
    }

    /// Integration parameters derived from this configuration and the biasing tolerances.
    pub fn integration_parameters(&self, biasing: &BiasingConfig) -> IntegrationParameters {
        IntegrationParameters {
            max_order: self.max_order,
            rel_tol: biasing.rel_tol,
            abs_tol: biasing.abs_tol,
            volt_tol: biasing.volt_tol,
            trtol: self.trtol,
            chg_tol: self.chg_tol,
            min_step: self.effective_min_step(),
            max_step: self.effective_max_step(),
            truncate_nodes: self.truncate_nodes,
        }
    }

    /// Check the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.stop > self.start) {
            return Err(EngineError::config("stop time must be after start time"));
        }
        if !(self.step > 0.0) {
            return Err(EngineError::config("time step must be positive"));
        }
        if self.max_order == 0 || self.max_order > self.method.max_supported_order() {
            return Err(EngineError::config(format!(
                "max_order {} not supported by {:?} (1..={})",
                self.max_order,
                self.method,
                self.method.max_supported_order()
            )));
        }
        let max_step = self.effective_max_step();
        if !(max_step > 0.0) {
            return Err(EngineError::config("max_step must be positive"));
        }
        let min_step = self.effective_min_step();
        if !(min_step > 0.0) || min_step >= max_step {
            return Err(EngineError::config("min_step must be positive and below max_step"));
        }
        if self.tran_max_iterations == 0 {
            return Err(EngineError::config("tran_max_iterations must be at least 1"));
        }
        if !(self.trtol > 0.0) {
            return Err(EngineError::config("trtol must be positive"));
        }
        Ok(())
    }
}

/// Frequency points of a small-signal analysis.
#[derive(Debug, Clone, Default)]
pub struct FrequencyConfig {
    pub frequencies: Vec<f64>,
}

impl FrequencyConfig {
    /// Explicit list of frequencies.
    pub fn list(frequencies: Vec<f64>) -> Self {
        Self { frequencies }
    }

    /// `points` frequencies per decade from `start` to `stop`.
    pub fn decade(points: usize, start: f64, stop: f64) -> Self {
        let mut frequencies = Vec::new();
        if points == 0 || !(start > 0.0) || stop < start {
            return Self { frequencies };
        }
        let ratio = 10f64.powf(1.0 / points as f64);
        let mut f = start;
        // Tolerate rounding on the last point
        while f <= stop * (1.0 + 1e-9) {
            frequencies.push(f);
            f *= ratio;
        }
        Self { frequencies }
    }

    /// `points` linearly spaced frequencies from `start` to `stop`.
    pub fn linear(points: usize, start: f64, stop: f64) -> Self {
        let frequencies = match points {
            0 => Vec::new(),
            1 => vec![start],
            n => (0..n)
                .map(|i| start + (stop - start) * i as f64 / (n - 1) as f64)
                .collect(),
        };
        Self { frequencies }
    }

    /// Check the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.frequencies.is_empty() {
            return Err(EngineError::config("no frequencies to sweep"));
        }
        if self.frequencies.iter().any(|f| !(*f >= 0.0) || !f.is_finite()) {
            return Err(EngineError::config("frequencies must be finite and non-negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_biasing_defaults_validate() {
        let config = BiasingConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.dc_max_iterations, 100);
        assert!(BiasingConfig::new().with_rel_tol(0.0).validate().is_err());
    }

    #[test]
    fn test_time_defaults_derive_steps() {
        let config = TimeConfig::new(1e-6, 1e-3);
        assert_relative_eq!(config.effective_max_step(), 2e-5);
        assert_relative_eq!(config.effective_min_step(), 2e-14);
        assert_relative_eq!(config.initial_step(), 1e-7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_time_validation() {
        assert!(TimeConfig::new(1e-6, 0.0).validate().is_err());
        assert!(TimeConfig::new(0.0, 1.0).validate().is_err());
        let trap3 = TimeConfig::new(1e-6, 1e-3).with_method(MethodKind::Trapezoidal, 3);
        assert!(trap3.validate().is_err());
        let gear6 = TimeConfig::new(1e-6, 1e-3).with_method(MethodKind::Gear, 6);
        assert!(gear6.validate().is_ok());
        let inverted = TimeConfig::new(1e-6, 1e-3).with_max_step(1e-6).with_min_step(1e-5);
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_decade_sweep() {
        let config = FrequencyConfig::decade(10, 1.0, 100.0);
        assert_eq!(config.frequencies.len(), 21);
        assert_relative_eq!(config.frequencies[10], 10.0, epsilon = 1e-9);
        assert!(FrequencyConfig::default().validate().is_err());
    }

    #[test]
    fn test_linear_sweep() {
        let config = FrequencyConfig::linear(5, 0.0, 100.0);
        assert_eq!(config.frequencies, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    }
}
