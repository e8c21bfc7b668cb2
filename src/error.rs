//! Error types for the MNA engine.
//!
//! This module provides a unified error type [`EngineError`] that covers
//! all hard failures of the sparse solver, the iteration engine and the
//! analyses built on top of them.
//!
//! Failures that are expected to happen occasionally (a factorization that
//! needs reordering, a Newton-Raphson loop that does not converge) are not
//! errors: they are reported through `bool`/`Option` return values so the
//! caller can apply its retry policy.

use thiserror::Error;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Unified error type for all engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    // ============ Linear Algebra Errors ============
    /// No acceptable pivot could be found, or a pivot was exactly zero
    #[error("Singular matrix at elimination step {step} - circuit may have a floating node or a voltage loop")]
    SingularMatrix { step: usize },

    /// An internal invariant of the solver was violated
    #[error("Algebra error: {message}")]
    Algebra { message: String },

    // ============ Simulation Errors ============
    /// An analysis exhausted all of its convergence aids
    #[error("{analysis} did not converge after {iterations} iterations")]
    ConvergenceFailure {
        analysis: &'static str,
        iterations: usize,
    },

    /// The transient timestep collapsed below the minimum step
    #[error("Timestep too small at t = {time:.6e} s (delta = {delta:.3e} s)")]
    TimestepTooSmall { time: f64, delta: f64 },

    /// The iteration engine was entered in an initialization mode it cannot handle
    #[error("Cannot iterate in initialization mode {mode}")]
    InvalidInitMode { mode: String },

    // ============ Setup Errors ============
    /// Missing or malformed configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Invalid component parameter
    #[error("Invalid parameter '{param}' for component '{component}': {message}")]
    InvalidParameter {
        component: String,
        param: String,
        message: String,
    },

    /// Node not registered with the circuit
    #[error("Node '{name}' not found in circuit")]
    UnknownNode { name: String },
}

impl EngineError {
    /// Create an algebra (invariant violation) error
    pub fn algebra(message: impl Into<String>) -> Self {
        Self::Algebra {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        component: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            component: component.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(analysis: &'static str, iterations: usize) -> Self {
        Self::ConvergenceFailure {
            analysis,
            iterations,
        }
    }

    /// Whether this error is a singular matrix, which callers may retry with
    /// different convergence aids.
    pub fn is_singular(&self) -> bool {
        matches!(self, Self::SingularMatrix { .. })
    }
}
