//! Analyses built on the sparse solver.
//!
//! [`Simulation`] binds a circuit and owns the Newton-Raphson iteration used
//! for the DC operating point. [`Transient`] adds numerical integration on
//! top of it and [`AcAnalysis`] solves the complex small-signal system around
//! the operating point. Independent runs can be spread over threads with the
//! functions in [`sweep`].

mod ac;
mod behavior;
mod biasing;
mod config;
mod newton;
mod state;
pub mod sweep;
mod transient;

pub use ac::{AcAnalysis, AcResult};
pub use behavior::{
    Behavior, BindContext, ConvergenceContext, Frequency, FrequencyContext, Integrate,
    LoadContext, Stamps,
};
pub use biasing::{operating_point, OpResult, Simulation, Statistics};
pub use config::{BiasingConfig, FrequencyConfig, TimeConfig};
pub use state::{BiasingState, Domain, InitMode};
pub use transient::{Transient, TransientResult};
