//! Numerical integration for transient analysis.
//!
//! Reactive elements are discretized with a multistep formula. The
//! [`IntegrationMethod`] keeps a short history of past solutions, derives the
//! coefficients of the current step from it, predicts the next solution and
//! bounds the next step by the local truncation error. A [`Breakpoints`]
//! schedule makes sure known discontinuities are hit exactly.

mod breakpoints;
mod history;
mod method;

pub use breakpoints::Breakpoints;
pub use history::{History, IntegrationState};
pub use method::{
    IntegrationMethod, IntegrationParameters, JacobianInfo, MethodKind, StateDerivative,
};
