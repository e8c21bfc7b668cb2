//! Circuit components.
//!
//! Every component implements [`Behavior`](crate::simulation::Behavior) and
//! stamps itself into the MNA system through element handles obtained while
//! binding:
//!
//! - [`Resistor`], [`Capacitor`], [`Inductor`]: linear passives
//! - [`VoltageSource`], [`CurrentSource`]: independent sources with optional
//!   time-dependent [`Waveform`]s and AC excitation
//! - [`Diode`]: Shockley junction with voltage limiting

mod diode;
mod linear;
mod sources;
mod waveform;

pub use diode::{Diode, DiodeParams};
pub use linear::{Capacitor, Inductor, Resistor};
pub use sources::{CurrentSource, VoltageSource};
pub use waveform::{Pulse, Waveform};

use crate::error::{EngineError, Result};
use crate::solver::{ElementId, Field, SparseLuSolver};

/// The four matrix entries touched by a conductance between two nodes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConductanceStamp {
    pp: ElementId,
    pn: ElementId,
    np: ElementId,
    nn: ElementId,
}

impl Default for ConductanceStamp {
    fn default() -> Self {
        Self {
            pp: ElementId::TRASH,
            pn: ElementId::TRASH,
            np: ElementId::TRASH,
            nn: ElementId::TRASH,
        }
    }
}

impl ConductanceStamp {
    /// Fetch the handles for nodes `pos` and `neg` through `element`.
    pub fn new(mut element: impl FnMut(usize, usize) -> ElementId, pos: usize, neg: usize) -> Self {
        Self {
            pp: element(pos, pos),
            pn: element(pos, neg),
            np: element(neg, pos),
            nn: element(neg, neg),
        }
    }

    pub fn load<T: Field>(&self, solver: &mut SparseLuSolver<T>, g: T) {
        solver.add(self.pp, g);
        solver.add(self.nn, g);
        solver.add(self.pn, -g);
        solver.add(self.np, -g);
    }
}

/// The four ±1 entries coupling a branch current to its two nodes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BranchStamp {
    pos_branch: ElementId,
    neg_branch: ElementId,
    branch_pos: ElementId,
    branch_neg: ElementId,
}

impl Default for BranchStamp {
    fn default() -> Self {
        Self {
            pos_branch: ElementId::TRASH,
            neg_branch: ElementId::TRASH,
            branch_pos: ElementId::TRASH,
            branch_neg: ElementId::TRASH,
        }
    }
}

impl BranchStamp {
    pub fn new(
        mut element: impl FnMut(usize, usize) -> ElementId,
        pos: usize,
        neg: usize,
        branch: usize,
    ) -> Self {
        Self {
            pos_branch: element(pos, branch),
            neg_branch: element(neg, branch),
            branch_pos: element(branch, pos),
            branch_neg: element(branch, neg),
        }
    }

    pub fn load<T: Field>(&self, solver: &mut SparseLuSolver<T>) {
        let one = T::one();
        solver.add(self.pos_branch, one);
        solver.add(self.neg_branch, -one);
        solver.add(self.branch_pos, one);
        solver.add(self.branch_neg, -one);
    }
}

/// Reject non-finite or non-positive parameter values.
pub(crate) fn require_positive(component: &str, param: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(EngineError::invalid_parameter(
            component,
            param,
            format!("must be positive, got {}", value),
        ))
    }
}
