//! Sparse linear solver.
//!
//! Modified Nodal Analysis assembles a system of equations Ax = z where:
//! - x contains node voltages and branch currents
//! - A is the conductance/coefficient matrix
//! - z is the source vector
//!
//! The matrix structure is:
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   D ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations)
//! - B, C connect voltage sources to nodes
//! - D is usually 0 (for ideal voltage sources)
//!
//! Circuit matrices are very sparse, so A is stored as a [`SparseMatrix`] and
//! factored in place by [`SparseLuSolver`], which picks pivots with the
//! [`Markowitz`] heuristic to keep fill-in low. Index 0 is the ground node and
//! never takes part in the system.

mod dense;
mod field;
mod lu;
mod markowitz;
mod matrix;
mod translation;
mod vector;

pub use dense::DenseLu;
pub use field::Field;
pub use lu::{
    ComplexSolver, Listener, ListenerId, Preconditioner, RealSolver, SolverEvent, SparseLuSolver,
};
pub use markowitz::{Markowitz, DEFAULT_ABS_THRESHOLD, DEFAULT_REL_THRESHOLD};
pub use matrix::{Axis, ElementId, SparseMatrix, Swap};
pub use translation::Translation;
pub use vector::{RhsId, RhsVector};
