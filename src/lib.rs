//! # MNA Engine
//!
//! The numerical core of a circuit simulator.
//!
//! This library provides:
//! - A sparse LU solver with Markowitz pivoting, generic over real and complex values
//! - Multistep integration (trapezoidal and Gear) with truncation error step control
//! - A Newton-Raphson iteration engine with junction initialization, Gmin and
//!   source stepping
//! - DC operating point, transient and small-signal AC analyses
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`solver`] - Sparse matrix store, pivot strategy and LU factorization
//! - [`integration`] - Integration methods, history and breakpoints
//! - [`simulation`] - Iteration engine and analyses
//! - [`circuit`] - Unknown registry and the circuit container
//! - [`components`] - Component models (resistors, capacitors, sources, diodes)
//!
//! ## Usage
//!
//! ```no_run
//! use mna_engine::components::{Resistor, VoltageSource};
//! use mna_engine::simulation::{operating_point, BiasingConfig};
//! use mna_engine::Circuit;
//!
//! # fn main() -> mna_engine::Result<()> {
//! let mut circuit = Circuit::new();
//! circuit.add(VoltageSource::new("V1", "in", "0", 5.0)?)?;
//! circuit.add(Resistor::new("R1", "in", "out", 1e3)?)?;
//! circuit.add(Resistor::new("R2", "out", "0", 1e3)?)?;
//!
//! let op = operating_point(circuit, BiasingConfig::default())?;
//! println!("V(out) = {}", op.voltage("out")?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Circuit Simulation Method
//!
//! Components stamp their linearized contribution into `A x = b` through
//! element handles obtained once while binding. Each Newton-Raphson
//! iteration:
//!
//! 1. Clears and reloads the matrix and right-hand side
//! 2. Factors, reusing the previous pivot order when it is still acceptable
//! 3. Solves for node voltages and branch currents
//! 4. Checks node and device convergence
//!
//! In the time domain, reactive elements are discretized by the active
//! integration method and the step is adapted to the local truncation error.

pub mod circuit;
pub mod components;
pub mod error;
pub mod integration;
pub mod simulation;
pub mod solver;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{EngineError, Result};
pub use simulation::{AcAnalysis, Simulation, Transient};

/// Thermal voltage kT/q at 300.15 K
pub const THERMAL_VOLTAGE: f64 = 0.025864186;
