//! Core types for circuit unknowns.

use std::fmt;

/// Physical meaning of an unknown in the solution vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Node voltage
    Voltage,
    /// Branch current (voltage sources, inductors)
    Current,
}

/// A named unknown. Its position in the solution vector is its index in the
/// owning [`VariableMap`](super::VariableMap).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
}

impl Variable {
    /// Create a node voltage unknown.
    pub fn voltage(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Voltage,
        }
    }

    /// Create a branch current unknown.
    pub fn current(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Current,
        }
    }

    /// Check if this is a node voltage.
    pub fn is_voltage(&self) -> bool {
        self.kind == VariableKind::Voltage
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            VariableKind::Voltage => write!(f, "V({})", self.name),
            VariableKind::Current => write!(f, "I({})", self.name),
        }
    }
}
