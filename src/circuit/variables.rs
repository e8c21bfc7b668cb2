//! Registry of circuit unknowns.

use std::collections::HashMap;

use super::types::{Variable, VariableKind};
use crate::error::{EngineError, Result};

/// Names accepted for the ground node.
const GROUND_NAMES: [&str; 3] = ["0", "GND", "gnd"];

/// Maps node and branch names to solution vector indices.
///
/// Index 0 is always ground; every other unknown gets the next free index in
/// the order it is first requested.
#[derive(Debug, Clone)]
pub struct VariableMap {
    map: HashMap<String, usize>,
    variables: Vec<Variable>,
}

impl Default for VariableMap {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableMap {
    /// Create a map holding only ground.
    pub fn new() -> Self {
        let mut map = HashMap::new();
        for name in GROUND_NAMES {
            map.insert(name.to_string(), 0);
        }
        Self {
            map,
            variables: vec![Variable::voltage("0")],
        }
    }

    /// Index of node `name`, registering it on first use.
    pub fn map_node(&mut self, name: &str) -> usize {
        if let Some(&index) = self.map.get(name) {
            return index;
        }
        self.push(Variable::voltage(name))
    }

    /// Register a new branch current.
    pub fn create_branch(&mut self, name: &str) -> Result<usize> {
        if self.map.contains_key(name) {
            return Err(EngineError::config(format!(
                "unknown '{}' is already defined",
                name
            )));
        }
        Ok(self.push(Variable::current(name)))
    }

    fn push(&mut self, variable: Variable) -> usize {
        let index = self.variables.len();
        self.map.insert(variable.name.clone(), index);
        self.variables.push(variable);
        index
    }

    /// Look up an unknown by name.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.map.get(name).copied()
    }

    /// Look up an unknown by name, failing with [`EngineError::UnknownNode`].
    pub fn index(&self, name: &str) -> Result<usize> {
        self.find(name).ok_or_else(|| EngineError::UnknownNode {
            name: name.to_string(),
        })
    }

    /// The unknown at `index`.
    pub fn get(&self, index: usize) -> Option<&Variable> {
        self.variables.get(index)
    }

    pub fn kind(&self, index: usize) -> Option<VariableKind> {
        self.variables.get(index).map(|v| v.kind)
    }

    /// Number of unknowns, excluding ground.
    pub fn size(&self) -> usize {
        self.variables.len() - 1
    }

    /// All unknowns, ground first.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Variable)> + '_ {
        self.variables.iter().enumerate()
    }

    /// Indices of every node voltage except ground.
    pub fn voltage_indices(&self) -> Vec<usize> {
        self.iter()
            .skip(1)
            .filter(|(_, v)| v.is_voltage())
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_aliases() {
        let mut map = VariableMap::new();
        assert_eq!(map.map_node("0"), 0);
        assert_eq!(map.map_node("GND"), 0);
        assert_eq!(map.size(), 0);
    }

    #[test]
    fn test_indices_follow_registration_order() {
        let mut map = VariableMap::new();
        assert_eq!(map.map_node("in"), 1);
        assert_eq!(map.create_branch("V1#branch").unwrap(), 2);
        assert_eq!(map.map_node("out"), 3);
        assert_eq!(map.map_node("in"), 1);
        assert_eq!(map.kind(2), Some(VariableKind::Current));
        assert_eq!(map.voltage_indices(), vec![1, 3]);
    }

    #[test]
    fn test_duplicate_branch_rejected() {
        let mut map = VariableMap::new();
        map.create_branch("L1#branch").unwrap();
        assert!(map.create_branch("L1#branch").is_err());
    }

    #[test]
    fn test_unknown_node() {
        let map = VariableMap::new();
        assert!(matches!(
            map.index("missing"),
            Err(EngineError::UnknownNode { .. })
        ));
    }
}
