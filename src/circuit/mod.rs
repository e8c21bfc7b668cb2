//! Circuit description.
//!
//! A [`Circuit`] is an ordered list of component behaviors. Node names are
//! only resolved when a simulation binds the circuit, which fills a
//! [`VariableMap`] with one unknown per node and per branch current.

mod types;
mod variables;

pub use types::{Variable, VariableKind};
pub use variables::VariableMap;

use std::collections::HashSet;

use crate::error::{EngineError, Result};
use crate::simulation::Behavior;

/// A set of components ready to be simulated.
#[derive(Default)]
pub struct Circuit {
    behaviors: Vec<Box<dyn Behavior>>,
    names: HashSet<String>,
}

impl std::fmt::Debug for Circuit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Circuit")
            .field("components", &self.behaviors.iter().map(|b| b.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Circuit {
    /// Create an empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component. Names must be unique.
    pub fn add(&mut self, behavior: impl Behavior + 'static) -> Result<()> {
        self.add_boxed(Box::new(behavior))
    }

    /// Add an already boxed component.
    pub fn add_boxed(&mut self, behavior: Box<dyn Behavior>) -> Result<()> {
        if !self.names.insert(behavior.name().to_string()) {
            return Err(EngineError::config(format!(
                "component '{}' is defined twice",
                behavior.name()
            )));
        }
        self.behaviors.push(behavior);
        Ok(())
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, behavior: impl Behavior + 'static) -> Result<Self> {
        self.add(behavior)?;
        Ok(self)
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Check whether a component with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub(crate) fn into_behaviors(self) -> Vec<Box<dyn Behavior>> {
        self.behaviors
    }
}
