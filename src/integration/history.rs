//! Fixed-depth history of integration states.

/// Snapshot of one time point.
#[derive(Debug, Clone, Default)]
pub struct IntegrationState {
    /// Step that led to this point
    pub delta: f64,
    /// Solution vector (index 0 is ground)
    pub solution: Vec<f64>,
    /// Derivative state vector: each tracked quantity owns a (value, derivative) pair
    pub state: Vec<f64>,
}

impl IntegrationState {
    /// Create a state with zeroed vectors.
    pub fn new(solution_size: usize, state_size: usize) -> Self {
        Self {
            delta: 0.0,
            solution: vec![0.0; solution_size],
            state: vec![0.0; state_size],
        }
    }
}

/// Ring buffer where index 0 is always the most recent entry.
#[derive(Debug, Clone)]
pub struct History<T> {
    items: Vec<T>,
    head: usize,
}

impl<T: Clone> History<T> {
    /// Create a history of `depth` copies of `value`.
    pub fn new(depth: usize, value: T) -> Self {
        Self {
            items: vec![value; depth.max(1)],
            head: 0,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always `false`: a history holds at least one entry.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn slot(&self, index: usize) -> usize {
        (self.head + index) % self.items.len()
    }

    /// The most recent entry.
    pub fn current(&self) -> &T {
        &self.items[self.head]
    }

    /// The most recent entry, mutably.
    pub fn current_mut(&mut self) -> &mut T {
        let slot = self.head;
        &mut self.items[slot]
    }

    /// The entry `index` steps back (0 is the current entry).
    ///
    /// # Panics
    /// Panics if `index` is not smaller than [`len`](Self::len).
    pub fn previous(&self, index: usize) -> &T {
        assert!(index < self.items.len(), "history index {} out of range", index);
        &self.items[self.slot(index)]
    }

    /// The entry `index` steps back, mutably.
    pub fn previous_mut(&mut self, index: usize) -> &mut T {
        assert!(index < self.items.len(), "history index {} out of range", index);
        let slot = self.slot(index);
        &mut self.items[slot]
    }

    /// Current and previous entries at once.
    pub fn current_and_previous_mut(&mut self) -> (&mut T, &T) {
        let current = self.head;
        let previous = self.slot(1);
        if current == previous {
            panic!("history needs at least two entries");
        }
        if current < previous {
            let (left, right) = self.items.split_at_mut(previous);
            (&mut left[current], &right[0])
        } else {
            let (left, right) = self.items.split_at_mut(current);
            (&mut right[0], &left[previous])
        }
    }

    /// Advance one slot: the oldest entry becomes the current one.
    pub fn cycle(&mut self) {
        let len = self.items.len();
        self.head = (self.head + len - 1) % len;
    }

    /// Iterate from the current entry to the oldest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.items.len()).map(move |i| &self.items[self.slot(i)])
    }

    /// Overwrite every entry with `value`.
    pub fn fill(&mut self, value: &T) {
        for item in &mut self.items {
            item.clone_from(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_moves_current_back() {
        let mut history = History::new(3, 0);
        *history.current_mut() = 1;
        history.cycle();
        *history.current_mut() = 2;
        history.cycle();
        *history.current_mut() = 3;

        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
        history.cycle();
        // Oldest entry is reused as the new current one
        assert_eq!(*history.current(), 1);
        assert_eq!(*history.previous(1), 3);
    }

    #[test]
    fn test_current_and_previous() {
        let mut history = History::new(2, 10);
        history.cycle();
        let (current, previous) = history.current_and_previous_mut();
        *current += *previous;
        assert_eq!(*history.current(), 20);
        assert_eq!(*history.previous(1), 10);
    }
}
