//! Right-hand-side vector with stable element handles.
//!
//! The vector follows the row permutation of the matrix it is paired with,
//! so its entries are stored in slots that never move; only the mapping from
//! internal index to slot is swapped.

use super::field::Field;

/// Stable handle to a right-hand-side vector element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RhsId(pub(crate) usize);

impl RhsId {
    /// Element that absorbs all contributions to the ground row.
    pub const TRASH: RhsId = RhsId(0);

    /// Check if this handle points at the ground trash element.
    pub fn is_trash(&self) -> bool {
        self.0 == 0
    }
}

/// Dense vector addressed by internal index, with handles that survive swaps.
#[derive(Debug, Clone)]
pub struct RhsVector<T: Field> {
    values: Vec<T>,
    /// Internal index -> slot
    slot_at: Vec<usize>,
    /// Slot -> internal index
    index_of: Vec<usize>,
}

impl<T: Field> Default for RhsVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Field> RhsVector<T> {
    /// Create an empty vector (ground slot only).
    pub fn new() -> Self {
        Self {
            values: vec![T::zero()],
            slot_at: vec![0],
            index_of: vec![0],
        }
    }

    /// Number of entries, excluding ground.
    pub fn size(&self) -> usize {
        self.values.len() - 1
    }

    /// Grow the vector to at least `size` entries.
    pub fn ensure_size(&mut self, size: usize) {
        while self.size() < size {
            let slot = self.values.len();
            self.values.push(T::zero());
            self.slot_at.push(slot);
            self.index_of.push(slot);
        }
    }

    /// Get the handle of the element at internal `index`.
    pub fn get_element(&mut self, index: usize) -> RhsId {
        if index == 0 {
            return RhsId::TRASH;
        }
        self.ensure_size(index);
        RhsId(self.slot_at[index])
    }

    /// Current internal index of a handle.
    pub fn index_of(&self, id: RhsId) -> usize {
        self.index_of[id.0]
    }

    /// Value behind a handle.
    pub fn value(&self, id: RhsId) -> T {
        self.values[id.0]
    }

    /// Add to the value behind a handle.
    pub fn add(&mut self, id: RhsId, value: T) {
        self.values[id.0] += value;
    }

    /// Value at internal `index`.
    pub fn at(&self, index: usize) -> T {
        self.values[self.slot_at[index]]
    }

    /// Overwrite the value at internal `index`.
    pub fn set_at(&mut self, index: usize, value: T) {
        let slot = self.slot_at[index];
        self.values[slot] = value;
    }

    /// Swap the entries at two internal indices.
    pub fn swap_elements(&mut self, first: usize, second: usize) {
        if first == second {
            return;
        }
        self.slot_at.swap(first, second);
        self.index_of[self.slot_at[first]] = first;
        self.index_of[self.slot_at[second]] = second;
    }

    /// Zero every entry.
    pub fn reset(&mut self) {
        self.values.fill(T::zero());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_survive_swaps() {
        let mut v = RhsVector::<f64>::new();
        let a = v.get_element(1);
        let b = v.get_element(3);
        v.add(a, 1.0);
        v.add(b, 3.0);

        v.swap_elements(1, 3);
        assert_eq!(v.index_of(a), 3);
        assert_eq!(v.index_of(b), 1);
        assert_eq!(v.at(1), 3.0);
        assert_eq!(v.at(3), 1.0);
        assert_eq!(v.value(a), 1.0);
    }

    #[test]
    fn test_ground_is_trash() {
        let mut v = RhsVector::<f64>::new();
        assert!(v.get_element(0).is_trash());
        assert_eq!(v.size(), 0);
    }
}
