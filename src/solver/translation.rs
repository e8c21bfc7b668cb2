//! Translation between external (unknown) indices and internal matrix indices.

/// A permutation of `1..=size` with index 0 pinned to ground.
#[derive(Debug, Clone)]
pub struct Translation {
    /// External -> internal
    forward: Vec<usize>,
    /// Internal -> external
    reverse: Vec<usize>,
}

impl Default for Translation {
    fn default() -> Self {
        Self::new()
    }
}

impl Translation {
    /// Create the identity translation over the ground node only.
    pub fn new() -> Self {
        Self {
            forward: vec![0],
            reverse: vec![0],
        }
    }

    /// Number of translated indices, excluding ground.
    pub fn size(&self) -> usize {
        self.forward.len() - 1
    }

    /// Extend with identity entries up to `size`.
    pub fn ensure_size(&mut self, size: usize) {
        while self.size() < size {
            let index = self.forward.len();
            self.forward.push(index);
            self.reverse.push(index);
        }
    }

    /// Internal index of an external index.
    pub fn internal(&self, external: usize) -> usize {
        self.forward[external]
    }

    /// External index of an internal index.
    pub fn external(&self, internal: usize) -> usize {
        self.reverse[internal]
    }

    /// Record that internal indices `first` and `second` were swapped.
    pub fn swap(&mut self, first: usize, second: usize) {
        if first == second {
            return;
        }
        self.reverse.swap(first, second);
        self.forward[self.reverse[first]] = first;
        self.forward[self.reverse[second]] = second;
    }

    /// Check that both directions form the same bijection.
    pub fn is_consistent(&self) -> bool {
        if self.forward[0] != 0 || self.reverse[0] != 0 {
            return false;
        }
        let mut seen = vec![false; self.forward.len()];
        for (external, &internal) in self.forward.iter().enumerate() {
            if internal >= seen.len() || seen[internal] || self.reverse[internal] != external {
                return false;
            }
            seen[internal] = true;
        }
        true
    }
}
