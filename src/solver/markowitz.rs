//! Markowitz pivot selection.
//!
//! At elimination step `k` the active submatrix is rows and columns `k..=size`.
//! Each candidate is scored by its Markowitz product
//! `(row_count - 1) * (column_count - 1)`, an upper bound on the fill-in its
//! elimination can create. Candidates that are small compared to the largest
//! entry of their row are rejected to keep the elimination stable.

use super::field::Field;
use super::matrix::{ElementId, SparseMatrix};

/// Default relative pivot threshold.
pub const DEFAULT_REL_THRESHOLD: f64 = 1e-3;

/// Default absolute pivot threshold.
pub const DEFAULT_ABS_THRESHOLD: f64 = 0.0;

/// Markowitz pivot strategy with incrementally maintained counts.
#[derive(Debug, Clone)]
pub struct Markowitz {
    /// A pivot must be at least this fraction of the largest entry in its row
    pub rel_threshold: f64,
    /// A pivot must be strictly larger than this magnitude
    pub abs_threshold: f64,
    row_counts: Vec<usize>,
    column_counts: Vec<usize>,
}

impl Default for Markowitz {
    fn default() -> Self {
        Self::new(DEFAULT_REL_THRESHOLD, DEFAULT_ABS_THRESHOLD)
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: ElementId,
    product: usize,
    magnitude: f64,
    distance: usize,
}

impl Candidate {
    fn beats(&self, other: &Candidate) -> bool {
        if self.product != other.product {
            return self.product < other.product;
        }
        if self.magnitude != other.magnitude {
            return self.magnitude > other.magnitude;
        }
        self.distance < other.distance
    }
}

impl Markowitz {
    /// Create a strategy with the given thresholds.
    pub fn new(rel_threshold: f64, abs_threshold: f64) -> Self {
        Self {
            rel_threshold,
            abs_threshold,
            row_counts: Vec::new(),
            column_counts: Vec::new(),
        }
    }

    /// Nonzero count of an active row.
    pub fn row_count(&self, row: usize) -> usize {
        self.row_counts.get(row).copied().unwrap_or(0)
    }

    /// Nonzero count of an active column.
    pub fn column_count(&self, column: usize) -> usize {
        self.column_counts.get(column).copied().unwrap_or(0)
    }

    /// Markowitz product of a position in the active submatrix.
    pub fn product(&self, row: usize, column: usize) -> usize {
        self.row_count(row).saturating_sub(1) * self.column_count(column).saturating_sub(1)
    }

    /// Count the nonzeros of the active submatrix starting at `step`.
    pub fn setup<T: Field>(&mut self, matrix: &SparseMatrix<T>, step: usize) {
        let size = matrix.size();
        self.row_counts = vec![0; size + 1];
        self.column_counts = vec![0; size + 1];

        for index in step..=size {
            self.row_counts[index] = matrix
                .row(index)
                .iter()
                .filter(|&&id| matrix.column_of(id) >= step)
                .count();
            self.column_counts[index] = matrix
                .column(index)
                .iter()
                .filter(|&&id| matrix.row_of(id) >= step)
                .count();
        }
    }

    /// Largest magnitude in `row` among columns `step..`.
    fn row_max<T: Field>(matrix: &SparseMatrix<T>, row: usize, step: usize) -> f64 {
        matrix
            .row(row)
            .iter()
            .filter(|&&id| matrix.column_of(id) >= step)
            .map(|&id| matrix.value(id).magnitude())
            .fold(0.0, f64::max)
    }

    fn acceptable(&self, magnitude: f64, row_max: f64) -> bool {
        magnitude > self.abs_threshold && magnitude > 0.0 && magnitude >= self.rel_threshold * row_max
    }

    /// Check whether `pivot`, already on the diagonal at `step`, is still usable.
    pub fn is_valid_pivot<T: Field>(
        &self,
        matrix: &SparseMatrix<T>,
        pivot: ElementId,
        step: usize,
    ) -> bool {
        let magnitude = matrix.value(pivot).magnitude();
        let row_max = Self::row_max(matrix, matrix.row_of(pivot), step);
        self.acceptable(magnitude, row_max)
    }

    /// Search the active submatrix for the best pivot.
    pub fn find_pivot<T: Field>(&self, matrix: &SparseMatrix<T>, step: usize) -> Option<ElementId> {
        let size = matrix.size();
        let mut row_max = vec![0.0; size + 1];
        for (row, max) in row_max.iter_mut().enumerate().skip(step) {
            *max = Self::row_max(matrix, row, step);
        }

        let mut best: Option<Candidate> = None;
        for column in step..=size {
            let members = matrix.column(column);
            let first = members.partition_point(|&id| matrix.row_of(id) < step);
            for &id in &members[first..] {
                let row = matrix.row_of(id);
                let magnitude = matrix.value(id).magnitude();
                if !self.acceptable(magnitude, row_max[row]) {
                    continue;
                }
                let candidate = Candidate {
                    id,
                    product: self.product(row, column),
                    magnitude,
                    distance: row.abs_diff(column),
                };
                if best.map_or(true, |b| candidate.beats(&b)) {
                    best = Some(candidate);
                }
            }
        }
        best.map(|c| c.id)
    }

    /// Mirror the row/column swaps that are about to bring `pivot` to `step`.
    pub fn move_pivot<T: Field>(&mut self, matrix: &SparseMatrix<T>, pivot: ElementId, step: usize) {
        let row = matrix.row_of(pivot);
        let column = matrix.column_of(pivot);
        self.row_counts.swap(row, step);
        self.column_counts.swap(column, step);
    }

    /// Remove the pivot row and column from the active counts.
    pub fn update<T: Field>(&mut self, matrix: &SparseMatrix<T>, pivot: ElementId, step: usize) {
        debug_assert_eq!(matrix.row_of(pivot), step);
        for &id in matrix.row(step) {
            let column = matrix.column_of(id);
            if column > step {
                self.column_counts[column] = self.column_counts[column].saturating_sub(1);
            }
        }
        for &id in matrix.column(step) {
            let row = matrix.row_of(id);
            if row > step {
                self.row_counts[row] = self.row_counts[row].saturating_sub(1);
            }
        }
    }

    /// Account for a fill-in element created by elimination.
    pub fn create_fillin<T: Field>(&mut self, matrix: &SparseMatrix<T>, fillin: ElementId) {
        let row = matrix.row_of(fillin);
        let column = matrix.column_of(fillin);
        if let Some(count) = self.row_counts.get_mut(row) {
            *count += 1;
        }
        if let Some(count) = self.column_counts.get_mut(column) {
            *count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Arrow matrix: dense first row and column, diagonal elsewhere.
    fn arrow(size: usize) -> SparseMatrix<f64> {
        let mut m = SparseMatrix::new();
        for i in 1..=size {
            let d = m.get_element(i, i);
            m.set_value(d, 4.0);
            if i > 1 {
                let r = m.get_element(1, i);
                let c = m.get_element(i, 1);
                m.set_value(r, 1.0);
                m.set_value(c, 1.0);
            }
        }
        m
    }

    #[test]
    fn test_setup_counts() {
        let m = arrow(4);
        let mut s = Markowitz::default();
        s.setup(&m, 1);
        assert_eq!(s.row_count(1), 4);
        assert_eq!(s.column_count(1), 4);
        assert_eq!(s.row_count(3), 2);
        assert_eq!(s.product(1, 1), 9);
        assert_eq!(s.product(2, 2), 1);
    }

    #[test]
    fn test_find_pivot_avoids_dense_row() {
        let m = arrow(4);
        let mut s = Markowitz::default();
        s.setup(&m, 1);
        let pivot = s.find_pivot(&m, 1).unwrap();
        assert_ne!(m.row_of(pivot), 1);
        assert_eq!(m.row_of(pivot), m.column_of(pivot));
    }

    #[test]
    fn test_threshold_rejects_small_entries() {
        let mut m = SparseMatrix::new();
        let a = m.get_element(1, 1);
        let b = m.get_element(1, 2);
        let c = m.get_element(2, 1);
        m.set_value(a, 1e-9);
        m.set_value(b, 1.0);
        m.set_value(c, 1.0);
        let mut s = Markowitz::default();
        s.setup(&m, 1);
        assert!(!s.is_valid_pivot(&m, a, 1));
        let pivot = s.find_pivot(&m, 1).unwrap();
        assert!(pivot == b || pivot == c);
    }

    #[test]
    fn test_empty_row_has_no_pivot() {
        let mut m = SparseMatrix::<f64>::new();
        m.get_element(1, 1);
        m.ensure_size(2);
        let mut s = Markowitz::default();
        s.setup(&m, 1);
        assert!(s.find_pivot(&m, 1).is_none());
    }
}
