//! Sparse matrix storage.
//!
//! Elements live in an arena and are never moved or removed; the handle a
//! collaborator receives ([`ElementId`]) is an arena slot and stays valid for
//! the lifetime of the matrix. Row and column identity are labels on the
//! element, and each row/column keeps a membership list sorted by the other
//! index, so "the next nonzero in this row" is simply the next list entry.
//!
//! Index 0 is the ground node. Requests touching row or column 0 resolve to a
//! dedicated trash element whose value is never read back.

use super::field::Field;

/// Stable handle to a matrix element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) usize);

impl ElementId {
    /// Element that absorbs all contributions to the ground row/column.
    pub const TRASH: ElementId = ElementId(0);

    /// Check if this handle points at the ground trash element.
    pub fn is_trash(&self) -> bool {
        self.0 == 0
    }
}

/// Row or column direction of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Columns,
}

/// Notification emitted after two rows or two columns have been swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swap {
    pub axis: Axis,
    pub first: usize,
    pub second: usize,
}

#[derive(Debug, Clone)]
struct Element<T> {
    row: usize,
    column: usize,
    value: T,
}

/// A square sparse matrix with stable element handles.
#[derive(Debug, Clone)]
pub struct SparseMatrix<T: Field> {
    elements: Vec<Element<T>>,
    /// Row membership, sorted by column. Index 0 is unused.
    rows: Vec<Vec<ElementId>>,
    /// Column membership, sorted by row. Index 0 is unused.
    columns: Vec<Vec<ElementId>>,
    diagonal: Vec<Option<ElementId>>,
    size: usize,
}

impl<T: Field> Default for SparseMatrix<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Field> SparseMatrix<T> {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self {
            elements: vec![Element {
                row: 0,
                column: 0,
                value: T::zero(),
            }],
            rows: vec![Vec::new()],
            columns: vec![Vec::new()],
            diagonal: vec![None],
            size: 0,
        }
    }

    /// Create an empty matrix that already spans `size` rows and columns.
    pub fn with_size(size: usize) -> Self {
        let mut matrix = Self::new();
        matrix.ensure_size(size);
        matrix
    }

    /// Number of rows (and columns), excluding ground.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of stored elements, excluding the trash element.
    pub fn element_count(&self) -> usize {
        self.elements.len() - 1
    }

    /// Grow the matrix so that it spans at least `size` rows and columns.
    pub fn ensure_size(&mut self, size: usize) {
        while self.size < size {
            self.rows.push(Vec::new());
            self.columns.push(Vec::new());
            self.diagonal.push(None);
            self.size += 1;
        }
    }

    /// Find the element at (row, column) without creating it.
    pub fn find_element(&self, row: usize, column: usize) -> Option<ElementId> {
        if row == 0 || column == 0 || row > self.size || column > self.size {
            return None;
        }
        if row == column {
            return self.diagonal[row];
        }
        let members = &self.rows[row];
        members
            .binary_search_by_key(&column, |id| self.elements[id.0].column)
            .ok()
            .map(|pos| members[pos])
    }

    /// Get the element at (row, column), creating a zero-valued one if needed.
    pub fn get_element(&mut self, row: usize, column: usize) -> ElementId {
        if row == 0 || column == 0 {
            return ElementId::TRASH;
        }
        self.ensure_size(row.max(column));
        if let Some(id) = self.find_element(row, column) {
            return id;
        }

        let id = ElementId(self.elements.len());
        self.elements.push(Element {
            row,
            column,
            value: T::zero(),
        });

        let Self {
            elements,
            rows,
            columns,
            ..
        } = self;
        let pos = rows[row]
            .binary_search_by_key(&column, |e| elements[e.0].column)
            .unwrap_or_else(|p| p);
        rows[row].insert(pos, id);
        let pos = columns[column]
            .binary_search_by_key(&row, |e| elements[e.0].row)
            .unwrap_or_else(|p| p);
        columns[column].insert(pos, id);

        if row == column {
            self.diagonal[row] = Some(id);
        }
        id
    }

    /// Get the diagonal element at `index`, if present.
    pub fn find_diagonal_element(&self, index: usize) -> Option<ElementId> {
        self.diagonal.get(index).copied().flatten()
    }

    /// Current row of an element.
    pub fn row_of(&self, id: ElementId) -> usize {
        self.elements[id.0].row
    }

    /// Current column of an element.
    pub fn column_of(&self, id: ElementId) -> usize {
        self.elements[id.0].column
    }

    /// Value of an element.
    pub fn value(&self, id: ElementId) -> T {
        self.elements[id.0].value
    }

    /// Overwrite the value of an element.
    pub fn set_value(&mut self, id: ElementId, value: T) {
        self.elements[id.0].value = value;
    }

    /// Add to the value of an element.
    pub fn add(&mut self, id: ElementId, value: T) {
        self.elements[id.0].value += value;
    }

    /// Elements of a row, ordered by increasing column.
    pub fn row(&self, row: usize) -> &[ElementId] {
        &self.rows[row]
    }

    /// Elements of a column, ordered by increasing row.
    pub fn column(&self, column: usize) -> &[ElementId] {
        &self.columns[column]
    }

    /// Zero every stored value while keeping the sparsity pattern.
    pub fn reset(&mut self) {
        for element in &mut self.elements {
            element.value = T::zero();
        }
    }

    /// Swap two rows, relabelling their elements, then notify.
    pub fn swap_rows(&mut self, first: usize, second: usize, mut notify: impl FnMut(Swap)) {
        if first == second {
            return;
        }
        debug_assert!(first > 0 && second > 0 && first <= self.size && second <= self.size);

        for &id in &self.rows[first] {
            self.elements[id.0].row = second;
        }
        for &id in &self.rows[second] {
            self.elements[id.0].row = first;
        }
        self.rows.swap(first, second);

        // Column order changed wherever one of the two rows had an entry
        let Self {
            elements,
            rows,
            columns,
            ..
        } = self;
        for id in rows[first].iter().chain(rows[second].iter()) {
            let column = elements[id.0].column;
            columns[column].sort_unstable_by_key(|e| elements[e.0].row);
        }

        self.refresh_diagonal(first);
        self.refresh_diagonal(second);
        notify(Swap {
            axis: Axis::Rows,
            first,
            second,
        });
    }

    /// Swap two columns, relabelling their elements, then notify.
    pub fn swap_columns(&mut self, first: usize, second: usize, mut notify: impl FnMut(Swap)) {
        if first == second {
            return;
        }
        debug_assert!(first > 0 && second > 0 && first <= self.size && second <= self.size);

        for &id in &self.columns[first] {
            self.elements[id.0].column = second;
        }
        for &id in &self.columns[second] {
            self.elements[id.0].column = first;
        }
        self.columns.swap(first, second);

        let Self {
            elements,
            rows,
            columns,
            ..
        } = self;
        for id in columns[first].iter().chain(columns[second].iter()) {
            let row = elements[id.0].row;
            rows[row].sort_unstable_by_key(|e| elements[e.0].column);
        }

        self.refresh_diagonal(first);
        self.refresh_diagonal(second);
        notify(Swap {
            axis: Axis::Columns,
            first,
            second,
        });
    }

    fn refresh_diagonal(&mut self, index: usize) {
        let found = self.rows[index]
            .binary_search_by_key(&index, |e| self.elements[e.0].column)
            .ok()
            .map(|pos| self.rows[index][pos]);
        self.diagonal[index] = found;
    }

    /// Dense copy of the matrix in internal ordering (row 0 / column 0 omitted).
    pub fn to_dense(&self) -> Vec<Vec<T>> {
        let mut dense = vec![vec![T::zero(); self.size]; self.size];
        for element in self.elements.iter().skip(1) {
            dense[element.row - 1][element.column - 1] = element.value;
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (SparseMatrix<f64>, Vec<ElementId>) {
        let mut m = SparseMatrix::new();
        let ids = vec![
            m.get_element(1, 1),
            m.get_element(1, 3),
            m.get_element(2, 2),
            m.get_element(3, 1),
            m.get_element(3, 3),
        ];
        for (k, &id) in ids.iter().enumerate() {
            m.set_value(id, (k + 1) as f64);
        }
        (m, ids)
    }

    #[test]
    fn test_get_element_is_stable() {
        let (mut m, ids) = sample();
        assert_eq!(m.size(), 3);
        assert_eq!(m.element_count(), 5);
        assert_eq!(m.get_element(1, 3), ids[1]);
        assert_eq!(m.find_element(2, 3), None);
        assert_eq!(m.get_element(0, 2), ElementId::TRASH);
        assert!(m.find_element(0, 0).is_none());
    }

    #[test]
    fn test_rows_and_columns_are_sorted() {
        let mut m = SparseMatrix::<f64>::new();
        let a = m.get_element(2, 3);
        let b = m.get_element(2, 1);
        let c = m.get_element(1, 1);
        assert_eq!(m.row(2), &[b, a]);
        assert_eq!(m.column(1), &[c, b]);
    }

    #[test]
    fn test_swap_rows_relabels() {
        let (mut m, ids) = sample();
        let mut seen = Vec::new();
        m.swap_rows(1, 3, |s| seen.push(s));

        assert_eq!(seen, vec![Swap { axis: Axis::Rows, first: 1, second: 3 }]);
        assert_eq!(m.row_of(ids[0]), 3);
        assert_eq!(m.find_element(3, 1), Some(ids[0]));
        assert_eq!(m.find_element(1, 1), Some(ids[3]));
        assert_eq!(m.find_diagonal_element(1), Some(ids[3]));
        assert_eq!(m.find_diagonal_element(3), Some(ids[1]));
        // Column 1 holds rows 1 (old row 3) and 3 (old row 1), still sorted
        assert_eq!(m.column(1), &[ids[3], ids[0]]);
        assert_eq!(m.value(ids[0]), 1.0);
    }

    #[test]
    fn test_swap_columns_relabels() {
        let (mut m, ids) = sample();
        m.swap_columns(2, 3, |_| {});
        assert_eq!(m.find_element(1, 2), Some(ids[1]));
        assert_eq!(m.find_element(2, 3), Some(ids[2]));
        assert_eq!(m.find_diagonal_element(2), None);
        assert_eq!(m.row(3), &[ids[3], ids[4]]);
    }

    #[test]
    fn test_reset_keeps_pattern() {
        let (mut m, ids) = sample();
        m.reset();
        assert_eq!(m.element_count(), 5);
        assert!(ids.iter().all(|&id| m.value(id) == 0.0));
    }
}
