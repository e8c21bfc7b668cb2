//! Sparse LU solver with dynamic pivoting.
//!
//! The solver owns a [`SparseMatrix`], its paired [`RhsVector`] and the row and
//! column [`Translation`]s. Collaborators address elements by external index;
//! the solver translates through the current permutation, so reordering is
//! invisible to them and their handles stay valid.
//!
//! Factorization is in place: after elimination the strictly lower part holds
//! the multipliers of L (unit diagonal implied) and the diagonal and upper
//! part hold U.

use log::{debug, trace};

use super::field::Field;
use super::markowitz::Markowitz;
use super::matrix::{ElementId, SparseMatrix, Swap};
use super::translation::Translation;
use super::vector::{RhsId, RhsVector};
use crate::error::{EngineError, Result};

/// Points in the solver's life cycle that listeners can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverEvent {
    BeforeFactor,
    AfterFactor,
    BeforeOrderAndFactor,
    AfterOrderAndFactor,
    BeforeSolve,
    AfterSolve,
    BeforeSolveTransposed,
    AfterSolveTransposed,
}

/// Handle returned by [`SparseLuSolver::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(usize);

/// Callback invoked on solver events.
///
/// Solve events receive the solution vector (external indexing) so a listener
/// can snapshot or adjust auxiliary unknowns in lockstep with the solver.
pub type Listener<T> = Box<dyn FnMut(SolverEvent, Option<&mut [T]>) + Send>;

/// A sparse LU solver over the field `T`.
pub struct SparseLuSolver<T: Field> {
    matrix: SparseMatrix<T>,
    vector: RhsVector<T>,
    row: Translation,
    column: Translation,
    strategy: Markowitz,
    order: Option<usize>,
    fillins: usize,
    needs_reordering: bool,
    is_factored: bool,
    listeners: Vec<(ListenerId, Listener<T>)>,
    next_listener: usize,
}

/// Solver over real numbers (DC and transient analysis).
pub type RealSolver = SparseLuSolver<f64>;

/// Solver over complex numbers (small-signal analysis).
pub type ComplexSolver = SparseLuSolver<num_complex::Complex64>;

impl<T: Field> Default for SparseLuSolver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Field> std::fmt::Debug for SparseLuSolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseLuSolver")
            .field("size", &self.size())
            .field("elements", &self.matrix.element_count())
            .field("fillins", &self.fillins)
            .field("needs_reordering", &self.needs_reordering)
            .field("is_factored", &self.is_factored)
            .finish()
    }
}

impl<T: Field> SparseLuSolver<T> {
    /// Create an empty solver with the default Markowitz strategy.
    pub fn new() -> Self {
        Self::with_strategy(Markowitz::default())
    }

    /// Create an empty solver with a custom pivot strategy.
    pub fn with_strategy(strategy: Markowitz) -> Self {
        Self {
            matrix: SparseMatrix::new(),
            vector: RhsVector::new(),
            row: Translation::new(),
            column: Translation::new(),
            strategy,
            order: None,
            fillins: 0,
            needs_reordering: true,
            is_factored: false,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Number of unknowns, excluding ground.
    pub fn size(&self) -> usize {
        self.matrix.size()
    }

    /// Grow every structure to at least `size` unknowns.
    pub fn ensure_size(&mut self, size: usize) {
        self.matrix.ensure_size(size);
        self.vector.ensure_size(size);
        self.row.ensure_size(size);
        self.column.ensure_size(size);
    }

    /// Effective elimination depth.
    pub fn order(&self) -> usize {
        self.order.map_or(self.size(), |o| o.min(self.size()))
    }

    /// Limit the number of elimination steps (`None` for the full size).
    pub fn set_order(&mut self, order: Option<usize>) {
        self.order = order;
    }

    /// Number of fill-in elements generated so far.
    pub fn fillins(&self) -> usize {
        self.fillins
    }

    /// Whether the next [`order_and_factor`](Self::order_and_factor) does a full reorder.
    pub fn needs_reordering(&self) -> bool {
        self.needs_reordering
    }

    /// Force (or cancel) a full reorder on the next ordering.
    pub fn set_needs_reordering(&mut self, value: bool) {
        self.needs_reordering = value;
    }

    /// Whether the matrix currently holds a valid factorization.
    pub fn is_factored(&self) -> bool {
        self.is_factored
    }

    /// The pivot strategy.
    pub fn strategy(&self) -> &Markowitz {
        &self.strategy
    }

    /// Mutable access to the pivot strategy (e.g. to change thresholds).
    pub fn strategy_mut(&mut self) -> &mut Markowitz {
        &mut self.strategy
    }

    /// The underlying matrix in internal ordering.
    pub fn matrix(&self) -> &SparseMatrix<T> {
        &self.matrix
    }

    /// External -> internal row translation.
    pub fn row_translation(&self) -> &Translation {
        &self.row
    }

    /// External -> internal column translation.
    pub fn column_translation(&self) -> &Translation {
        &self.column
    }

    // ============ Element access ============

    /// Get the element at external (row, column), creating it if needed.
    pub fn get_element(&mut self, row: usize, column: usize) -> ElementId {
        if row == 0 || column == 0 {
            return ElementId::TRASH;
        }
        self.ensure_size(row.max(column));
        let (r, c) = (self.row.internal(row), self.column.internal(column));
        self.matrix.get_element(r, c)
    }

    /// Find the element at external (row, column) without creating it.
    pub fn find_element(&self, row: usize, column: usize) -> Option<ElementId> {
        if row == 0 || column == 0 || row > self.size() || column > self.size() {
            return None;
        }
        self.matrix
            .find_element(self.row.internal(row), self.column.internal(column))
    }

    /// Get the right-hand-side element of external `row`, creating it if needed.
    pub fn get_rhs_element(&mut self, row: usize) -> RhsId {
        if row == 0 {
            return RhsId::TRASH;
        }
        self.ensure_size(row);
        self.vector.get_element(self.row.internal(row))
    }

    /// Internal diagonal element at elimination step `index`.
    pub fn find_diagonal_element(&self, index: usize) -> Option<ElementId> {
        self.matrix.find_diagonal_element(index)
    }

    /// External (row, column) currently occupied by an element.
    pub fn element_position(&self, id: ElementId) -> (usize, usize) {
        if id.is_trash() {
            return (0, 0);
        }
        (
            self.row.external(self.matrix.row_of(id)),
            self.column.external(self.matrix.column_of(id)),
        )
    }

    /// Add to a matrix element.
    pub fn add(&mut self, id: ElementId, value: T) {
        self.matrix.add(id, value);
    }

    /// Value of a matrix element.
    pub fn value(&self, id: ElementId) -> T {
        self.matrix.value(id)
    }

    /// Add to a right-hand-side element.
    pub fn add_rhs(&mut self, id: RhsId, value: T) {
        self.vector.add(id, value);
    }

    /// Value of a right-hand-side element.
    pub fn rhs_value(&self, id: RhsId) -> T {
        self.vector.value(id)
    }

    /// Zero the matrix values and invalidate the factorization.
    pub fn reset_matrix(&mut self) {
        self.matrix.reset();
        self.is_factored = false;
    }

    /// Zero the right-hand side.
    pub fn reset_vector(&mut self) {
        self.vector.reset();
    }

    /// Zero both matrix and right-hand side.
    pub fn clear(&mut self) {
        self.reset_matrix();
        self.reset_vector();
    }

    /// Add a conductance to every diagonal element that exists.
    pub fn apply_diagonal_gmin(&mut self, gmin: T) {
        if gmin.is_zero() {
            return;
        }
        for index in 1..=self.size() {
            if let Some(id) = self.matrix.find_diagonal_element(index) {
                self.matrix.add(id, gmin);
            }
        }
    }

    // ============ Events ============

    /// Register a listener for solver events.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(SolverEvent, Option<&mut [T]>) + Send + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: SolverEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event, None);
        }
    }

    fn emit_solution(&mut self, event: SolverEvent, solution: &mut [T]) {
        for (_, listener) in &mut self.listeners {
            listener(event, Some(&mut *solution));
        }
    }

    // ============ Factorization ============

    /// Factor with the existing pivot order.
    ///
    /// Returns `false` if a diagonal pivot is missing or exactly zero; the
    /// caller decides whether to force a reorder.
    pub fn factor(&mut self) -> bool {
        self.emit(SolverEvent::BeforeFactor);

        let mut success = true;
        for step in 1..=self.order() {
            let eliminated = match self.matrix.find_diagonal_element(step) {
                Some(pivot) => self.elimination(pivot),
                None => false,
            };
            if !eliminated {
                trace!("factor failed at step {}", step);
                success = false;
                break;
            }
        }

        self.is_factored = success;
        self.emit(SolverEvent::AfterFactor);
        success
    }

    /// Order and factor the matrix.
    ///
    /// Unless a reorder is flagged, the previous pivot order is tried first;
    /// the first unacceptable diagonal pivot hands over to a full Markowitz
    /// search from that step on.
    pub fn order_and_factor(&mut self) -> Result<()> {
        self.emit(SolverEvent::BeforeOrderAndFactor);
        let order = self.order();
        let mut step = 1;

        if !self.needs_reordering {
            while step <= order {
                let pivot = match self.matrix.find_diagonal_element(step) {
                    Some(p) if self.strategy.is_valid_pivot(&self.matrix, p, step) => p,
                    _ => {
                        self.needs_reordering = true;
                        break;
                    }
                };
                if !self.elimination(pivot) {
                    self.is_factored = false;
                    return Err(EngineError::algebra(format!(
                        "elimination failed on accepted pivot at step {}",
                        step
                    )));
                }
                step += 1;
            }

            if !self.needs_reordering {
                self.is_factored = true;
                self.emit(SolverEvent::AfterOrderAndFactor);
                return Ok(());
            }
            debug!("pivot order rejected at step {}, reordering", step);
        }

        self.strategy.setup(&self.matrix, step);
        while step <= order {
            let Some(pivot) = self.strategy.find_pivot(&self.matrix, step) else {
                self.is_factored = false;
                return Err(EngineError::SingularMatrix { step });
            };
            self.move_pivot(pivot, step);
            if !self.elimination(pivot) {
                self.is_factored = false;
                return Err(EngineError::SingularMatrix { step });
            }
            step += 1;
        }

        debug!(
            "ordered and factored {} unknowns ({} elements, {} fill-ins)",
            self.size(),
            self.matrix.element_count(),
            self.fillins
        );
        self.is_factored = true;
        self.needs_reordering = false;
        self.emit(SolverEvent::AfterOrderAndFactor);
        Ok(())
    }

    /// Bring `pivot` to the diagonal at `step`.
    fn move_pivot(&mut self, pivot: ElementId, step: usize) {
        self.strategy.move_pivot(&self.matrix, pivot, step);

        let pivot_row = self.matrix.row_of(pivot);
        let pivot_column = self.matrix.column_of(pivot);
        let Self {
            matrix,
            vector,
            row,
            column,
            ..
        } = self;
        matrix.swap_rows(pivot_row, step, |swap: Swap| {
            row.swap(swap.first, swap.second);
            vector.swap_elements(swap.first, swap.second);
        });
        matrix.swap_columns(pivot_column, step, |swap: Swap| {
            column.swap(swap.first, swap.second);
        });

        self.strategy.update(&self.matrix, pivot, step);
    }

    /// Eliminate the submatrix right of and below `pivot`.
    ///
    /// Returns `false` if the pivot is exactly zero.
    fn elimination(&mut self, pivot: ElementId) -> bool {
        let pivot_value = self.matrix.value(pivot);
        if pivot_value.is_zero() {
            return false;
        }
        let step = self.matrix.row_of(pivot);

        let lower: Vec<ElementId> = self
            .matrix
            .column(step)
            .iter()
            .copied()
            .filter(|&id| self.matrix.row_of(id) > step)
            .collect();
        let upper: Vec<ElementId> = self
            .matrix
            .row(step)
            .iter()
            .copied()
            .filter(|&id| self.matrix.column_of(id) > step)
            .collect();

        for l in lower {
            let multiplier = self.matrix.value(l) / pivot_value;
            self.matrix.set_value(l, multiplier);
            let target_row = self.matrix.row_of(l);

            for &u in &upper {
                let target_column = self.matrix.column_of(u);
                let target = match self.matrix.find_element(target_row, target_column) {
                    Some(id) => id,
                    None => self.create_fillin(target_row, target_column),
                };
                let delta = multiplier * self.matrix.value(u);
                self.matrix.add(target, -delta);
            }
        }
        true
    }

    /// Materialize a fill-in at internal (row, column).
    fn create_fillin(&mut self, row: usize, column: usize) -> ElementId {
        let id = self.matrix.get_element(row, column);
        self.strategy.create_fillin(&self.matrix, id);
        self.fillins += 1;
        id
    }

    // ============ Substitution ============

    fn diagonal_value(&self, index: usize) -> Result<T> {
        self.matrix
            .find_diagonal_element(index)
            .map(|id| self.matrix.value(id))
            .ok_or_else(|| EngineError::algebra(format!("missing diagonal at {}", index)))
    }

    /// Solve `A x = b` with the factored matrix.
    ///
    /// `solution` is indexed by external unknown and must hold at least
    /// `size + 1` entries; index 0 is set to zero. Unknowns beyond
    /// [`order`](Self::order) are returned as zero.
    pub fn solve(&mut self, solution: &mut [T]) -> Result<()> {
        if !self.is_factored {
            return Err(EngineError::algebra("solve called on an unfactored matrix"));
        }
        let size = self.size();
        let order = self.order();
        if solution.len() <= size {
            return Err(EngineError::algebra(format!(
                "solution vector has {} entries, expected {}",
                solution.len(),
                size + 1
            )));
        }
        self.emit_solution(SolverEvent::BeforeSolve, solution);

        // The right-hand side already follows the row permutation
        let mut intermediate = vec![T::zero(); size + 1];
        for (index, value) in intermediate.iter_mut().enumerate().skip(1) {
            *value = self.vector.at(index);
        }

        // Forward substitution (L * y = b)
        for step in 1..=order {
            let y = intermediate[step];
            if y.is_zero() {
                continue;
            }
            for &id in self.matrix.column(step) {
                let row = self.matrix.row_of(id);
                if row > step {
                    intermediate[row] -= self.matrix.value(id) * y;
                }
            }
        }
        for value in intermediate.iter_mut().skip(order + 1) {
            *value = T::zero();
        }

        // Back substitution (U * x = y)
        for step in (1..=order).rev() {
            let mut acc = intermediate[step];
            for &id in self.matrix.row(step) {
                let column = self.matrix.column_of(id);
                if column > step {
                    acc -= self.matrix.value(id) * intermediate[column];
                }
            }
            intermediate[step] = acc / self.diagonal_value(step)?;
        }

        solution[0] = T::zero();
        for (index, &value) in intermediate.iter().enumerate().skip(1) {
            solution[self.column.external(index)] = value;
        }

        self.emit_solution(SolverEvent::AfterSolve, solution);
        Ok(())
    }

    /// Solve `Aᵀ x = b` with the factored matrix.
    ///
    /// Same conventions as [`solve`](Self::solve).
    pub fn solve_transposed(&mut self, solution: &mut [T]) -> Result<()> {
        if !self.is_factored {
            return Err(EngineError::algebra("solve called on an unfactored matrix"));
        }
        let size = self.size();
        let order = self.order();
        if solution.len() <= size {
            return Err(EngineError::algebra(format!(
                "solution vector has {} entries, expected {}",
                solution.len(),
                size + 1
            )));
        }
        self.emit_solution(SolverEvent::BeforeSolveTransposed, solution);

        // Equation c of the transposed system is column c of the original
        let mut intermediate = vec![T::zero(); size + 1];
        for external in 1..=size {
            intermediate[self.column.internal(external)] = self.vector.at(self.row.internal(external));
        }

        // Forward substitution (Uᵀ * z = b)
        for step in 1..=order {
            let z = intermediate[step] / self.diagonal_value(step)?;
            intermediate[step] = z;
            if z.is_zero() {
                continue;
            }
            for &id in self.matrix.row(step) {
                let column = self.matrix.column_of(id);
                if column > step {
                    intermediate[column] -= self.matrix.value(id) * z;
                }
            }
        }
        for value in intermediate.iter_mut().skip(order + 1) {
            *value = T::zero();
        }

        // Back substitution (Lᵀ * x = z)
        for step in (1..=order).rev() {
            let mut acc = intermediate[step];
            for &id in self.matrix.column(step) {
                let row = self.matrix.row_of(id);
                if row > step {
                    acc -= self.matrix.value(id) * intermediate[row];
                }
            }
            intermediate[step] = acc;
        }

        solution[0] = T::zero();
        for (index, &value) in intermediate.iter().enumerate().skip(1) {
            solution[self.row.external(index)] = value;
        }

        self.emit_solution(SolverEvent::AfterSolveTransposed, solution);
        Ok(())
    }

    // ============ Preconditioning ============

    /// Run `method` with a view that may swap rows and columns.
    ///
    /// Swaps are mirrored into the translations (and, for rows, the
    /// right-hand side) only for the duration of this call.
    pub fn precondition<R>(&mut self, method: impl FnOnce(&mut Preconditioner<'_, T>) -> R) -> R {
        let mut view = Preconditioner {
            matrix: &mut self.matrix,
            vector: &mut self.vector,
            row: &mut self.row,
            column: &mut self.column,
            swaps: 0,
        };
        let result = method(&mut view);
        let swaps = view.swaps;
        if swaps > 0 {
            self.is_factored = false;
            self.needs_reordering = true;
        }
        result
    }

    /// Move symmetric ±1 entries of branch equations onto the diagonal.
    ///
    /// MNA voltage-source rows have a structurally zero diagonal. When a
    /// column lacks a usable diagonal but holds a "twin" pair, i.e. entries
    /// (r, c) and (c, r) of magnitude one, swapping columns r and c puts both
    /// on the diagonal.
    pub fn preorder_mna(&mut self) {
        let swaps = self.precondition(|p| {
            let size = p.matrix().size();
            let mut total = 0;
            // Each swap settles at least one column, so `size` passes suffice
            for _ in 0..=size {
                let mut swapped = false;
                let mut ambiguous = None;
                for column in 1..=size {
                    if p.has_usable_diagonal(column) {
                        continue;
                    }
                    let twins = p.twins(column);
                    match twins.as_slice() {
                        [] => {}
                        [single] => {
                            p.swap_columns(column, *single);
                            swapped = true;
                            total += 1;
                        }
                        [first, ..] => {
                            ambiguous.get_or_insert((column, *first));
                        }
                    }
                }
                if !swapped {
                    match ambiguous {
                        Some((column, twin)) => {
                            p.swap_columns(column, twin);
                            total += 1;
                        }
                        None => break,
                    }
                }
            }
            total
        });
        if swaps > 0 {
            debug!("MNA preorder swapped {} column pairs", swaps);
        }
    }
}

/// Temporary view used while preconditioning a solver.
pub struct Preconditioner<'a, T: Field> {
    matrix: &'a mut SparseMatrix<T>,
    vector: &'a mut RhsVector<T>,
    row: &'a mut Translation,
    column: &'a mut Translation,
    swaps: usize,
}

impl<'a, T: Field> Preconditioner<'a, T> {
    /// The matrix in internal ordering.
    pub fn matrix(&self) -> &SparseMatrix<T> {
        self.matrix
    }

    /// Swap two internal rows, keeping translation and right-hand side in step.
    pub fn swap_rows(&mut self, first: usize, second: usize) {
        let Self {
            matrix,
            vector,
            row,
            swaps,
            ..
        } = self;
        matrix.swap_rows(first, second, |swap| {
            row.swap(swap.first, swap.second);
            vector.swap_elements(swap.first, swap.second);
            *swaps += 1;
        });
    }

    /// Swap two internal columns, keeping the translation in step.
    pub fn swap_columns(&mut self, first: usize, second: usize) {
        let Self {
            matrix,
            column,
            swaps,
            ..
        } = self;
        matrix.swap_columns(first, second, |swap| {
            column.swap(swap.first, swap.second);
            *swaps += 1;
        });
    }

    fn has_usable_diagonal(&self, index: usize) -> bool {
        self.matrix
            .find_diagonal_element(index)
            .map_or(false, |id| !self.matrix.value(id).is_zero())
    }

    fn is_unit(&self, id: ElementId) -> bool {
        self.matrix.value(id).magnitude() == 1.0
    }

    /// Rows `r` such that (r, column) and (column, r) both have magnitude one.
    fn twins(&self, column: usize) -> Vec<usize> {
        self.matrix
            .column(column)
            .iter()
            .filter(|&&id| self.is_unit(id))
            .map(|&id| self.matrix.row_of(id))
            .filter(|&row| row != column)
            .filter(|&row| {
                self.matrix
                    .find_element(column, row)
                    .map_or(false, |twin| self.is_unit(twin))
            })
            .collect()
    }
}
