//! Small dense LU decomposition.
//!
//! Used for the tiny Vandermonde-like systems that produce integration and
//! predictor coefficients, where sparse bookkeeping would cost more than it saves.

use crate::error::{EngineError, Result};

/// Threshold below which a dense pivot is treated as zero.
const PIVOT_EPSILON: f64 = 1e-300;

/// Dense LU decomposition with partial pivoting.
#[derive(Debug, Clone)]
pub struct DenseLu {
    /// Combined L (unit diagonal, below) and U (on and above), row-major
    lu: Vec<f64>,
    /// Pivot indices for the row permutation
    pivots: Vec<usize>,
    /// Matrix dimension
    size: usize,
}

impl DenseLu {
    /// Factor a row-major `size`×`size` matrix.
    pub fn factor(a: &[f64], size: usize) -> Result<Self> {
        debug_assert_eq!(a.len(), size * size);
        let n = size;
        let mut lu = a.to_vec();
        let mut pivots: Vec<usize> = (0..n).collect();

        for k in 0..n {
            // Find pivot
            let mut max_val = lu[k * n + k].abs();
            let mut max_row = k;
            for i in (k + 1)..n {
                let val = lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val < PIVOT_EPSILON {
                return Err(EngineError::SingularMatrix { step: k + 1 });
            }

            if max_row != k {
                pivots.swap(k, max_row);
                for j in 0..n {
                    lu.swap(k * n + j, max_row * n + j);
                }
            }

            // Eliminate
            let pivot = lu[k * n + k];
            for i in (k + 1)..n {
                let factor = lu[i * n + k] / pivot;
                lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    lu[i * n + j] -= factor * lu[k * n + j];
                }
            }
        }

        Ok(Self { lu, pivots, size })
    }

    /// Solve `A x = b` with the stored decomposition.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.size;
        let mut x: Vec<f64> = self.pivots.iter().map(|&p| b[p]).collect();

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            for j in 0..i {
                x[i] -= self.lu[i * n + j] * x[j];
            }
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                x[i] -= self.lu[i * n + j] * x[j];
            }
            x[i] /= self.lu[i * n + i];
        }

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_dense_solve_with_pivoting() {
        // Zero on the first diagonal forces a row exchange
        let a = [0.0, 2.0, 1.0, 1.0, 1.0, 0.0, 3.0, 0.0, 1.0];
        let lu = DenseLu::factor(&a, 3).unwrap();
        let x = lu.solve(&[3.0, 3.0, 7.0]);
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_dense_singular() {
        let a = [1.0, 2.0, 2.0, 4.0];
        assert!(DenseLu::factor(&a, 2).is_err());
    }
}
