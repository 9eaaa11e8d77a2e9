use faer::Mat;
use faer::prelude::SpSolver;
use faer::sparse::SparseColMat;
use nalgebra::{DMatrix, DVector};

/// Jacobian in coordinate form. Entries added at the same position are
/// summed when the matrix is compressed.
#[derive(Debug, Clone)]
pub struct SparseJacobian {
    n: usize,
    triplets: Vec<(usize, usize, f64)>,
}

impl SparseJacobian {
    pub fn new(n: usize) -> Self {
        Self::with_capacity(n, 0)
    }

    pub fn with_capacity(n: usize, entries: usize) -> Self {
        Self {
            n,
            triplets: Vec::with_capacity(entries),
        }
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.triplets.push((row, col, value));
    }

    /// Replace the given rows by rows of the identity.
    pub fn set_identity_rows(&mut self, rows: &[usize]) {
        if rows.is_empty() {
            return;
        }
        self.triplets.retain(|(r, _, _)| !rows.contains(r));
        for &row in rows {
            self.triplets.push((row, row, 1.0));
        }
    }

    /// Column-major, duplicate-free entries.
    pub fn compress(&self) -> Vec<(usize, usize, f64)> {
        let mut sorted = self.triplets.clone();
        sorted.sort_unstable_by_key(|&(r, c, _)| (c, r));
        let mut merged: Vec<(usize, usize, f64)> = Vec::with_capacity(sorted.len());
        for (r, c, v) in sorted {
            match merged.last_mut() {
                Some(last) if last.0 == r && last.1 == c => last.2 += v,
                _ => merged.push((r, c, v)),
            }
        }
        merged
    }

    /// Number of stored entries after compression.
    pub fn nnz(&self) -> usize {
        self.compress().len()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.triplets
            .iter()
            .filter(|&&(r, c, _)| r == row && c == col)
            .map(|&(_, _, v)| v)
            .sum()
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.n, self.n);
        for &(r, c, v) in &self.triplets {
            dense[(r, c)] += v;
        }
        dense
    }

    /// Solve `J x = rhs` with a sparse LU factorisation. Rows are scaled by
    /// their diagonal first. Returns `None` when the factorisation fails or
    /// the solution is not finite.
    pub fn solve(&self, rhs: &DVector<f64>) -> Option<DVector<f64>> {
        let n = self.n;
        let mut entries = self.compress();

        let mut diagonal = vec![1.0; n];
        for &(r, c, v) in &entries {
            if r == c && v.abs() >= 1e-12 {
                diagonal[r] = v;
            }
        }
        for entry in &mut entries {
            entry.2 /= diagonal[entry.0];
        }

        let matrix = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &entries).ok()?;
        let lu = matrix.sp_lu().ok()?;

        let mut x = Mat::<f64>::from_fn(n, 1, |i, _| rhs[i] / diagonal[i]);
        lu.solve_in_place(x.as_mut());

        let solution = DVector::from_fn(n, |i, _| x.read(i, 0));
        solution.iter().all(|v| v.is_finite()).then_some(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Tridiagonal matrix of a 1-D Laplacian with a shifted diagonal.
    fn tridiagonal(n: usize) -> SparseJacobian {
        let mut jac = SparseJacobian::new(n);
        for i in 0..n {
            jac.add(i, i, 2.5);
            if i > 0 {
                jac.add(i, i - 1, -1.0);
                jac.add(i - 1, i, -1.0);
            }
        }
        jac
    }

    #[test]
    fn duplicates_are_summed_on_compression() {
        let mut jac = SparseJacobian::new(2);
        jac.add(1, 0, 1.5);
        jac.add(0, 0, 2.0);
        jac.add(1, 0, -0.5);
        assert_eq!(jac.compress(), vec![(0, 0, 2.0), (1, 0, 1.0)]);
        assert_eq!(jac.get(1, 0), 1.0);
        assert_eq!(jac.nnz(), 2);
    }

    #[test]
    fn identity_rows_replace_assembled_entries() {
        let mut jac = tridiagonal(4);
        jac.set_identity_rows(&[0, 3]);
        let dense = jac.to_dense();
        assert_eq!(dense.row(0).iter().copied().collect::<Vec<_>>(), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(dense.row(3).iter().copied().collect::<Vec<_>>(), vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(dense[(1, 0)], -1.0);
    }

    #[test]
    fn sparse_solve_agrees_with_dense_lu() {
        let mut jac = tridiagonal(30);
        // badly scaled rows, as Dirichlet and trap rows are
        jac.add(5, 5, 1e8);
        jac.set_identity_rows(&[29]);
        let rhs = DVector::from_fn(30, |i, _| (i as f64).sin() + 1.0);

        let sparse = jac.solve(&rhs).unwrap();
        let dense = jac.to_dense().lu().solve(&rhs).unwrap();
        for i in 0..30 {
            assert_relative_eq!(sparse[i], dense[i], epsilon = 1e-12, max_relative = 1e-9);
        }
    }

    #[test]
    fn singular_matrix_has_no_solution() {
        let mut jac = SparseJacobian::new(2);
        jac.add(0, 0, 1.0);
        jac.add(1, 1, 0.0);
        assert!(jac.solve(&DVector::from_vec(vec![1.0, 1.0])).is_none());
    }
}
