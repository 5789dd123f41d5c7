//! Linear solvers: a dense LU fallback for reduced global systems and the
//! Schur-complement elimination for block saddle-point systems.

use crate::block::{BlockMatrix, BlockVector};
use crate::error::{FemError, Result};
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::csr::CsrMatrix;

/// Solves a compressed global system for its DOF vector.
///
/// The seam between assembly and the actual factorization: production setups
/// can plug in a sparse direct or iterative solver without touching the
/// assembly pipeline.
pub trait LinearSolver {
    fn solve(&self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>>;
}

/// Densifies the system and factorizes with LU. Intended for the moderate
/// DOF counts of tests and examples, not for large meshes.
#[derive(Debug, Default, Clone)]
pub struct DenseLuSolver;

impl LinearSolver for DenseLuSolver {
    fn solve(&self, matrix: &CsrMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        let mut dense = DMatrix::zeros(matrix.nrows(), matrix.ncols());
        for (i, j, value) in matrix.triplet_iter() {
            dense[(i, j)] = *value;
        }
        dense
            .lu()
            .solve(rhs)
            .ok_or(FemError::SingularMatrix)
    }
}

/// Solves a block system by eliminating the `inner` blocks.
///
/// For the partition
/// `[A B; C D] [u; p] = [f; g]`
/// with `A` spanning the inner blocks, the reduced (Schur) system
/// `(D - C A^-1 B) p = g - C A^-1 f`
/// is solved for the outer unknowns, then `u` is recovered by
/// back-substitution. For Stokes systems the inner blocks are the velocity
/// components and the outer block holds the pressures, where `D = 0` and
/// the complement is the (negated) pressure Schur operator.
#[derive(Debug, Clone)]
pub struct SchurComplementSolver {
    inner: Vec<usize>,
    outer: Vec<usize>,
}

impl SchurComplementSolver {
    pub fn new(inner: Vec<usize>, outer: Vec<usize>) -> Self {
        Self { inner, outer }
    }

    /// The standard partition for the 2D Stokes block layout: velocity
    /// blocks 0 and 1 inner, pressure block 2 outer.
    pub fn stokes() -> Self {
        Self::new(vec![0, 1], vec![2])
    }

    /// The partition for the mixed Laplace block layout: the flux mass
    /// block 0 inner, the potential block 1 outer.
    pub fn mixed_laplace() -> Self {
        Self::new(vec![0], vec![1])
    }

    /// Solves the block system and returns the solution in global DOF order.
    pub fn solve(&self, matrix: &BlockMatrix, rhs: &BlockVector) -> Result<DVector<f64>> {
        let layout = matrix.layout();
        let covered = self.inner.len() + self.outer.len();
        if covered != layout.num_blocks() {
            return Err(FemError::DimensionMismatch {
                expected: layout.num_blocks(),
                actual: covered,
                context: "block partition of the Schur-complement solver",
            });
        }

        let a = self.gather_matrix(matrix, &self.inner, &self.inner);
        let b = self.gather_matrix(matrix, &self.inner, &self.outer);
        let c = self.gather_matrix(matrix, &self.outer, &self.inner);
        let d = self.gather_matrix(matrix, &self.outer, &self.outer);
        let f = self.gather_vector(rhs, &self.inner);
        let g = self.gather_vector(rhs, &self.outer);

        let lu = a.lu();
        let singular_inner = FemError::SingularBlock {
            block: (self.inner[0], self.inner[0]),
        };
        let a_inv_f = lu.solve(&f).ok_or_else(|| singular_inner.clone())?;
        let a_inv_b = lu.solve(&b).ok_or(singular_inner)?;

        let complement = &d - &c * &a_inv_b;
        let reduced_rhs = &g - &c * &a_inv_f;
        debug!(
            "Schur complement of size {} from {} inner DOFs",
            complement.nrows(),
            f.len()
        );
        let p = complement
            .lu()
            .solve(&reduced_rhs)
            .ok_or(FemError::SingularMatrix)?;
        let u = &a_inv_f - &a_inv_b * &p;

        let mut solution = DVector::zeros(layout.total_size());
        self.scatter_vector(&mut solution, rhs, &self.inner, &u);
        self.scatter_vector(&mut solution, rhs, &self.outer, &p);
        Ok(solution)
    }

    fn gather_matrix(
        &self,
        matrix: &BlockMatrix,
        rows: &[usize],
        cols: &[usize],
    ) -> DMatrix<f64> {
        let layout = matrix.layout();
        let nrows: usize = rows.iter().map(|&b| layout.size(b)).sum();
        let ncols: usize = cols.iter().map(|&b| layout.size(b)).sum();
        let mut dense = DMatrix::zeros(nrows, ncols);
        let mut row_offset = 0;
        for &block_row in rows {
            let mut col_offset = 0;
            for &block_col in cols {
                let block = matrix.dense_block(block_row, block_col);
                dense
                    .view_mut((row_offset, col_offset), (block.nrows(), block.ncols()))
                    .copy_from(&block);
                col_offset += layout.size(block_col);
            }
            row_offset += layout.size(block_row);
        }
        dense
    }

    fn gather_vector(&self, rhs: &BlockVector, blocks: &[usize]) -> DVector<f64> {
        let layout = rhs.layout();
        let len: usize = blocks.iter().map(|&b| layout.size(b)).sum();
        let mut dense = DVector::zeros(len);
        let mut offset = 0;
        for &block in blocks {
            dense
                .rows_mut(offset, layout.size(block))
                .copy_from(rhs.block(block));
            offset += layout.size(block);
        }
        dense
    }

    fn scatter_vector(
        &self,
        target: &mut DVector<f64>,
        rhs: &BlockVector,
        blocks: &[usize],
        values: &DVector<f64>,
    ) {
        let layout = rhs.layout();
        let mut source_offset = 0;
        for &block in blocks {
            let size = layout.size(block);
            target
                .rows_mut(layout.offset(block), size)
                .copy_from(&values.rows(source_offset, size));
            source_offset += size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockLayout;
    use matrixcompare::assert_matrix_eq;
    use nalgebra_sparse::coo::CooMatrix;

    fn block_system_from_dense(
        layout: BlockLayout,
        dense: &DMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> (BlockMatrix, BlockVector) {
        let mut matrix = BlockMatrix::zeros(layout.clone());
        for i in 0..dense.nrows() {
            for j in 0..dense.ncols() {
                if dense[(i, j)] != 0.0 {
                    matrix.add(i, j, dense[(i, j)]);
                }
            }
        }
        let mut vector = BlockVector::zeros(layout);
        for i in 0..rhs.len() {
            vector.add(i, rhs[i]);
        }
        (matrix, vector)
    }

    #[test]
    fn schur_elimination_recovers_a_known_solution() {
        // Saddle-point structure: invertible inner block, zero outer
        // diagonal, nontrivial coupling.
        let dense = DMatrix::from_row_slice(
            5,
            5,
            &[
                4.0, 1.0, 0.0, 0.0, 1.0, //
                1.0, 3.0, 0.0, 0.0, -1.0, //
                0.0, 0.0, 2.0, 0.5, 1.0, //
                0.0, 0.0, 0.5, 2.0, 1.0, //
                1.0, -1.0, 1.0, 1.0, 0.0,
            ],
        );
        let expected = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0, -1.0]);
        let rhs = &dense * &expected;

        let layout = BlockLayout::new(vec![2, 2, 1]);
        let (matrix, vector) = block_system_from_dense(layout, &dense, &rhs);
        let solution = SchurComplementSolver::stokes().solve(&matrix, &vector).unwrap();
        assert_matrix_eq!(solution, expected, comp = abs, tol = 1e-10);
    }

    #[test]
    fn singular_inner_block_is_reported() {
        let layout = BlockLayout::new(vec![2, 1]);
        let mut matrix = BlockMatrix::zeros(layout.clone());
        // Inner block left entirely zero.
        matrix.add(0, 2, 1.0);
        matrix.add(2, 0, 1.0);
        let vector = BlockVector::zeros(layout);
        let result = SchurComplementSolver::new(vec![0], vec![1]).solve(&matrix, &vector);
        assert!(matches!(result, Err(FemError::SingularBlock { .. })));
    }

    #[test]
    fn partition_must_cover_the_layout() {
        let layout = BlockLayout::new(vec![2, 2, 1]);
        let matrix = BlockMatrix::zeros(layout.clone());
        let vector = BlockVector::zeros(layout);
        let result = SchurComplementSolver::new(vec![0], vec![2]).solve(&matrix, &vector);
        assert!(matches!(result, Err(FemError::DimensionMismatch { .. })));
    }

    #[test]
    fn dense_lu_solves_a_small_sparse_system() {
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 0, 2.0);
        coo.push(1, 1, 3.0);
        coo.push(2, 2, 4.0);
        coo.push(0, 1, 1.0);
        coo.push(1, 0, 1.0);
        let matrix = CsrMatrix::from(&coo);
        let expected = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let rhs = DVector::from_vec(vec![4.0, 7.0, 12.0]);
        let solution = DenseLuSolver.solve(&matrix, &rhs).unwrap();
        assert_matrix_eq!(solution, expected, comp = abs, tol = 1e-12);
    }

    #[test]
    fn dense_lu_reports_singular_systems() {
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, 1.0);
        coo.push(1, 0, 1.0);
        let matrix = CsrMatrix::from(&coo);
        let rhs = DVector::from_vec(vec![1.0, 1.0]);
        assert_eq!(
            DenseLuSolver.solve(&matrix, &rhs),
            Err(FemError::SingularMatrix)
        );
    }
}
