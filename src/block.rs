//! Block-partitioned sparse systems for mixed (saddle-point) problems.
//!
//! A [`BlockLayout`] splits a contiguous global index range into consecutive
//! blocks (velocity components first, pressure last, matching the global DOF
//! numbering). [`BlockMatrix`] and [`BlockVector`] route global-index
//! additions into per-block storage, so solvers can address individual
//! blocks without slicing a monolithic matrix.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::coo::CooMatrix;

/// Sizes and offsets of a contiguous block partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    sizes: Vec<usize>,
    offsets: Vec<usize>,
}

impl BlockLayout {
    pub fn new(sizes: Vec<usize>) -> Self {
        let mut offsets = Vec::with_capacity(sizes.len());
        let mut offset = 0;
        for &size in &sizes {
            offsets.push(offset);
            offset += size;
        }
        Self { sizes, offsets }
    }

    pub fn num_blocks(&self) -> usize {
        self.sizes.len()
    }

    pub fn size(&self, block: usize) -> usize {
        self.sizes[block]
    }

    pub fn offset(&self, block: usize) -> usize {
        self.offsets[block]
    }

    pub fn total_size(&self) -> usize {
        self.sizes.iter().sum()
    }

    /// Splits a global index into (block, within-block index).
    ///
    /// Panics on an out-of-range index; callers route indices produced by
    /// the DOF numbering, which is total over the layout by construction.
    pub fn locate(&self, global: usize) -> (usize, usize) {
        for (block, &offset) in self.offsets.iter().enumerate().rev() {
            if global >= offset {
                assert!(
                    global - offset < self.sizes[block],
                    "global index {global} outside the block layout"
                );
                return (block, global - offset);
            }
        }
        unreachable!("block layouts always start at offset 0");
    }
}

/// A sparse matrix partitioned into a square grid of COO blocks.
#[derive(Debug, Clone)]
pub struct BlockMatrix {
    layout: BlockLayout,
    blocks: Vec<CooMatrix<f64>>,
}

impl BlockMatrix {
    pub fn zeros(layout: BlockLayout) -> Self {
        let k = layout.num_blocks();
        let mut blocks = Vec::with_capacity(k * k);
        for row in 0..k {
            for col in 0..k {
                blocks.push(CooMatrix::new(layout.size(row), layout.size(col)));
            }
        }
        Self { layout, blocks }
    }

    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Adds a value at global (row, col), routed into the owning block.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        let (block_row, local_row) = self.layout.locate(row);
        let (block_col, local_col) = self.layout.locate(col);
        let k = self.layout.num_blocks();
        self.blocks[block_row * k + block_col].push(local_row, local_col, value);
    }

    pub fn block(&self, row: usize, col: usize) -> &CooMatrix<f64> {
        &self.blocks[row * self.layout.num_blocks() + col]
    }

    /// Densifies one block, summing duplicate triplets.
    pub fn dense_block(&self, row: usize, col: usize) -> DMatrix<f64> {
        let block = self.block(row, col);
        let mut dense = DMatrix::zeros(block.nrows(), block.ncols());
        for (i, j, value) in block.triplet_iter() {
            dense[(i, j)] += value;
        }
        dense
    }
}

/// A vector partitioned conformally with a [`BlockLayout`].
#[derive(Debug, Clone, PartialEq)]
pub struct BlockVector {
    layout: BlockLayout,
    blocks: Vec<DVector<f64>>,
}

impl BlockVector {
    pub fn zeros(layout: BlockLayout) -> Self {
        let blocks = (0..layout.num_blocks())
            .map(|b| DVector::zeros(layout.size(b)))
            .collect();
        Self { layout, blocks }
    }

    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    pub fn add(&mut self, global: usize, value: f64) {
        let (block, local) = self.layout.locate(global);
        self.blocks[block][local] += value;
    }

    pub fn block(&self, block: usize) -> &DVector<f64> {
        &self.blocks[block]
    }

    pub fn block_mut(&mut self, block: usize) -> &mut DVector<f64> {
        &mut self.blocks[block]
    }

    /// Flattens the blocks back into one contiguous vector.
    pub fn to_dense(&self) -> DVector<f64> {
        let mut dense = DVector::zeros(self.layout.total_size());
        for (block, values) in self.blocks.iter().enumerate() {
            dense
                .rows_mut(self.layout.offset(block), values.len())
                .copy_from(values);
        }
        dense
    }
}
