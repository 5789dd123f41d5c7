//! Imposition of Dirichlet conditions on assembled systems.
//!
//! Conditions are eliminated symmetrically: constrained rows are dropped,
//! constrained columns are folded into the load vector, and a unit diagonal
//! pins each constrained DOF to its prescribed value. A symmetric input
//! matrix therefore stays symmetric.

use crate::assembly::global::GlobalSystem;
use crate::block::{BlockMatrix, BlockVector};
use crate::dof::{DofGenerator, FiniteElement};
use crate::error::{FemError, Result};
use crate::mesh::{Mesh, NodeType};
use crate::weakform::MathFunc;
use log::debug;
use nalgebra_sparse::coo::CooMatrix;

fn constraint_table(num_dofs: usize, constraints: &[(usize, f64)]) -> Result<Vec<Option<f64>>> {
    let mut table = vec![None; num_dofs];
    for &(index, value) in constraints {
        if index >= num_dofs {
            return Err(FemError::DimensionMismatch {
                expected: num_dofs,
                actual: index,
                context: "Dirichlet DOF index",
            });
        }
        table[index] = Some(value);
    }
    Ok(table)
}

/// Eliminates the given `(dof, value)` constraints from a global system.
pub fn impose_dirichlet(system: &mut GlobalSystem, constraints: &[(usize, f64)]) -> Result<()> {
    let n = system.num_dofs();
    let values = constraint_table(n, constraints)?;

    let mut reduced = CooMatrix::new(n, n);
    for (i, j, v) in system.stiffness.triplet_iter() {
        if values[i].is_some() {
            continue;
        }
        if let Some(value) = values[j] {
            system.load[i] -= v * value;
        } else {
            reduced.push(i, j, *v);
        }
    }
    for &(index, value) in constraints {
        reduced.push(index, index, 1.0);
        system.load[index] = value;
    }
    system.stiffness = reduced;
    debug!("eliminated {} Dirichlet DOFs", constraints.len());
    Ok(())
}

/// Block-system variant of [`impose_dirichlet`], with constraints given as
/// global DOF indices over the block layout.
pub fn impose_dirichlet_block(
    matrix: &BlockMatrix,
    rhs: &BlockVector,
    constraints: &[(usize, f64)],
) -> Result<(BlockMatrix, BlockVector)> {
    let layout = matrix.layout().clone();
    let values = constraint_table(layout.total_size(), constraints)?;

    let mut reduced = BlockMatrix::zeros(layout.clone());
    let mut load = rhs.clone();
    for block_row in 0..layout.num_blocks() {
        for block_col in 0..layout.num_blocks() {
            let row_offset = layout.offset(block_row);
            let col_offset = layout.offset(block_col);
            for (i, j, v) in matrix.block(block_row, block_col).triplet_iter() {
                let row = row_offset + i;
                let col = col_offset + j;
                if values[row].is_some() {
                    continue;
                }
                if let Some(value) = values[col] {
                    load.add(row, -v * value);
                } else {
                    reduced.add(row, col, *v);
                }
            }
        }
    }
    for &(index, value) in constraints {
        reduced.add(index, index, 1.0);
        let (block, local) = layout.locate(index);
        load.block_mut(block)[local] = value;
    }
    Ok((reduced, load))
}

/// Collects `(dof, value)` pairs for every Dirichlet-marked node, one data
/// function per velocity (or scalar) component. Element-owned pressure DOFs
/// carry no boundary type and are never constrained here.
pub fn dirichlet_values(
    mesh: &Mesh,
    generator: &DofGenerator,
    values: &[&dyn MathFunc],
) -> Result<Vec<(usize, f64)>> {
    if generator.finite_element() == FiniteElement::RaviartThomasConstantPressure {
        // Flux unknowns live on edges, not nodes; essential conditions for
        // the mixed formulation act on the normal flux instead.
        return Err(FemError::Unsupported {
            operation: "nodal Dirichlet data for an edge-flux element",
        });
    }
    let components = match generator.finite_element().num_components() {
        1 => 1,
        _ => 2,
    };
    if values.len() != components {
        return Err(FemError::DimensionMismatch {
            expected: components,
            actual: values.len(),
            context: "one Dirichlet data function per field component",
        });
    }
    let mut constraints = Vec::new();
    for component in 0..components {
        for node in mesh.nodes() {
            if node.boundary_type(component) == NodeType::Dirichlet {
                constraints.push((
                    generator.node_dof_index(component, node.index()),
                    values[component].eval(node.coords()),
                ));
            }
        }
    }
    Ok(constraints)
}
