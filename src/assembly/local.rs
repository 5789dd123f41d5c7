//! Per-element assembly by numerical quadrature.

use crate::dof::{Dof, FiniteElement};
use crate::element::Element;
use crate::error::Result;
use crate::mesh::Mesh;
use crate::quadrature::Quadrature;
use crate::weakform::{ElementCtx, WeakForm};
use nalgebra::{DMatrix, DVector};

/// One element's contribution to the global system.
///
/// Rows are test DOFs, columns are trial DOFs, both in the element's
/// canonical local order.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalAssembly {
    pub stiffness: DMatrix<f64>,
    pub load: DVector<f64>,
}

/// Integrates a weak form over one element (domain element or boundary
/// sub-element).
///
/// Trial/test pairs that cannot couple for the given finite element are
/// pruned without evaluating the kernel, so mixed elements never pay for
/// their structurally zero velocity cross-blocks.
pub fn assemble_local<W: WeakForm + ?Sized>(
    mesh: &Mesh,
    element: &Element,
    finite_element: FiniteElement,
    form: &W,
    quadrature: &Quadrature,
) -> Result<LocalAssembly> {
    let dofs: Vec<&Dof> = element.dofs().in_nefv_order().collect();
    let n = dofs.len();
    let mut stiffness = DMatrix::zeros(n, n);
    let mut load = DVector::zeros(n);

    for (weight, point) in quadrature.iter() {
        let ctx = ElementCtx::at(mesh, element, *point)?;
        let scale = weight * ctx.jacobian.det;
        for test in &dofs {
            load[test.local_index] += scale * form.rhs(&ctx, test)?;
            for trial in &dofs {
                if !finite_element.is_dof_coupled(trial, test) {
                    continue;
                }
                stiffness[(test.local_index, trial.local_index)] +=
                    scale * form.lhs(&ctx, trial, test)?;
            }
        }
    }
    Ok(LocalAssembly { stiffness, load })
}
