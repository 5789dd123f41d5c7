//! Scatter of local contributions into global sparse systems.
//!
//! Global matrices are accumulated as COO triplets; duplicate entries are
//! summed on conversion to CSR. The parallel path evaluates local
//! contributions across a thread pool and scatters them sequentially in
//! element order, so sequential and parallel assembly produce identical
//! triplet streams.

use crate::assembly::local::{assemble_local, LocalAssembly};
use crate::block::{BlockMatrix, BlockVector};
use crate::dof::FiniteElement;
use crate::element::{Element, GeometryKind};
use crate::error::{FemError, Result};
use crate::mesh::{Mesh, NodeType};
use crate::quadrature::Quadrature;
use crate::weakform::WeakForm;
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::coo::CooMatrix;
use nalgebra_sparse::csr::CsrMatrix;
use rayon::prelude::*;

/// A global stiffness/load pair under accumulation.
#[derive(Debug, Clone)]
pub struct GlobalSystem {
    pub stiffness: CooMatrix<f64>,
    pub load: DVector<f64>,
}

impl GlobalSystem {
    pub fn zeros(num_dofs: usize) -> Self {
        Self {
            stiffness: CooMatrix::new(num_dofs, num_dofs),
            load: DVector::zeros(num_dofs),
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.load.len()
    }

    /// Adds one element's local contribution at its DOFs' global indices.
    pub fn scatter(&mut self, element: &Element, local: &LocalAssembly) {
        for test in element.dofs().in_nefv_order() {
            self.load[test.global_index] += local.load[test.local_index];
            for trial in element.dofs().in_nefv_order() {
                let value = local.stiffness[(test.local_index, trial.local_index)];
                if value != 0.0 {
                    self.stiffness
                        .push(test.global_index, trial.global_index, value);
                }
            }
        }
    }

    /// Compresses the accumulated triplets, summing duplicates.
    pub fn to_csr(&self) -> CsrMatrix<f64> {
        CsrMatrix::from(&self.stiffness)
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.stiffness.nrows(), self.stiffness.ncols());
        for (i, j, value) in self.stiffness.triplet_iter() {
            dense[(i, j)] += value;
        }
        dense
    }
}

/// Assembles one weak form over all domain elements of a mesh.
pub struct Assembler<W> {
    form: W,
    finite_element: FiniteElement,
    quadrature_degree: Option<usize>,
}

impl<W: WeakForm> Assembler<W> {
    pub fn new(finite_element: FiniteElement, form: W) -> Self {
        Self {
            form,
            finite_element,
            quadrature_degree: None,
        }
    }

    /// Overrides the element's default quadrature degree.
    pub fn with_quadrature_degree(mut self, degree: usize) -> Self {
        self.quadrature_degree = Some(degree);
        self
    }

    fn degree(&self) -> usize {
        self.quadrature_degree
            .unwrap_or_else(|| self.finite_element.default_quadrature_degree())
    }

    pub fn assemble_global(&self, mesh: &Mesh) -> Result<GlobalSystem> {
        let mut system = GlobalSystem::zeros(self.finite_element.total_dofs(mesh));
        self.assemble_global_into(mesh, &mut system)?;
        Ok(system)
    }

    /// Accumulates into an existing system, for chaining multiple forms over
    /// the same DOF layout.
    pub fn assemble_global_into(&self, mesh: &Mesh, system: &mut GlobalSystem) -> Result<()> {
        let expected = self.finite_element.total_dofs(mesh);
        if system.num_dofs() != expected {
            return Err(FemError::DimensionMismatch {
                expected,
                actual: system.num_dofs(),
                context: "global system size for chained assembly",
            });
        }
        let quadrature =
            Quadrature::for_kind(self.finite_element.geometry_kind(), self.degree())?;
        for element in mesh.elements() {
            let local =
                assemble_local(mesh, element, self.finite_element, &self.form, &quadrature)?;
            system.scatter(element, &local);
        }
        debug!(
            "assembled {} elements into {} global DOFs ({} triplets)",
            mesh.num_elements(),
            expected,
            system.stiffness.nnz()
        );
        Ok(())
    }

    /// Parallel variant of [`assemble_global`](Self::assemble_global).
    /// Local contributions are computed across the rayon pool; the scatter
    /// stays sequential and element-ordered, so the result is bitwise equal
    /// to the sequential path.
    pub fn assemble_global_par(&self, mesh: &Mesh) -> Result<GlobalSystem> {
        let quadrature =
            Quadrature::for_kind(self.finite_element.geometry_kind(), self.degree())?;
        let locals: Vec<LocalAssembly> = mesh
            .elements()
            .par_iter()
            .map(|element| {
                assemble_local(mesh, element, self.finite_element, &self.form, &quadrature)
            })
            .collect::<Result<_>>()?;

        let mut system = GlobalSystem::zeros(self.finite_element.total_dofs(mesh));
        for (element, local) in mesh.elements().iter().zip(&locals) {
            system.scatter(element, local);
        }
        Ok(system)
    }
}

/// Chains a domain form with a boundary form over the same global system.
///
/// The domain pass covers every element; the boundary pass walks the border
/// edges, builds each edge's boundary sub-element and integrates the
/// boundary form over it. Dirichlet and unmarked borders contribute nothing
/// here (Dirichlet conditions are imposed after assembly); only Neumann and
/// Robin borders are integrated. Border classification reads the scalar
/// component and rejects edges whose endpoints disagree, so only scalar
/// finite elements are accepted; multi-component elements carry per-component
/// border markers and their boundary terms belong in the weak form itself.
pub struct DomainBoundaryAssembler<W, B> {
    domain_form: W,
    boundary_form: B,
    finite_element: FiniteElement,
    quadrature_degree: Option<usize>,
}

impl<W: WeakForm, B: WeakForm> DomainBoundaryAssembler<W, B> {
    pub fn new(finite_element: FiniteElement, domain_form: W, boundary_form: B) -> Self {
        Self {
            domain_form,
            boundary_form,
            finite_element,
            quadrature_degree: None,
        }
    }

    pub fn with_quadrature_degree(mut self, degree: usize) -> Self {
        self.quadrature_degree = Some(degree);
        self
    }

    pub fn assemble_global(&self, mesh: &Mesh) -> Result<GlobalSystem> {
        if self.finite_element.num_components() != 1 {
            return Err(FemError::Unsupported {
                operation: "domain/boundary chained assembly for a multi-component element",
            });
        }
        let degree = self
            .quadrature_degree
            .unwrap_or_else(|| self.finite_element.default_quadrature_degree());
        let mut system = GlobalSystem::zeros(self.finite_element.total_dofs(mesh));

        let domain_quadrature =
            Quadrature::for_kind(self.finite_element.geometry_kind(), degree)?;
        for element in mesh.elements() {
            let local = assemble_local(
                mesh,
                element,
                self.finite_element,
                &self.domain_form,
                &domain_quadrature,
            )?;
            system.scatter(element, &local);
        }

        let boundary_quadrature = Quadrature::for_kind(GeometryKind::Segment, degree)?;
        let mut integrated = 0;
        for edge in mesh.edges().iter().filter(|e| e.is_boundary()) {
            match mesh.edge_border_type(edge.index(), 0)? {
                NodeType::Neumann | NodeType::Robin => {}
                NodeType::Dirichlet | NodeType::Interior => continue,
            }
            let element = mesh.element(edge.elements()[0]);
            let local_edge = element
                .local_edges()
                .iter()
                .position(|le| le.global_edge == Some(edge.index()))
                .expect("boundary edge not registered on its element");
            let sub = element.boundary_element_for(local_edge)?;
            let local = assemble_local(
                mesh,
                &sub,
                self.finite_element,
                &self.boundary_form,
                &boundary_quadrature,
            )?;
            system.scatter(&sub, &local);
            integrated += 1;
        }
        debug!("boundary pass integrated {integrated} border edges");
        Ok(system)
    }
}

/// Assembles a mixed (vector-valued) weak form directly into a
/// block-partitioned system: one block per velocity component plus one for
/// the element-constant pressures.
pub struct VectorAssembler<W> {
    form: W,
    finite_element: FiniteElement,
    quadrature_degree: Option<usize>,
}

impl<W: WeakForm> VectorAssembler<W> {
    pub fn new(finite_element: FiniteElement, form: W) -> Self {
        Self {
            form,
            finite_element,
            quadrature_degree: None,
        }
    }

    pub fn with_quadrature_degree(mut self, degree: usize) -> Self {
        self.quadrature_degree = Some(degree);
        self
    }

    pub fn assemble_block(&self, mesh: &Mesh) -> Result<(BlockMatrix, BlockVector)> {
        let layout = self.finite_element.block_layout(mesh)?;
        let mut matrix = BlockMatrix::zeros(layout.clone());
        let mut rhs = BlockVector::zeros(layout);

        let degree = self
            .quadrature_degree
            .unwrap_or_else(|| self.finite_element.default_quadrature_degree());
        let quadrature = Quadrature::for_kind(self.finite_element.geometry_kind(), degree)?;
        for element in mesh.elements() {
            let local =
                assemble_local(mesh, element, self.finite_element, &self.form, &quadrature)?;
            for test in element.dofs().in_nefv_order() {
                rhs.add(test.global_index, local.load[test.local_index]);
                for trial in element.dofs().in_nefv_order() {
                    let value = local.stiffness[(test.local_index, trial.local_index)];
                    if value != 0.0 {
                        matrix.add(test.global_index, trial.global_index, value);
                    }
                }
            }
        }
        Ok((matrix, rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dof::DofGenerator;
    use crate::mesh::procedural::unit_square_triangles;
    use crate::weakform::{Constant, LaplaceBoundaryWeakForm, LaplaceWeakForm, StokesWeakForm};
    use matrixcompare::assert_matrix_eq;

    fn poisson_assembler() -> Assembler<LaplaceWeakForm> {
        Assembler::new(
            FiniteElement::LinearTriangle,
            LaplaceWeakForm::poisson(Box::new(Constant(1.0)), Box::new(Constant(1.0))),
        )
    }

    fn p1_mesh(n: usize) -> Mesh {
        let mut mesh = unit_square_triangles(n).unwrap();
        let generator = DofGenerator::new(&mut mesh, FiniteElement::LinearTriangle);
        generator.generate(&mut mesh).unwrap();
        mesh
    }

    #[test]
    fn global_laplacian_is_symmetric_with_zero_row_sums() {
        let mesh = p1_mesh(3);
        let system = poisson_assembler().assemble_global(&mesh).unwrap();
        let dense = system.to_dense();
        assert_matrix_eq!(dense, dense.transpose(), comp = abs, tol = 1e-13);
        // Constants lie in the kernel of the pure-Neumann Laplacian.
        for row in 0..dense.nrows() {
            assert!(dense.row(row).sum().abs() < 1e-12);
        }
        // Total load is the integral of f = 1 over the unit square.
        assert!((system.load.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn parallel_assembly_matches_sequential() {
        let mesh = p1_mesh(4);
        let assembler = poisson_assembler();
        let sequential = assembler.assemble_global(&mesh).unwrap();
        let parallel = assembler.assemble_global_par(&mesh).unwrap();
        assert_matrix_eq!(sequential.to_dense(), parallel.to_dense());
        assert_eq!(sequential.load, parallel.load);
    }

    #[test]
    fn chained_accumulation_matches_the_sum_of_standalone_passes() {
        let mesh = p1_mesh(3);
        let stiffness_only = Assembler::new(
            FiniteElement::LinearTriangle,
            LaplaceWeakForm::poisson(Box::new(Constant(2.0)), Box::new(Constant(0.0))),
        );
        let mass_and_load = Assembler::new(
            FiniteElement::LinearTriangle,
            LaplaceWeakForm {
                k: Box::new(Constant(0.0)),
                c: Some(Box::new(Constant(1.0))),
                f: Box::new(Constant(3.0)),
            },
        );

        let mut chained = GlobalSystem::zeros(mesh.num_nodes());
        stiffness_only
            .assemble_global_into(&mesh, &mut chained)
            .unwrap();
        mass_and_load
            .assemble_global_into(&mesh, &mut chained)
            .unwrap();

        let first = stiffness_only.assemble_global(&mesh).unwrap();
        let second = mass_and_load.assemble_global(&mesh).unwrap();
        let summed = first.to_dense() + second.to_dense();
        assert_matrix_eq!(chained.to_dense(), summed, comp = abs, tol = 1e-13);
        let summed_load = &first.load + &second.load;
        for i in 0..mesh.num_nodes() {
            assert!((chained.load[i] - summed_load[i]).abs() < 1e-13);
        }
    }

    #[test]
    fn domain_and_boundary_passes_add_independently() {
        let mut mesh = unit_square_triangles(2).unwrap();
        mesh.mark_border_nodes(&[0], &[(NodeType::Robin, None)]).unwrap();
        let generator = DofGenerator::new(&mut mesh, FiniteElement::LinearTriangle);
        generator.generate(&mut mesh).unwrap();

        let chained = DomainBoundaryAssembler::new(
            FiniteElement::LinearTriangle,
            LaplaceWeakForm::poisson(Box::new(Constant(1.0)), Box::new(Constant(1.0))),
            LaplaceBoundaryWeakForm {
                d: Some(Box::new(Constant(1.5))),
                g: Some(Box::new(Constant(0.5))),
            },
        )
        .assemble_global(&mesh)
        .unwrap();

        let domain_only = poisson_assembler().assemble_global(&mesh).unwrap();
        // The boundary contribution alone, via a zero domain form.
        let boundary_only = DomainBoundaryAssembler::new(
            FiniteElement::LinearTriangle,
            LaplaceWeakForm::poisson(Box::new(Constant(0.0)), Box::new(Constant(0.0))),
            LaplaceBoundaryWeakForm {
                d: Some(Box::new(Constant(1.5))),
                g: Some(Box::new(Constant(0.5))),
            },
        )
        .assemble_global(&mesh)
        .unwrap();

        let summed = domain_only.to_dense() + boundary_only.to_dense();
        assert_matrix_eq!(chained.to_dense(), summed, comp = abs, tol = 1e-13);
        let summed_load = &domain_only.load + &boundary_only.load;
        for i in 0..mesh.num_nodes() {
            assert!((chained.load[i] - summed_load[i]).abs() < 1e-13);
        }
    }

    #[test]
    fn boundary_assembler_rejects_multi_component_elements() {
        let mut mesh = unit_square_triangles(1).unwrap();
        let generator =
            DofGenerator::new(&mut mesh, FiniteElement::LinearVelocityConstantPressure);
        generator.generate(&mut mesh).unwrap();

        let result = DomainBoundaryAssembler::new(
            FiniteElement::LinearVelocityConstantPressure,
            StokesWeakForm {
                nu: Box::new(Constant(1.0)),
                f: [Box::new(Constant(0.0)), Box::new(Constant(0.0))],
            },
            LaplaceBoundaryWeakForm {
                d: Some(Box::new(Constant(1.0))),
                g: None,
            },
        )
        .assemble_global(&mesh);
        assert!(matches!(result, Err(FemError::Unsupported { .. })));
    }

    #[test]
    fn chained_assembly_rejects_mismatched_system() {
        let mesh = p1_mesh(2);
        let mut wrong = GlobalSystem::zeros(3);
        assert!(matches!(
            poisson_assembler().assemble_global_into(&mesh, &mut wrong),
            Err(FemError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn robin_boundary_adds_mass_on_border_nodes_only() {
        let mut mesh = unit_square_triangles(2).unwrap();
        mesh.mark_border_nodes(&[0], &[(NodeType::Robin, None)]).unwrap();
        let generator = DofGenerator::new(&mut mesh, FiniteElement::LinearTriangle);
        generator.generate(&mut mesh).unwrap();

        let domain_only = poisson_assembler().assemble_global(&mesh).unwrap();
        let chained = DomainBoundaryAssembler::new(
            FiniteElement::LinearTriangle,
            LaplaceWeakForm::poisson(Box::new(Constant(1.0)), Box::new(Constant(1.0))),
            LaplaceBoundaryWeakForm {
                d: Some(Box::new(Constant(1.0))),
                g: Some(Box::new(Constant(2.0))),
            },
        )
        .assemble_global(&mesh)
        .unwrap();

        let difference = chained.to_dense() - domain_only.to_dense();
        let boundary = mesh.boundary_nodes().unwrap();
        for i in 0..mesh.num_nodes() {
            if boundary.contains(&i) {
                // Boundary mass is positive on the diagonal.
                assert!(difference[(i, i)] > 0.0);
            } else {
                assert!(difference.row(i).iter().all(|v| v.abs() < 1e-14));
                assert!(difference.column(i).iter().all(|v| v.abs() < 1e-14));
            }
        }
        // g = 2 integrated over the border of length 4.
        let load_difference = &chained.load - &domain_only.load;
        assert!((load_difference.sum() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn dirichlet_borders_are_skipped_by_the_boundary_pass() {
        let mut mesh = unit_square_triangles(2).unwrap();
        mesh.mark_border_nodes(&[0], &[(NodeType::Dirichlet, None)])
            .unwrap();
        let generator = DofGenerator::new(&mut mesh, FiniteElement::LinearTriangle);
        generator.generate(&mut mesh).unwrap();

        let chained = DomainBoundaryAssembler::new(
            FiniteElement::LinearTriangle,
            LaplaceWeakForm::poisson(Box::new(Constant(1.0)), Box::new(Constant(1.0))),
            LaplaceBoundaryWeakForm {
                d: Some(Box::new(Constant(1.0))),
                g: Some(Box::new(Constant(1.0))),
            },
        )
        .assemble_global(&mesh)
        .unwrap();
        let domain_only = poisson_assembler().assemble_global(&mesh).unwrap();
        assert_matrix_eq!(chained.to_dense(), domain_only.to_dense());
        assert_eq!(chained.load, domain_only.load);
    }

    #[test]
    fn block_assembly_requires_a_mixed_element() {
        let mesh = p1_mesh(1);
        let assembler = VectorAssembler::new(
            FiniteElement::LinearTriangle,
            LaplaceWeakForm::poisson(Box::new(Constant(1.0)), Box::new(Constant(0.0))),
        );
        assert!(matches!(
            assembler.assemble_block(&mesh),
            Err(FemError::Unsupported { .. })
        ));
    }
}
