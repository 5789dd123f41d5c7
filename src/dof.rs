//! Degree-of-freedom bookkeeping: per-element DOF lists in canonical
//! node/edge/volume order and the deterministic global numbering scheme.

use crate::block::BlockLayout;
use crate::element::GeometryKind;
use crate::error::{FemError, Result};
use crate::mesh::Mesh;
use crate::shape::{FluxShapeFn, ScalarShapeFn, ShapeFn, VectorShapeFn};
use log::debug;
use serde::{Deserialize, Serialize};

/// The geometric entity a DOF is attached to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DofOwner {
    Node,
    Edge,
    Element,
}

/// A single degree of freedom as seen from one element.
///
/// `local_index` is the DOF's position in the element's canonical
/// node-edge-volume order and indexes rows/columns of the element's
/// local matrices. `global_index` addresses the global system and is shared
/// between all elements that see the same DOF. `component` is the
/// vector-valued-field component the DOF contributes to, `None` for scalar
/// problems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dof {
    pub local_index: usize,
    pub global_index: usize,
    pub owner: DofOwner,
    pub component: Option<usize>,
    pub shape: ShapeFn,
}

/// An element's DOFs, partitioned by owning entity.
///
/// Iteration order is always node partitions first (in element-local node
/// order), then edge partitions, then volume (element-interior) DOFs. Local
/// indices follow this order, so they are stable under boundary restriction
/// and re-assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DofList {
    node_dofs: Vec<Vec<Dof>>,
    edge_dofs: Vec<Vec<Dof>>,
    volume_dofs: Vec<Dof>,
}

impl DofList {
    pub fn push_node_dof(&mut self, local_node: usize, dof: Dof) {
        if self.node_dofs.len() <= local_node {
            self.node_dofs.resize(local_node + 1, Vec::new());
        }
        self.node_dofs[local_node].push(dof);
    }

    pub fn push_edge_dof(&mut self, local_edge: usize, dof: Dof) {
        if self.edge_dofs.len() <= local_edge {
            self.edge_dofs.resize(local_edge + 1, Vec::new());
        }
        self.edge_dofs[local_edge].push(dof);
    }

    pub fn push_volume_dof(&mut self, dof: Dof) {
        self.volume_dofs.push(dof);
    }

    /// DOFs attached to one element-local node.
    pub fn node_dofs(&self, local_node: usize) -> &[Dof] {
        self.node_dofs
            .get(local_node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// DOFs attached to one element-local edge.
    pub fn edge_dofs(&self, local_edge: usize) -> &[Dof] {
        self.edge_dofs
            .get(local_edge)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn volume_dofs(&self) -> &[Dof] {
        &self.volume_dofs
    }

    /// All DOFs in canonical node-edge-volume order.
    pub fn in_nefv_order(&self) -> impl Iterator<Item = &Dof> {
        self.node_dofs
            .iter()
            .flatten()
            .chain(self.edge_dofs.iter().flatten())
            .chain(self.volume_dofs.iter())
    }

    pub fn len(&self) -> usize {
        self.in_nefv_order().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reassigns local indices to match the canonical iteration order.
    pub(crate) fn renumber_local(&mut self) {
        let mut next = 0;
        for partition in self.node_dofs.iter_mut().chain(self.edge_dofs.iter_mut()) {
            for dof in partition {
                dof.local_index = next;
                next += 1;
            }
        }
        for dof in &mut self.volume_dofs {
            dof.local_index = next;
            next += 1;
        }
    }
}

/// The closed set of supported finite elements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FiniteElement {
    /// Scalar P1 on triangles.
    LinearTriangle,
    /// Scalar P2 on triangles with mid-edge nodes.
    QuadraticTriangle,
    /// Scalar Q1 on quadrilaterals.
    BilinearQuad,
    /// P1 velocity with element-constant pressure on triangles.
    LinearVelocityConstantPressure,
    /// Q1 velocity with element-constant pressure on quadrilaterals.
    BilinearVelocityConstantPressure,
    /// Lowest-order Raviart-Thomas edge fluxes with element-constant
    /// potential on triangles, for the mixed Laplace formulation.
    RaviartThomasConstantPressure,
}

impl FiniteElement {
    /// Number of vector-valued-field components. Mixed velocity/pressure
    /// elements expose components 0 and 1 for velocity and 2 for pressure;
    /// the Raviart-Thomas element exposes 0 for flux and 1 for the
    /// potential.
    pub fn num_components(&self) -> usize {
        match self {
            FiniteElement::LinearTriangle
            | FiniteElement::QuadraticTriangle
            | FiniteElement::BilinearQuad => 1,
            FiniteElement::RaviartThomasConstantPressure => 2,
            FiniteElement::LinearVelocityConstantPressure
            | FiniteElement::BilinearVelocityConstantPressure => 3,
        }
    }

    pub fn is_mixed(&self) -> bool {
        self.num_components() > 1
    }

    pub fn geometry_kind(&self) -> GeometryKind {
        match self {
            FiniteElement::LinearTriangle
            | FiniteElement::QuadraticTriangle
            | FiniteElement::LinearVelocityConstantPressure
            | FiniteElement::RaviartThomasConstantPressure => GeometryKind::Triangle,
            FiniteElement::BilinearQuad
            | FiniteElement::BilinearVelocityConstantPressure => GeometryKind::Quadrilateral,
        }
    }

    /// Total number of global DOFs on a mesh.
    pub fn total_dofs(&self, mesh: &Mesh) -> usize {
        match self {
            FiniteElement::LinearTriangle
            | FiniteElement::QuadraticTriangle
            | FiniteElement::BilinearQuad => mesh.num_nodes(),
            FiniteElement::RaviartThomasConstantPressure => {
                mesh.edges().len() + mesh.num_elements()
            }
            FiniteElement::LinearVelocityConstantPressure
            | FiniteElement::BilinearVelocityConstantPressure => {
                2 * mesh.num_nodes() + mesh.num_elements()
            }
        }
    }

    /// Block partition of the global DOF range for mixed elements, one block
    /// per field: velocity components plus pressure, or fluxes plus
    /// potentials.
    pub fn block_layout(&self, mesh: &Mesh) -> Result<BlockLayout> {
        match self {
            FiniteElement::LinearVelocityConstantPressure
            | FiniteElement::BilinearVelocityConstantPressure => Ok(BlockLayout::new(vec![
                mesh.num_nodes(),
                mesh.num_nodes(),
                mesh.num_elements(),
            ])),
            FiniteElement::RaviartThomasConstantPressure => Ok(BlockLayout::new(vec![
                mesh.edges().len(),
                mesh.num_elements(),
            ])),
            _ => Err(FemError::Unsupported {
                operation: "block layout of a scalar finite element",
            }),
        }
    }

    /// Whether a pair of trial/test DOFs can produce a nonzero local matrix
    /// entry for the weak forms of this element. Pressure DOFs couple with
    /// everything; distinct velocity components do not couple directly.
    pub fn is_dof_coupled(&self, a: &Dof, b: &Dof) -> bool {
        match (a.component, b.component) {
            (None, _) | (_, None) => true,
            (Some(ca), Some(cb)) => {
                let pressure = self.num_components() - 1;
                ca == pressure || cb == pressure || ca == cb
            }
        }
    }

    /// The VVF component whose boundary marking governs a DOF: component 0
    /// for scalar DOFs, the velocity component for node-attached vector
    /// DOFs, and `None` for element-interior DOFs (constant pressures),
    /// which carry no boundary type.
    pub fn boundary_component(&self, dof: &Dof) -> Result<Option<usize>> {
        match dof.component {
            None => Ok(Some(0)),
            Some(component) if component < self.num_components() => {
                if dof.owner == DofOwner::Node {
                    Ok(Some(component))
                } else {
                    Ok(None)
                }
            }
            Some(component) => Err(FemError::InvalidComponent {
                component,
                num_components: self.num_components(),
            }),
        }
    }

    /// Quadrature degree that integrates this element's stiffness integrands
    /// exactly on affine geometry.
    pub fn default_quadrature_degree(&self) -> usize {
        match self {
            FiniteElement::LinearTriangle | FiniteElement::RaviartThomasConstantPressure => 2,
            FiniteElement::QuadraticTriangle => 4,
            FiniteElement::BilinearQuad => 3,
            FiniteElement::LinearVelocityConstantPressure
            | FiniteElement::BilinearVelocityConstantPressure => 3,
        }
    }

    fn scalar_basis(&self, local_node: usize) -> ScalarShapeFn {
        match self {
            FiniteElement::LinearTriangle | FiniteElement::LinearVelocityConstantPressure => {
                ScalarShapeFn::TriP1 { vertex: local_node }
            }
            FiniteElement::QuadraticTriangle => ScalarShapeFn::TriP2 { node: local_node },
            FiniteElement::BilinearQuad | FiniteElement::BilinearVelocityConstantPressure => {
                ScalarShapeFn::QuadQ1 { vertex: local_node }
            }
            FiniteElement::RaviartThomasConstantPressure => {
                unreachable!("edge-flux elements carry no node shape functions")
            }
        }
    }

    /// Nodes per element this element interpolates over.
    fn nodes_per_element(&self) -> usize {
        match self {
            FiniteElement::LinearTriangle
            | FiniteElement::LinearVelocityConstantPressure
            | FiniteElement::RaviartThomasConstantPressure => 3,
            FiniteElement::QuadraticTriangle => 6,
            FiniteElement::BilinearQuad | FiniteElement::BilinearVelocityConstantPressure => 4,
        }
    }
}

/// Generates and owns the global DOF numbering for one mesh/element pair.
///
/// Construction freezes the mesh; the recorded node/edge/element counts pin
/// the numbering scheme, and applying the generator to a structurally
/// different mesh is rejected. Global indices are pure functions of arena
/// indices: node-owned DOFs get `component * num_nodes + node`, edge-owned
/// flux DOFs get the edge's arena index, and element-owned pressure DOFs
/// follow after all node or edge DOFs.
#[derive(Debug, Clone)]
pub struct DofGenerator {
    element: FiniteElement,
    num_nodes: usize,
    num_edges: usize,
    num_elements: usize,
}

impl DofGenerator {
    pub fn new(mesh: &mut Mesh, element: FiniteElement) -> Self {
        mesh.freeze();
        Self {
            element,
            num_nodes: mesh.num_nodes(),
            num_edges: mesh.edges().len(),
            num_elements: mesh.num_elements(),
        }
    }

    pub fn finite_element(&self) -> FiniteElement {
        self.element
    }

    pub fn total_dofs(&self) -> usize {
        match self.element {
            FiniteElement::RaviartThomasConstantPressure => self.num_edges + self.num_elements,
            fe if fe.num_components() == 1 => self.num_nodes,
            _ => 2 * self.num_nodes + self.num_elements,
        }
    }

    /// Global index of a node-owned DOF for one velocity (or scalar) component.
    pub fn node_dof_index(&self, component: usize, node: usize) -> usize {
        component * self.num_nodes + node
    }

    /// Global index of an edge-owned flux DOF.
    pub fn flux_dof_index(&self, edge: usize) -> usize {
        edge
    }

    /// Global index of an element-owned pressure (or potential) DOF.
    pub fn pressure_dof_index(&self, element: usize) -> usize {
        match self.element {
            FiniteElement::RaviartThomasConstantPressure => self.num_edges + element,
            _ => 2 * self.num_nodes + element,
        }
    }

    /// Populates the DOF list of every element in the mesh.
    pub fn generate(&self, mesh: &mut Mesh) -> Result<()> {
        if mesh.num_nodes() != self.num_nodes || mesh.num_elements() != self.num_elements {
            return Err(FemError::DofGeneratorMismatch {
                expected_nodes: self.num_nodes,
                expected_elements: self.num_elements,
                actual_nodes: mesh.num_nodes(),
                actual_elements: mesh.num_elements(),
            });
        }
        for element_index in 0..mesh.num_elements() {
            self.generate_for_element(mesh, element_index)?;
        }
        debug!(
            "generated {} global DOFs ({:?}) over {} elements",
            self.total_dofs(),
            self.element,
            self.num_elements
        );
        Ok(())
    }

    fn generate_for_element(&self, mesh: &mut Mesh, element_index: usize) -> Result<()> {
        let kind = mesh.element(element_index).kind();
        if kind != self.element.geometry_kind() {
            return Err(FemError::UnsupportedTopology {
                kind,
                context: "DOF generation for this finite element",
            });
        }
        let nodes = mesh.element(element_index).node_indices().to_vec();
        let expected = self.element.nodes_per_element();
        if nodes.len() != expected {
            return Err(FemError::DimensionMismatch {
                expected,
                actual: nodes.len(),
                context: "element node count for this finite element",
            });
        }

        let mut dofs = DofList::default();
        if self.element == FiniteElement::RaviartThomasConstantPressure {
            let local_edges = mesh.element(element_index).local_edges().to_vec();
            if local_edges.is_empty() {
                return Err(FemError::EdgesNotBuilt);
            }
            for local_edge in &local_edges {
                let global_edge = local_edge.global_edge.ok_or(FemError::EdgesNotBuilt)?;
                dofs.push_edge_dof(
                    local_edge.local_index,
                    Dof {
                        local_index: 0,
                        global_index: self.flux_dof_index(global_edge),
                        owner: DofOwner::Edge,
                        component: Some(0),
                        shape: ShapeFn::Flux(FluxShapeFn {
                            local_edge: local_edge.local_index,
                            same_orientation: local_edge.same_orientation,
                        }),
                    },
                );
            }
            dofs.push_volume_dof(Dof {
                local_index: 0,
                global_index: self.pressure_dof_index(element_index),
                owner: DofOwner::Element,
                component: Some(1),
                shape: ShapeFn::Scalar(ScalarShapeFn::Const),
            });
        } else if self.element.is_mixed() {
            for (local_node, &node) in nodes.iter().enumerate() {
                let scalar = self.element.scalar_basis(local_node);
                for component in 0..2 {
                    dofs.push_node_dof(
                        local_node,
                        Dof {
                            local_index: 0,
                            global_index: self.node_dof_index(component, node),
                            owner: DofOwner::Node,
                            component: Some(component),
                            shape: ShapeFn::Vector(VectorShapeFn { component, scalar }),
                        },
                    );
                }
            }
            dofs.push_volume_dof(Dof {
                local_index: 0,
                global_index: self.pressure_dof_index(element_index),
                owner: DofOwner::Element,
                component: Some(2),
                shape: ShapeFn::Scalar(ScalarShapeFn::Const),
            });
        } else {
            for (local_node, &node) in nodes.iter().enumerate() {
                let scalar = self.element.scalar_basis(local_node);
                dofs.push_node_dof(
                    local_node,
                    Dof {
                        local_index: 0,
                        global_index: self.node_dof_index(0, node),
                        owner: DofOwner::Node,
                        component: None,
                        shape: ShapeFn::Scalar(scalar),
                    },
                );
            }
        }
        dofs.renumber_local();
        *mesh.element_mut(element_index).dofs_mut() = dofs;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::procedural::{unit_square_quads, unit_square_triangles};

    #[test]
    fn linear_triangle_dofs_follow_node_indices() {
        let mut mesh = unit_square_triangles(1).unwrap();
        let generator = DofGenerator::new(&mut mesh, FiniteElement::LinearTriangle);
        generator.generate(&mut mesh).unwrap();
        assert!(mesh.is_frozen());
        for element in mesh.elements() {
            let dofs: Vec<_> = element.dofs().in_nefv_order().collect();
            assert_eq!(dofs.len(), 3);
            for (position, dof) in dofs.iter().enumerate() {
                assert_eq!(dof.local_index, position);
                assert_eq!(dof.global_index, element.node_indices()[position]);
                assert_eq!(dof.component, None);
            }
        }
    }

    #[test]
    fn quadratic_triangle_has_six_node_dofs() {
        let mut mesh = unit_square_triangles(1).unwrap();
        mesh.add_quadratic_nodes().unwrap();
        let generator = DofGenerator::new(&mut mesh, FiniteElement::QuadraticTriangle);
        generator.generate(&mut mesh).unwrap();
        assert_eq!(generator.total_dofs(), mesh.num_nodes());
        for element in mesh.elements() {
            assert_eq!(element.dofs().len(), 6);
        }
    }

    #[test]
    fn mixed_element_numbering_puts_pressure_last() {
        let mut mesh = unit_square_triangles(1).unwrap();
        let n = mesh.num_nodes();
        let generator =
            DofGenerator::new(&mut mesh, FiniteElement::LinearVelocityConstantPressure);
        generator.generate(&mut mesh).unwrap();
        assert_eq!(generator.total_dofs(), 2 * n + mesh.num_elements());

        for element in mesh.elements() {
            let dofs: Vec<_> = element.dofs().in_nefv_order().cloned().collect();
            // Two velocity DOFs per node, interleaved per node, pressure last.
            assert_eq!(dofs.len(), 7);
            for (local_node, &node) in element.node_indices().iter().enumerate() {
                let u = &dofs[2 * local_node];
                let v = &dofs[2 * local_node + 1];
                assert_eq!(u.global_index, node);
                assert_eq!(v.global_index, n + node);
                assert_eq!(u.component, Some(0));
                assert_eq!(v.component, Some(1));
            }
            let pressure = dofs.last().unwrap();
            assert_eq!(pressure.owner, DofOwner::Element);
            assert_eq!(pressure.global_index, 2 * n + element.index());
            assert_eq!(pressure.local_index, 6);
        }
    }

    #[test]
    fn raviart_thomas_dofs_attach_to_shared_edges() {
        let mut mesh = unit_square_triangles(1).unwrap();
        let generator =
            DofGenerator::new(&mut mesh, FiniteElement::RaviartThomasConstantPressure);
        generator.generate(&mut mesh).unwrap();
        assert_eq!(
            generator.total_dofs(),
            mesh.edges().len() + mesh.num_elements()
        );

        for element in mesh.elements() {
            let dofs: Vec<_> = element.dofs().in_nefv_order().cloned().collect();
            assert_eq!(dofs.len(), 4);
            for (k, dof) in dofs[..3].iter().enumerate() {
                assert_eq!(dof.local_index, k);
                assert_eq!(dof.owner, DofOwner::Edge);
                assert_eq!(dof.component, Some(0));
                assert_eq!(
                    dof.global_index,
                    element.local_edges()[k].global_edge.unwrap()
                );
                assert_eq!(element.dofs().edge_dofs(k).len(), 1);
            }
            let potential = &dofs[3];
            assert_eq!(potential.owner, DofOwner::Element);
            assert_eq!(potential.global_index, mesh.edges().len() + element.index());
        }

        // Both triangles resolve the diagonal to the same global flux
        // unknown, with opposite orientation signs.
        let shared = mesh.edges().iter().find(|e| !e.is_boundary()).unwrap();
        let mut signs = Vec::new();
        for &e in shared.elements() {
            let dof = mesh
                .element(e)
                .dofs()
                .in_nefv_order()
                .find(|d| d.global_index == shared.index())
                .unwrap();
            match dof.shape {
                ShapeFn::Flux(flux) => signs.push(flux.same_orientation),
                _ => panic!("edge DOF should carry a flux shape"),
            }
        }
        assert_eq!(signs.iter().filter(|s| **s).count(), 1);
    }

    #[test]
    fn distinct_velocity_components_do_not_couple() {
        let mut mesh = unit_square_triangles(1).unwrap();
        let fe = FiniteElement::LinearVelocityConstantPressure;
        let generator = DofGenerator::new(&mut mesh, fe);
        generator.generate(&mut mesh).unwrap();
        let dofs: Vec<_> = mesh.element(0).dofs().in_nefv_order().cloned().collect();
        let u = &dofs[0];
        let v = &dofs[1];
        let pressure = dofs.last().unwrap();
        assert!(!fe.is_dof_coupled(u, v));
        assert!(fe.is_dof_coupled(u, u));
        assert!(fe.is_dof_coupled(u, pressure));
        assert!(fe.is_dof_coupled(pressure, v));
    }

    #[test]
    fn pressure_dofs_carry_no_boundary_component() {
        let mut mesh = unit_square_triangles(1).unwrap();
        let fe = FiniteElement::LinearVelocityConstantPressure;
        let generator = DofGenerator::new(&mut mesh, fe);
        generator.generate(&mut mesh).unwrap();
        let dofs: Vec<_> = mesh.element(0).dofs().in_nefv_order().cloned().collect();
        assert_eq!(fe.boundary_component(&dofs[0]).unwrap(), Some(0));
        assert_eq!(fe.boundary_component(&dofs[1]).unwrap(), Some(1));
        assert_eq!(fe.boundary_component(dofs.last().unwrap()).unwrap(), None);

        let mut bad = dofs[0].clone();
        bad.component = Some(7);
        assert!(matches!(
            fe.boundary_component(&bad),
            Err(FemError::InvalidComponent { .. })
        ));
    }

    #[test]
    fn generator_rejects_structurally_different_mesh() {
        let mut mesh = unit_square_triangles(1).unwrap();
        let generator = DofGenerator::new(&mut mesh, FiniteElement::LinearTriangle);
        let mut other = unit_square_triangles(2).unwrap();
        assert!(matches!(
            generator.generate(&mut other),
            Err(FemError::DofGeneratorMismatch { .. })
        ));
    }

    #[test]
    fn generator_rejects_wrong_topology() {
        let mut mesh = unit_square_quads(1).unwrap();
        let generator = DofGenerator::new(&mut mesh, FiniteElement::LinearTriangle);
        assert!(matches!(
            generator.generate(&mut mesh),
            Err(FemError::UnsupportedTopology { .. })
        ));
    }
}
