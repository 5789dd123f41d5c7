//! Element topology and geometry: reference-to-physical maps, Jacobians,
//! oriented local edges and boundary sub-element extraction.

use crate::dof::{Dof, DofList, DofOwner};
use crate::error::{FemError, Result};
use crate::mesh::Mesh;
use crate::quadrature::RefPoint;
use crate::shape::{ScalarShapeFn, ShapeFn, VectorShapeFn};
use nalgebra::{Matrix2, Point3, Vector2};
use serde::{Deserialize, Serialize};

/// Topological kind of an element.
///
/// Geometry and shape functions are implemented for the 2D kinds and their
/// segment boundaries; the 3D kinds are recognized by the quadrature tables
/// but rejected with [`FemError::UnsupportedTopology`] elsewhere.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Segment,
    Triangle,
    Quadrilateral,
    Tetrahedron,
    Hexahedron,
}

impl GeometryKind {
    pub fn num_vertices(&self) -> usize {
        match self {
            GeometryKind::Segment => 2,
            GeometryKind::Triangle => 3,
            GeometryKind::Quadrilateral => 4,
            GeometryKind::Tetrahedron => 4,
            GeometryKind::Hexahedron => 8,
        }
    }

    pub fn reference_dim(&self) -> usize {
        match self {
            GeometryKind::Segment => 1,
            GeometryKind::Triangle | GeometryKind::Quadrilateral => 2,
            GeometryKind::Tetrahedron | GeometryKind::Hexahedron => 3,
        }
    }

    /// Local vertex pairs of the element's edges, in counterclockwise
    /// traversal order.
    pub fn local_edge_vertices(&self) -> &'static [[usize; 2]] {
        match self {
            GeometryKind::Segment => &[],
            GeometryKind::Triangle => &[[0, 1], [1, 2], [2, 0]],
            GeometryKind::Quadrilateral => &[[0, 1], [1, 2], [2, 3], [3, 0]],
            // 3D edge topology is not needed by the 2D pipeline.
            GeometryKind::Tetrahedron | GeometryKind::Hexahedron => &[],
        }
    }

    /// The isoparametric basis used for the coordinate transform. Always the
    /// lowest-order basis of the kind; higher-order field interpolation does
    /// not curve the geometry.
    fn geometric_basis(&self) -> Result<Vec<ScalarShapeFn>> {
        let basis = match self {
            GeometryKind::Segment => vec![
                ScalarShapeFn::SegP1 { vertex: 0 },
                ScalarShapeFn::SegP1 { vertex: 1 },
            ],
            GeometryKind::Triangle => (0..3)
                .map(|vertex| ScalarShapeFn::TriP1 { vertex })
                .collect(),
            GeometryKind::Quadrilateral => (0..4)
                .map(|vertex| ScalarShapeFn::QuadQ1 { vertex })
                .collect(),
            kind => {
                return Err(FemError::UnsupportedTopology {
                    kind: *kind,
                    context: "coordinate transform",
                })
            }
        };
        Ok(basis)
    }
}

/// An element's view of one of its edges.
///
/// `vertices` and `mid_nodes` index into the element's own node list;
/// `global_edge` points into the mesh edge arena once shared edges have been
/// built. `same_orientation` records whether the element traverses the global
/// edge from its first endpoint to its second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEdge {
    pub local_index: usize,
    pub vertices: [usize; 2],
    pub mid_nodes: Vec<usize>,
    pub global_edge: Option<usize>,
    pub same_orientation: bool,
}

/// Jacobian of the reference-to-physical map at one quadrature point.
///
/// For segments the transform is not square and only the metric factor is
/// available; `inv_t` is `None` there.
#[derive(Debug, Copy, Clone)]
pub struct JacobianData {
    pub det: f64,
    pub inv_t: Option<Matrix2<f64>>,
}

/// A domain element or a boundary sub-element derived from one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    index: usize,
    kind: GeometryKind,
    // Global node indices; the first `kind.num_vertices()` entries are the
    // vertices, mid-edge nodes follow in local-edge order (position
    // num_vertices + k is the midpoint of local edge k). Quadratic shape
    // functions are bound by that position.
    nodes: Vec<usize>,
    local_edges: Vec<LocalEdge>,
    // Set on boundary sub-elements only.
    parent: Option<usize>,
    dofs: DofList,
}

impl Element {
    pub fn new(index: usize, kind: GeometryKind, vertices: &[usize]) -> Self {
        Self {
            index,
            kind,
            nodes: vertices.to_vec(),
            local_edges: Vec::new(),
            parent: None,
            dofs: DofList::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    pub fn node_indices(&self) -> &[usize] {
        &self.nodes
    }

    pub fn local_edges(&self) -> &[LocalEdge] {
        &self.local_edges
    }

    /// Index of the parent domain element, for boundary sub-elements.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn dofs(&self) -> &DofList {
        &self.dofs
    }

    pub(crate) fn dofs_mut(&mut self) -> &mut DofList {
        &mut self.dofs
    }

    pub(crate) fn set_local_edges(&mut self, local_edges: Vec<LocalEdge>) {
        self.local_edges = local_edges;
    }

    /// Appends a mid-edge node and records it on the matching local edge.
    pub(crate) fn attach_edge_node(&mut self, global_edge: usize, node: usize) {
        let local_node = self.nodes.len();
        self.nodes.push(node);
        let local_edge = self
            .local_edges
            .iter_mut()
            .find(|le| le.global_edge == Some(global_edge))
            .expect("edge node attached to an element not adjacent to the edge");
        local_edge.mid_nodes.push(local_node);
    }

    /// Maps a reference point to physical coordinates.
    pub fn map_reference(&self, mesh: &Mesh, ref_point: &RefPoint) -> Result<Point3<f64>> {
        let basis = self.kind.geometric_basis()?;
        let mut coords = Point3::origin();
        for (vertex, shape) in basis.iter().enumerate() {
            let weight = shape.eval(ref_point);
            coords.coords += mesh.node(self.nodes[vertex]).coords().coords * weight;
        }
        Ok(coords)
    }

    /// Jacobian of the coordinate transform at a reference point.
    ///
    /// Fails with [`FemError::DegenerateElement`] when the determinant is not
    /// positive, which for counterclockwise vertex order indicates an
    /// inverted or collapsed element.
    pub fn jacobian(&self, mesh: &Mesh, ref_point: &RefPoint) -> Result<JacobianData> {
        if self.kind == GeometryKind::Segment {
            let a = mesh.node(self.nodes[0]).coords();
            let b = mesh.node(self.nodes[1]).coords();
            // Reference segment is [-1, 1].
            let det = (b - a).norm() / 2.0;
            if det <= 0.0 {
                return Err(FemError::DegenerateElement {
                    element: self.index,
                    measure: det,
                });
            }
            return Ok(JacobianData { det, inv_t: None });
        }

        let basis = self.kind.geometric_basis()?;
        let mut jac = Matrix2::zeros();
        for (vertex, shape) in basis.iter().enumerate() {
            let grad = shape.grad_ref(ref_point);
            let coords = mesh.node(self.nodes[vertex]).coords();
            // J += x_v * (dN_v/dxi)^T
            jac += Vector2::new(coords.x, coords.y) * grad.transpose();
        }
        let det = jac.determinant();
        if det <= 0.0 {
            return Err(FemError::DegenerateElement {
                element: self.index,
                measure: det,
            });
        }
        let inv_t = jac
            .try_inverse()
            .map(|inv| inv.transpose())
            .ok_or(FemError::DegenerateElement {
                element: self.index,
                measure: det,
            })?;
        Ok(JacobianData {
            det,
            inv_t: Some(inv_t),
        })
    }

    /// Outward unit normal of a boundary sub-element.
    ///
    /// Valid because boundary sub-elements inherit the parent's
    /// counterclockwise traversal order, which puts the domain on the left of
    /// the begin-to-end tangent.
    pub fn outward_normal(&self, mesh: &Mesh) -> Result<Vector2<f64>> {
        if self.kind != GeometryKind::Segment {
            return Err(FemError::UnsupportedTopology {
                kind: self.kind,
                context: "outward normal",
            });
        }
        let a = mesh.node(self.nodes[0]).coords();
        let b = mesh.node(self.nodes[1]).coords();
        let tangent = b - a;
        let normal = Vector2::new(tangent.y, -tangent.x);
        let norm = normal.norm();
        if norm <= 0.0 {
            return Err(FemError::DegenerateElement {
                element: self.index,
                measure: norm,
            });
        }
        Ok(normal / norm)
    }

    /// Builds the boundary sub-element living on one of this element's edges.
    ///
    /// The sub-element is a segment whose nodes are the edge's endpoints (in
    /// the parent's traversal order) followed by its mid-edge nodes. Each
    /// node-owned DOF of the parent that sits on those nodes is carried over
    /// with its *global* index and VVF component intact, while its shape
    /// function is restricted to the segment trace. DOFs owned by interior
    /// entities (element-owned pressure DOFs in particular) have no trace on
    /// the boundary and are dropped.
    pub fn boundary_element_for(&self, local_edge: usize) -> Result<Element> {
        let edge = self
            .local_edges
            .get(local_edge)
            .ok_or(FemError::UnsupportedTopology {
                kind: self.kind,
                context: "boundary sub-element of an element without built edges",
            })?;

        // Segment-local node numbering: endpoints 0 and 1, then mid nodes.
        let mut parent_locals = vec![edge.vertices[0], edge.vertices[1]];
        parent_locals.extend_from_slice(&edge.mid_nodes);
        let nodes: Vec<usize> = parent_locals.iter().map(|&l| self.nodes[l]).collect();

        let mut sub = Element::new(edge.local_index, GeometryKind::Segment, &[]);
        sub.nodes = nodes;
        sub.parent = Some(self.index);

        for (position, &parent_local) in parent_locals.iter().enumerate() {
            for dof in self.dofs.node_dofs(parent_local) {
                let shape = restrict_shape(&dof.shape, position)?;
                sub.dofs.push_node_dof(
                    position,
                    Dof {
                        local_index: 0,
                        global_index: dof.global_index,
                        owner: DofOwner::Node,
                        component: dof.component,
                        shape,
                    },
                );
            }
        }
        sub.dofs.renumber_local();
        Ok(sub)
    }
}

fn restrict_shape(shape: &ShapeFn, position: usize) -> Result<ShapeFn> {
    match shape {
        ShapeFn::Scalar(scalar) => Ok(ShapeFn::Scalar(scalar.restrict_to_edge(position)?)),
        ShapeFn::Vector(vector) => Ok(ShapeFn::Vector(VectorShapeFn {
            component: vector.component,
            scalar: vector.scalar.restrict_to_edge(position)?,
        })),
        ShapeFn::Flux(_) => Err(FemError::Unsupported {
            operation: "edge restriction of an edge-flux shape function",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::procedural::{unit_square_quads, unit_square_triangles};
    use nalgebra::Point3;

    #[test]
    fn triangle_jacobian_is_twice_the_area() {
        let mesh = unit_square_triangles(1).unwrap();
        let element = mesh.element(0);
        let jac = element
            .jacobian(&mesh, &Point3::new(0.25, 0.25, 0.0))
            .unwrap();
        // Each triangle covers half of the unit square.
        assert!((jac.det - 1.0).abs() < 1e-12);
    }

    #[test]
    fn quad_map_reaches_all_corners() {
        let mesh = unit_square_quads(2).unwrap();
        let element = mesh.element(0);
        let corners = [
            (Point3::new(-1.0, -1.0, 0.0), 0),
            (Point3::new(1.0, -1.0, 0.0), 1),
            (Point3::new(1.0, 1.0, 0.0), 2),
            (Point3::new(-1.0, 1.0, 0.0), 3),
        ];
        for (ref_point, vertex) in corners {
            let mapped = element.map_reference(&mesh, &ref_point).unwrap();
            let expected = mesh.node(element.node_indices()[vertex]).coords();
            assert!((mapped - expected).norm() < 1e-12);
        }
        let jac = element.jacobian(&mesh, &Point3::origin()).unwrap();
        // Axis-aligned h x h cell, h = 0.5.
        assert!((jac.det - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn degenerate_triangle_is_rejected() {
        let mut mesh = crate::mesh::Mesh::new(2);
        let a = mesh.add_node(Point3::new(0.0, 0.0, 0.0)).unwrap();
        let b = mesh.add_node(Point3::new(1.0, 0.0, 0.0)).unwrap();
        let c = mesh.add_node(Point3::new(2.0, 0.0, 0.0)).unwrap();
        mesh.add_element(GeometryKind::Triangle, &[a, b, c]).unwrap();
        let result = mesh.element(0).jacobian(&mesh, &Point3::new(0.3, 0.3, 0.0));
        assert!(matches!(
            result,
            Err(FemError::DegenerateElement { element: 0, .. })
        ));
    }

    #[test]
    fn boundary_normals_point_out_of_the_unit_square() {
        let mesh = unit_square_triangles(1).unwrap();
        for edge in mesh.edges().iter().filter(|e| e.is_boundary()) {
            let element_index = edge.elements()[0];
            let element = mesh.element(element_index);
            let local = element
                .local_edges()
                .iter()
                .position(|le| le.global_edge == Some(edge.index()))
                .unwrap();
            let sub = element.boundary_element_for(local).unwrap();
            let normal = sub.outward_normal(&mesh).unwrap();
            // Midpoint plus the normal must leave the unit square.
            let a = mesh.node(sub.node_indices()[0]).coords();
            let b = mesh.node(sub.node_indices()[1]).coords();
            let probe = (a.coords + b.coords) * 0.5 + normal.push(0.0) * 0.1;
            let inside =
                probe.x > 0.0 && probe.x < 1.0 && probe.y > 0.0 && probe.y < 1.0;
            assert!(!inside, "normal {normal:?} points inward");
        }
    }

    #[test]
    fn segment_jacobian_is_half_the_length() {
        let mesh = unit_square_triangles(1).unwrap();
        let edge = mesh.edges().iter().find(|e| e.is_boundary()).unwrap();
        let element = mesh.element(edge.elements()[0]);
        let local = element
            .local_edges()
            .iter()
            .position(|le| le.global_edge == Some(edge.index()))
            .unwrap();
        let sub = element.boundary_element_for(local).unwrap();
        let jac = sub.jacobian(&mesh, &Point3::origin()).unwrap();
        assert!((jac.det - 0.5).abs() < 1e-12);
        assert!(jac.inv_t.is_none());
    }
}
