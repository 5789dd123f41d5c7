//! Index-based mesh data structure: node and edge arenas, derived adjacency
//! and boundary marking.
//!
//! All connectivity is expressed through `usize` indices into the arenas
//! owned by [`Mesh`]; elements never hold direct references to shared
//! geometric entities. A *global* edge is stored once, in the orientation of
//! the element that first registered it; each element-local edge records an
//! explicit orientation sign against the global edge, computed once at
//! edge-sharing time.
//!
//! Lifecycle: a mesh is built from raw geometry, then enriched (adjacency,
//! shared edges, optional mid-edge nodes for higher-order elements, border
//! marking) before DOF generation freezes its node/element counts. Mutation
//! after freezing is a configuration error.

use crate::element::{Element, GeometryKind, LocalEdge};
use crate::error::{FemError, Result};
use log::debug;
use nalgebra::Point3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub mod procedural;

/// Coordinate tolerance used when matching nodes geometrically.
pub const MESH_EPS: f64 = 1e-8;

/// Boundary type of a node, per vector-valued-field component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Interior,
    Dirichlet,
    Neumann,
    Robin,
}

/// A physical point with a global index and per-component boundary tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    index: usize,
    coords: Point3<f64>,
    // One entry per VVF component; missing entries mean Interior.
    boundary_types: Vec<Option<NodeType>>,
}

impl Node {
    pub fn new(index: usize, coords: Point3<f64>) -> Self {
        Self {
            index,
            coords,
            boundary_types: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn coords(&self) -> &Point3<f64> {
        &self.coords
    }

    /// Boundary type for the given VVF component (0-based).
    pub fn boundary_type(&self, component: usize) -> NodeType {
        self.boundary_types
            .get(component)
            .copied()
            .flatten()
            .unwrap_or(NodeType::Interior)
    }

    pub fn set_boundary_type(&mut self, component: usize, node_type: NodeType) {
        if self.boundary_types.len() <= component {
            self.boundary_types.resize(component + 1, None);
        }
        self.boundary_types[component] = Some(node_type);
    }

    pub fn is_on_boundary(&self) -> bool {
        self.boundary_types
            .iter()
            .any(|t| matches!(t, Some(t) if *t != NodeType::Interior))
    }
}

/// A global edge shared by up to two elements.
///
/// The endpoint order defines the edge's global orientation; element-local
/// edges may traverse it in the opposite direction (see
/// [`LocalEdge::same_orientation`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    index: usize,
    nodes: [usize; 2],
    mid_nodes: Vec<usize>,
    elements: Vec<usize>,
}

impl Edge {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Endpoint node indices in global orientation.
    pub fn nodes(&self) -> [usize; 2] {
        self.nodes
    }

    pub fn mid_nodes(&self) -> &[usize] {
        &self.mid_nodes
    }

    /// Indices of the elements this edge belongs to (one or two).
    pub fn elements(&self) -> &[usize] {
        &self.elements
    }

    /// An edge adjacent to exactly one element lies on the mesh boundary.
    pub fn is_boundary(&self) -> bool {
        self.elements.len() == 1
    }
}

/// A mesh: node/edge/element arenas plus derived adjacency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh {
    spatial_dim: usize,
    nodes: Vec<Node>,
    elements: Vec<Element>,
    edges: Vec<Edge>,
    node_to_elements: Option<Vec<Vec<usize>>>,
    frozen: bool,
}

impl Mesh {
    pub fn new(spatial_dim: usize) -> Self {
        Self {
            spatial_dim,
            nodes: Vec::new(),
            elements: Vec::new(),
            edges: Vec::new(),
            node_to_elements: None,
            frozen: false,
        }
    }

    pub fn spatial_dim(&self) -> usize {
        self.spatial_dim
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut Node {
        &mut self.nodes[index]
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, index: usize) -> &Element {
        &self.elements[index]
    }

    pub(crate) fn element_mut(&mut self, index: usize) -> &mut Element {
        &mut self.elements[index]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, index: usize) -> &Edge {
        &self.edges[index]
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Freezes node/element counts. Called by DOF generation; afterwards any
    /// mutating operation fails with [`FemError::MeshFrozen`].
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn check_mutable(&self) -> Result<()> {
        if self.frozen {
            Err(FemError::MeshFrozen)
        } else {
            Ok(())
        }
    }

    pub fn add_node(&mut self, coords: Point3<f64>) -> Result<usize> {
        self.check_mutable()?;
        let index = self.nodes.len();
        self.nodes.push(Node::new(index, coords));
        // Derived adjacency is stale once the arena grows.
        self.node_to_elements = None;
        Ok(index)
    }

    /// Adds a domain element from its vertex node indices, given in
    /// counterclockwise order.
    pub fn add_element(&mut self, kind: GeometryKind, vertices: &[usize]) -> Result<usize> {
        self.check_mutable()?;
        if vertices.len() != kind.num_vertices() {
            return Err(FemError::DimensionMismatch {
                expected: kind.num_vertices(),
                actual: vertices.len(),
                context: "element vertex count",
            });
        }
        let index = self.elements.len();
        self.elements.push(Element::new(index, kind, vertices));
        self.node_to_elements = None;
        Ok(index)
    }

    /// Builds the inverse map node → elements touching it.
    ///
    /// Required before any operation that finds or deduplicates shared
    /// geometric entities (shared edges, mid-edge nodes).
    pub fn compute_node_adjacency(&mut self) {
        let mut map = vec![Vec::new(); self.nodes.len()];
        for element in &self.elements {
            for &node in element.node_indices() {
                map[node].push(element.index());
            }
        }
        self.node_to_elements = Some(map);
    }

    pub fn node_adjacency(&self) -> Result<&[Vec<usize>]> {
        self.node_to_elements
            .as_deref()
            .ok_or(FemError::AdjacencyMissing)
    }

    /// Finds a node geometrically, within [`MESH_EPS`].
    pub fn find_node(&self, coords: &Point3<f64>) -> Option<usize> {
        self.nodes
            .iter()
            .find(|n| (n.coords - coords).norm() < MESH_EPS)
            .map(|n| n.index)
    }

    /// Like [`find_node`](Self::find_node), but only scans nodes of the given
    /// candidate elements. Used with the node adjacency to deduplicate
    /// mid-edge nodes without a full arena scan.
    fn find_node_in_elements(&self, coords: &Point3<f64>, candidates: &[usize]) -> Option<usize> {
        for &e in candidates {
            for &n in self.elements[e].node_indices() {
                if (self.nodes[n].coords - coords).norm() < MESH_EPS {
                    return Some(n);
                }
            }
        }
        None
    }

    /// Derives the shared-edge arena and attaches oriented local edges to
    /// every element.
    ///
    /// The first element registering an edge fixes the global orientation;
    /// the neighboring element's local edge records the orientation sign.
    /// Requires node adjacency.
    pub fn build_edges(&mut self) -> Result<()> {
        self.node_adjacency()?;
        self.edges.clear();
        // Keyed by the sorted endpoint pair so that both traversal
        // directions resolve to the same global edge.
        let mut registry: FxHashMap<(usize, usize), usize> = FxHashMap::default();

        for element_index in 0..self.elements.len() {
            let kind = self.elements[element_index].kind();
            let vertex_pairs = kind.local_edge_vertices();
            let mut local_edges = Vec::with_capacity(vertex_pairs.len());

            for (local_index, pair) in vertex_pairs.iter().enumerate() {
                let begin = self.elements[element_index].node_indices()[pair[0]];
                let end = self.elements[element_index].node_indices()[pair[1]];
                let key = (begin.min(end), begin.max(end));

                let edge_index = *registry.entry(key).or_insert_with(|| {
                    let index = self.edges.len();
                    self.edges.push(Edge {
                        index,
                        nodes: [begin, end],
                        mid_nodes: Vec::new(),
                        elements: Vec::new(),
                    });
                    index
                });
                self.edges[edge_index].elements.push(element_index);
                let same_orientation = self.edges[edge_index].nodes[0] == begin;

                local_edges.push(LocalEdge {
                    local_index,
                    vertices: *pair,
                    mid_nodes: Vec::new(),
                    global_edge: Some(edge_index),
                    same_orientation,
                });
            }
            self.elements[element_index].set_local_edges(local_edges);
        }
        debug!(
            "built {} shared edges over {} elements",
            self.edges.len(),
            self.elements.len()
        );
        Ok(())
    }

    /// Adds a mid-edge node on every edge, for quadratic elements.
    ///
    /// Elements sharing an edge reuse the same new node: the midpoint is
    /// first looked up by coordinate match (within [`MESH_EPS`]) among the
    /// nodes of the elements adjacent to the edge's endpoints, then created
    /// if absent. Requires node adjacency and shared edges.
    pub fn add_quadratic_nodes(&mut self) -> Result<()> {
        self.check_mutable()?;
        if self.edges.is_empty() {
            return Err(FemError::EdgesNotBuilt);
        }
        // Candidate elements per edge, gathered up front so the adjacency
        // borrow does not overlap arena mutation.
        let candidates: Vec<Vec<usize>> = {
            let adjacency = self.node_adjacency()?;
            self.edges
                .iter()
                .map(|edge| {
                    let mut c = adjacency[edge.nodes[0]].clone();
                    c.extend_from_slice(&adjacency[edge.nodes[1]]);
                    c.sort_unstable();
                    c.dedup();
                    c
                })
                .collect()
        };

        let mut reused = 0;
        for edge_index in 0..self.edges.len() {
            let [a, b] = self.edges[edge_index].nodes;
            let midpoint = Point3::from((self.nodes[a].coords.coords + self.nodes[b].coords.coords) * 0.5);

            let node_index = match self.find_node_in_elements(&midpoint, &candidates[edge_index]) {
                Some(existing) => {
                    reused += 1;
                    existing
                }
                None => {
                    let index = self.nodes.len();
                    self.nodes.push(Node::new(index, midpoint));
                    index
                }
            };
            self.edges[edge_index].mid_nodes.push(node_index);
        }

        // Attach per element in local-edge order, so that the element node
        // at position num_vertices + k is the midpoint of local edge k.
        // Quadratic shape functions are bound by that position.
        for element_index in 0..self.elements.len() {
            let attachments: Vec<(usize, usize)> = self.elements[element_index]
                .local_edges()
                .iter()
                .filter_map(|le| le.global_edge)
                .map(|global_edge| (global_edge, self.edges[global_edge].mid_nodes[0]))
                .collect();
            for (global_edge, node_index) in attachments {
                self.elements[element_index].attach_edge_node(global_edge, node_index);
            }
        }
        // The adjacency no longer covers the new nodes.
        self.compute_node_adjacency();
        debug!(
            "added mid-edge nodes for {} edges ({} reused existing nodes)",
            self.edges.len(),
            reused
        );
        Ok(())
    }

    /// Returns the indices of all nodes lying on the outer boundary
    /// (endpoints and mid-edge nodes of boundary edges), sorted.
    pub fn boundary_nodes(&self) -> Result<Vec<usize>> {
        if self.edges.is_empty() {
            return Err(FemError::EdgesNotBuilt);
        }
        let mut nodes = Vec::new();
        for edge in self.edges.iter().filter(|e| e.is_boundary()) {
            nodes.extend_from_slice(&edge.nodes);
            nodes.extend_from_slice(&edge.mid_nodes);
        }
        nodes.sort_unstable();
        nodes.dedup();
        Ok(nodes)
    }

    /// Marks boundary nodes with node types, per VVF component.
    ///
    /// For every node on the outer boundary, and for each `(node_type,
    /// predicate)` entry in order, the node is tagged with `node_type` for
    /// all listed components if the predicate matches its position; a `None`
    /// predicate matches every border node. The first matching entry wins.
    pub fn mark_border_nodes(
        &mut self,
        components: &[usize],
        type_map: &[(NodeType, Option<&dyn Fn(&Point3<f64>) -> bool>)],
    ) -> Result<()> {
        self.node_adjacency()?;
        let boundary = self.boundary_nodes()?;
        let mut marked = 0;
        for &node_index in &boundary {
            let coords = *self.nodes[node_index].coords();
            let chosen = type_map.iter().find_map(|(node_type, predicate)| {
                match predicate {
                    Some(p) if !p(&coords) => None,
                    _ => Some(*node_type),
                }
            });
            if let Some(node_type) = chosen {
                for &component in components {
                    self.nodes[node_index].set_boundary_type(component, node_type);
                }
                marked += 1;
            }
        }
        debug!(
            "marked {marked}/{} border nodes for components {components:?}",
            boundary.len()
        );
        Ok(())
    }

    /// The border type of an edge for one component, derived from its
    /// endpoint nodes. A Dirichlet endpoint makes the whole edge Dirichlet,
    /// so edges touching a constrained corner are excluded from natural
    /// boundary integration. Any other disagreement (Neumann against Robin,
    /// or a marked node next to an unmarked one) is ambiguous and raises a
    /// diagnosable error instead of silently picking one side.
    pub fn edge_border_type(&self, edge_index: usize, component: usize) -> Result<NodeType> {
        let edge = &self.edges[edge_index];
        let first = self.nodes[edge.nodes[0]].boundary_type(component);
        let second = self.nodes[edge.nodes[1]].boundary_type(component);
        if first == second {
            Ok(first)
        } else if first == NodeType::Dirichlet || second == NodeType::Dirichlet {
            Ok(NodeType::Dirichlet)
        } else {
            Err(FemError::BoundaryTypeConflict {
                edge: edge_index,
                component,
                first,
                second,
            })
        }
    }
}
