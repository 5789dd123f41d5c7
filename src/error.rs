//! Error types for the assembly pipeline.
//!
//! The taxonomy distinguishes *configuration* errors (wrong call order,
//! inconsistent boundary marking, unsupported topology/component choices),
//! *numerical* errors (degenerate geometry, singular blocks) and explicit
//! *unsupported operation* outcomes. All of them are fatal for the current
//! assembly pass: a failed pass leaves the target system in an indeterminate,
//! partially summed state that must be discarded and rebuilt.

use crate::element::GeometryKind;
use crate::mesh::NodeType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FemError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FemError {
    /// Node-to-element adjacency has not been computed yet.
    ///
    /// [`Mesh::compute_node_adjacency`](crate::mesh::Mesh::compute_node_adjacency)
    /// must run before any operation that deduplicates shared geometric entities.
    #[error("node-to-element adjacency has not been computed for this mesh")]
    AdjacencyMissing,

    /// Shared edges have not been derived yet
    /// (see [`Mesh::build_edges`](crate::mesh::Mesh::build_edges)).
    #[error("shared edges have not been built for this mesh")]
    EdgesNotBuilt,

    /// The mesh was mutated after DOF generation froze its node/element counts.
    #[error("mesh is frozen: node/element counts are fixed once DOF generation begins")]
    MeshFrozen,

    /// A DOF generator was applied to a mesh other than the one it was initialized for.
    #[error("DOF generator was initialized for a different mesh \
             (expected {expected_nodes} nodes/{expected_elements} elements, \
             got {actual_nodes}/{actual_elements})")]
    DofGeneratorMismatch {
        expected_nodes: usize,
        expected_elements: usize,
        actual_nodes: usize,
        actual_elements: usize,
    },

    /// The two endpoint nodes of a boundary edge carry different boundary types
    /// for the same field component. The edge's border type is ambiguous and
    /// boundary assembly cannot proceed.
    #[error("boundary type conflict on edge {edge}: endpoints are {first:?} and {second:?} \
             for component {component}")]
    BoundaryTypeConflict {
        edge: usize,
        component: usize,
        first: NodeType,
        second: NodeType,
    },

    /// An element topology that the requested operation does not handle.
    #[error("unsupported topology {kind:?} for {context}")]
    UnsupportedTopology {
        kind: GeometryKind,
        context: &'static str,
    },

    /// No quadrature rule of the requested polynomial degree exists for this topology.
    #[error("no quadrature rule of degree {degree} for {kind:?}")]
    UnsupportedQuadratureOrder { kind: GeometryKind, degree: usize },

    /// A vector-valued-field component index outside the element's valid range.
    #[error("invalid VVF component {component}; element has {num_components} components")]
    InvalidComponent {
        component: usize,
        num_components: usize,
    },

    /// An element whose coordinate transform has non-positive measure.
    #[error("degenerate element {element}: Jacobian determinant {measure:.3e} is not positive")]
    DegenerateElement { element: usize, measure: f64 },

    /// The B-block of a saddle-point system is singular or near-singular.
    /// This is a fatal configuration of the Schur-complement solver.
    #[error("singular block ({}, {}) in Schur-complement elimination", block.0, block.1)]
    SingularBlock { block: (usize, usize) },

    /// A (reduced) global system that the linear-solve collaborator cannot factorize.
    #[error("global system matrix is singular")]
    SingularMatrix,

    /// An operation that is not meaningful for the given weak form, shape
    /// function or element variant. Checked at the call site; never a silent no-op.
    #[error("operation not supported: {operation}")]
    Unsupported { operation: &'static str },

    /// A container passed for chained assembly has the wrong dimensions.
    #[error("dimension mismatch: expected {expected}, got {actual} ({context})")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: &'static str,
    },
}
