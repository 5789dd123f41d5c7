//! Shape functions over reference elements.
//!
//! Instead of an open-ended class hierarchy, the crate ships a small closed
//! set of tagged scalar shape functions dispatched by `match`. Each variant
//! exposes evaluation, reference-coordinate differentiation and restriction
//! to a boundary sub-entity; variants for which a capability is not
//! meaningful report an explicit unsupported outcome.
//!
//! Reference numbering:
//! - `TriP1 { vertex }` / `TriP2 { node }` live on the unit right triangle
//!   with vertices `0: (0,0)`, `1: (1,0)`, `2: (0,1)`; the P2 mid-edge nodes
//!   `3..6` sit on edges `(0,1)`, `(1,2)`, `(2,0)` in that order.
//! - `QuadQ1 { vertex }` lives on `[-1,1]^2` with counterclockwise vertices
//!   `0: (-1,-1)`, `1: (1,-1)`, `2: (1,1)`, `3: (-1,1)`.
//! - `SegP1 { vertex }` / `SegP2 { node }` live on `[-1,1]` with endpoints
//!   `0: -1`, `1: +1` and (for P2) the midpoint as node `2`.
//! - `Const` is the piecewise-constant function 1.

use crate::error::{FemError, Result};
use crate::quadrature::RefPoint;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// A scalar shape function on a reference element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarShapeFn {
    TriP1 { vertex: usize },
    TriP2 { node: usize },
    QuadQ1 { vertex: usize },
    SegP1 { vertex: usize },
    SegP2 { node: usize },
    Const,
}

impl ScalarShapeFn {
    /// Evaluates the shape function at a reference point.
    pub fn eval(&self, xi: &RefPoint) -> f64 {
        let (r, s) = (xi.x, xi.y);
        match *self {
            ScalarShapeFn::TriP1 { vertex } => match vertex {
                0 => 1.0 - r - s,
                1 => r,
                2 => s,
                _ => unreachable!("TriP1 vertex out of range"),
            },
            ScalarShapeFn::TriP2 { node } => {
                let l = [1.0 - r - s, r, s];
                match node {
                    0 | 1 | 2 => l[node] * (2.0 * l[node] - 1.0),
                    3 => 4.0 * l[0] * l[1],
                    4 => 4.0 * l[1] * l[2],
                    5 => 4.0 * l[2] * l[0],
                    _ => unreachable!("TriP2 node out of range"),
                }
            }
            ScalarShapeFn::QuadQ1 { vertex } => {
                let (a, b) = quad_vertex_signs(vertex);
                0.25 * (1.0 + a * r) * (1.0 + b * s)
            }
            ScalarShapeFn::SegP1 { vertex } => match vertex {
                0 => 0.5 * (1.0 - r),
                1 => 0.5 * (1.0 + r),
                _ => unreachable!("SegP1 vertex out of range"),
            },
            ScalarShapeFn::SegP2 { node } => match node {
                0 => 0.5 * r * (r - 1.0),
                1 => 0.5 * r * (r + 1.0),
                2 => 1.0 - r * r,
                _ => unreachable!("SegP2 node out of range"),
            },
            ScalarShapeFn::Const => 1.0,
        }
    }

    /// Gradient with respect to the reference coordinates.
    ///
    /// For segment functions only the first component is meaningful.
    pub fn grad_ref(&self, xi: &RefPoint) -> Vector2<f64> {
        let (r, s) = (xi.x, xi.y);
        match *self {
            ScalarShapeFn::TriP1 { vertex } => match vertex {
                0 => Vector2::new(-1.0, -1.0),
                1 => Vector2::new(1.0, 0.0),
                2 => Vector2::new(0.0, 1.0),
                _ => unreachable!("TriP1 vertex out of range"),
            },
            ScalarShapeFn::TriP2 { node } => {
                let l = [1.0 - r - s, r, s];
                let dl = [
                    Vector2::new(-1.0, -1.0),
                    Vector2::new(1.0, 0.0),
                    Vector2::new(0.0, 1.0),
                ];
                match node {
                    0 | 1 | 2 => dl[node] * (4.0 * l[node] - 1.0),
                    3 => (dl[0] * l[1] + dl[1] * l[0]) * 4.0,
                    4 => (dl[1] * l[2] + dl[2] * l[1]) * 4.0,
                    5 => (dl[2] * l[0] + dl[0] * l[2]) * 4.0,
                    _ => unreachable!("TriP2 node out of range"),
                }
            }
            ScalarShapeFn::QuadQ1 { vertex } => {
                let (a, b) = quad_vertex_signs(vertex);
                Vector2::new(0.25 * a * (1.0 + b * s), 0.25 * b * (1.0 + a * r))
            }
            ScalarShapeFn::SegP1 { vertex } => match vertex {
                0 => Vector2::new(-0.5, 0.0),
                1 => Vector2::new(0.5, 0.0),
                _ => unreachable!("SegP1 vertex out of range"),
            },
            ScalarShapeFn::SegP2 { node } => match node {
                0 => Vector2::new(r - 0.5, 0.0),
                1 => Vector2::new(r + 0.5, 0.0),
                2 => Vector2::new(-2.0 * r, 0.0),
                _ => unreachable!("SegP2 node out of range"),
            },
            ScalarShapeFn::Const => Vector2::zeros(),
        }
    }

    /// Polynomial degree of the function.
    pub fn degree(&self) -> usize {
        match self {
            ScalarShapeFn::Const => 0,
            ScalarShapeFn::TriP1 { .. } | ScalarShapeFn::SegP1 { .. } => 1,
            ScalarShapeFn::TriP2 { .. }
            | ScalarShapeFn::SegP2 { .. }
            | ScalarShapeFn::QuadQ1 { .. } => 2,
        }
    }

    /// Restricts the function to a boundary segment, re-parametrized over
    /// `[-1, 1]`, where `position` is the function's node position in the
    /// segment's local numbering (0/1 endpoints, 2 midpoint).
    ///
    /// Functions attached to the element interior have no meaningful
    /// restriction and report an unsupported outcome.
    pub fn restrict_to_edge(&self, position: usize) -> Result<ScalarShapeFn> {
        match (*self, position) {
            (ScalarShapeFn::TriP1 { .. }, p @ (0 | 1))
            | (ScalarShapeFn::QuadQ1 { .. }, p @ (0 | 1)) => Ok(ScalarShapeFn::SegP1 { vertex: p }),
            (ScalarShapeFn::TriP2 { .. }, p @ (0 | 1 | 2)) => Ok(ScalarShapeFn::SegP2 { node: p }),
            (ScalarShapeFn::SegP1 { .. } | ScalarShapeFn::SegP2 { .. }, _) => {
                Err(FemError::Unsupported {
                    operation: "restriction of a segment shape function",
                })
            }
            (ScalarShapeFn::Const, _) => Err(FemError::Unsupported {
                operation: "restriction of a piecewise-constant shape function to an edge",
            }),
            _ => Err(FemError::Unsupported {
                operation: "shape-function restriction for this node position",
            }),
        }
    }
}

fn quad_vertex_signs(vertex: usize) -> (f64, f64) {
    match vertex {
        0 => (-1.0, -1.0),
        1 => (1.0, -1.0),
        2 => (1.0, 1.0),
        3 => (-1.0, 1.0),
        _ => unreachable!("QuadQ1 vertex out of range"),
    }
}

/// A vector-valued shape function occupying a single field component:
/// `N = e_component * scalar`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorShapeFn {
    pub component: usize,
    pub scalar: ScalarShapeFn,
}

/// The lowest-order Raviart-Thomas basis function attached to one triangle
/// edge: `psi = sigma * |E| / (2 |T|) * (x - P)`, where `P` is the vertex
/// opposite the edge and `sigma` is `+1` when the element traverses the
/// global edge in its stored orientation, `-1` otherwise. The sign makes the
/// normal trace agree with the global edge orientation from both adjacent
/// elements, so a shared edge carries one well-defined flux unknown.
///
/// The function lives in physical coordinates and depends on the element
/// geometry; it is evaluated through the assembly context rather than on the
/// reference element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluxShapeFn {
    pub local_edge: usize,
    pub same_orientation: bool,
}

/// The shape function bound to a DOF.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeFn {
    Scalar(ScalarShapeFn),
    Vector(VectorShapeFn),
    Flux(FluxShapeFn),
}

impl ShapeFn {
    /// The scalar profile: for a vector shape function, the profile of its
    /// active component. Edge-flux functions have no scalar profile.
    pub fn scalar_profile(&self) -> Option<&ScalarShapeFn> {
        match self {
            ShapeFn::Scalar(s) => Some(s),
            ShapeFn::Vector(v) => Some(&v.scalar),
            ShapeFn::Flux(_) => None,
        }
    }

    pub fn component(&self) -> Option<usize> {
        match self {
            ShapeFn::Scalar(_) | ShapeFn::Flux(_) => None,
            ShapeFn::Vector(v) => Some(v.component),
        }
    }

    pub fn degree(&self) -> usize {
        match self {
            ShapeFn::Scalar(s) => s.degree(),
            ShapeFn::Vector(v) => v.scalar.degree(),
            ShapeFn::Flux(_) => 1,
        }
    }
}
