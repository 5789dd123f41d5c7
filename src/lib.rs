//! Finite element assembly for two-dimensional scalar and mixed problems.
//!
//! The pipeline runs in stages:
//!
//! 1. Build a [`mesh::Mesh`] (or use a [`mesh::procedural`] constructor) and
//!    derive its adjacency and shared edges.
//! 2. Mark boundary nodes per field component with
//!    [`mesh::Mesh::mark_border_nodes`].
//! 3. Generate DOFs for a [`dof::FiniteElement`] with a
//!    [`dof::DofGenerator`], which freezes the mesh.
//! 4. Assemble a [`weakform::WeakForm`] into a global (or block) system with
//!    the assemblers in [`assembly`].
//! 5. Impose Dirichlet conditions ([`bc`]) and solve ([`solver`]).
//!
//! Scalar diffusion problems go through [`assembly::Assembler`] (optionally
//! chained with a boundary form via [`assembly::DomainBoundaryAssembler`]);
//! mixed problems (velocity/pressure Stokes, edge-flux/potential Darcy) go
//! through [`assembly::VectorAssembler`] into block systems solved by
//! [`solver::SchurComplementSolver`].

pub mod assembly;
pub mod bc;
pub mod block;
pub mod dof;
pub mod element;
pub mod error;
pub mod mesh;
pub mod quadrature;
pub mod shape;
pub mod solver;
pub mod weakform;

pub use crate::error::{FemError, Result};
