//! Local-to-global assembly of weak forms.
//!
//! [`local`] evaluates one element's contribution by quadrature;
//! [`global`] scatters local contributions into global (or block) systems,
//! sequentially or across a thread pool.

pub mod global;
pub mod local;

pub use global::{Assembler, DomainBoundaryAssembler, GlobalSystem, VectorAssembler};
pub use local::{assemble_local, LocalAssembly};
