//! The calculation lattice — rolling per-bar storage plus dependency-graph
//! propagation.
//!
//! Picture a 3D lattice of cells with dimensions (bar, asset, field). Each
//! ingested bar appends a [`BarLayer`]; genesis values are injected and every
//! derived field fills in by walking the dependency graph depth-first, with
//! cross-sectional fields barriered until all assets complete their upstream.

pub mod graph;
pub mod layer;

pub use graph::{CalcLattice, LatticeError, Retention};
pub use layer::BarLayer;
