//! # surface-sieve
//!
//! surface-sieve converts heterogeneous scientific-visualization datasets —
//! structured and unstructured grids, polygonal meshes, hyper-tree grids,
//! composite trees, AMR hierarchies — into renderable polygonal surfaces,
//! preserving provenance (original point/cell ids, composite indices,
//! block colors) and supporting distributed-memory execution through a
//! pluggable communicator.
//!
//! ## Features
//! - Outline and exterior-surface extraction for every supported dataset
//!   kind, including nonlinear (quadratic) unstructured cells
//! - Composite tree traversal with deterministic flat indexing, multi-piece
//!   merging, and cross-rank leaf-presence synchronization
//! - AMR walkers with internal-face hiding against the global bounds
//! - Feature edges, cell normals, ghost-cell removal, process-id tagging
//! - Pluggable communication backends (serial, in-process threads, MPI)
//!
//! ## Determinism
//!
//! Traversal orders, flat composite indices, and merge layouts are fixed
//! by the input structure, so repeated extractions of the same input are
//! bit-identical and all ranks agree on structural numbering.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! surface-sieve = "0.3"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```

pub mod comm;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod geometry;

/// A convenient prelude to import the most-used types:
pub mod prelude {
    pub use crate::comm::{Communicator, NoComm, ReduceOp, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::dataset::amr::{AmrBlock, AmrHierarchy, AmrLevel};
    pub use crate::dataset::attributes::{AttributeArray, AttributeSet};
    pub use crate::dataset::composite::{
        CompositeKind, CompositeTree, OutputNode, OutputTree, TreeNode,
    };
    pub use crate::dataset::htg::{CellGrid, GenericDataset, HyperTree, HyperTreeGrid};
    pub use crate::dataset::polydata::{CellArray, MergeOffsets, PolyData};
    pub use crate::dataset::structured::{
        ExplicitStructuredGrid, ImageGrid, RectilinearGrid, StructuredGrid,
    };
    pub use crate::dataset::unstructured::{CellShape, UnstructuredGrid};
    pub use crate::dataset::{DataObject, DataSet, names};
    pub use crate::error::SurfaceSieveError;
    pub use crate::extract::{ExtractOptions, ExtractOutput, GeometryExtractor};
    pub use crate::geometry::{BoundingBox, Extent};
}
