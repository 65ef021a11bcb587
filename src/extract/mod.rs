//! The extraction pipeline: configuration, dispatch, and the walkers that
//! turn any supported input into renderable polygonal geometry.
//!
//! [`GeometryExtractor`] is the public entry point. It owns the option
//! set, the communicator handle, and the progress/abort plumbing; each
//! [`GeometryExtractor::extract`] call builds a fresh
//! [`context::ExtractionContext`] so no mutable state survives between
//! calls.

pub mod amr;
pub mod block;
pub mod context;
pub mod decorate;
pub mod outline;
pub mod surface;
pub mod tree;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::comm::{Communicator, NoComm};
use crate::dataset::DataObject;
use crate::dataset::composite::OutputTree;
use crate::dataset::polydata::PolyData;
use crate::error::SurfaceSieveError;
use crate::geometry::Extent;

pub use context::{ExtractOptions, ExtractionContext, ProgressCallback};

/// What an extraction produced: a single surface for leaf and AMR inputs,
/// a mirrored composite tree for composite inputs.
#[derive(Clone, Debug, PartialEq)]
pub enum ExtractOutput {
    /// Single polygonal surface.
    Surface(PolyData),
    /// Composite tree of surfaces.
    Tree(OutputTree),
}

/// Geometry extraction entry point.
///
/// Collectives: on multi-rank communicators, `extract` must be called on
/// every rank of the communicator with a structurally identical input
/// tree; the walkers issue matching reductions on all ranks.
pub struct GeometryExtractor {
    /// Extraction options, freely adjustable between calls.
    pub options: ExtractOptions,
    comm: Arc<dyn Communicator>,
    progress: Option<Box<ProgressCallback>>,
    abort: Arc<AtomicBool>,
}

impl Default for GeometryExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryExtractor {
    /// Serial extractor with default options.
    pub fn new() -> Self {
        Self::with_comm(Arc::new(NoComm))
    }

    /// Extractor bound to a communicator.
    pub fn with_comm(comm: Arc<dyn Communicator>) -> Self {
        Self {
            options: ExtractOptions::default(),
            comm,
            progress: None,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Install a progress callback, invoked with a fraction in `0..=1` as
    /// walkers advance.
    pub fn set_progress(&mut self, cb: Box<ProgressCallback>) {
        self.progress = Some(cb);
    }

    /// Shared abort flag. Setting it from another thread makes the running
    /// extraction stop at its next checkpoint; the partial result should
    /// be discarded.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// The communicator this extractor reduces over.
    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// Extract renderable geometry from `input`.
    ///
    /// `whole_extent` is the global structured extent when the input is a
    /// piece of a distributed structured dataset; `None` treats the local
    /// extent as the whole.
    ///
    /// # Errors
    /// - `MalformedAttributes` when the attribute pre-check fails.
    /// - `UnsupportedDataSet` when a sole input cannot produce geometry.
    pub fn extract(
        &self,
        input: &DataObject,
        whole_extent: Option<Extent>,
    ) -> Result<ExtractOutput, SurfaceSieveError> {
        let ctx = ExtractionContext {
            options: &self.options,
            comm: self.comm.as_ref(),
            progress: self.progress.as_deref(),
            abort: self.abort.as_ref(),
        };
        match input {
            DataObject::Composite(tree) => Ok(ExtractOutput::Tree(tree::execute_tree(tree, &ctx)?)),
            DataObject::Amr(hierarchy) => {
                Ok(ExtractOutput::Surface(amr::execute_amr(hierarchy, &ctx)?))
            }
            DataObject::DataSet(ds) => {
                ds.check_attributes()?;
                let mut piece = block::execute_block(ds, &ctx, whole_extent, true)?;
                piece.field_data.pass_from(ds.field_data());
                decorate::cleanup_output_data(&mut piece, &ctx, true);
                ctx.update_progress(1.0);
                Ok(ExtractOutput::Surface(piece))
            }
        }
    }
}
