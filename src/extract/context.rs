//! Per-call extraction state: configuration snapshot, progress reporting,
//! and cooperative cancellation.
//!
//! The context is created at call entry and discarded at call exit; nothing
//! in it persists across calls, so repeated extractions share no mutable
//! state.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::comm::Communicator;

/// Configuration flags consumed by the converters. Each is independently
/// settable; see the field docs for defaults.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    /// Produce bounding wireframe boxes instead of true surfaces.
    pub use_outline: bool,
    /// Reduce final surfaces to feature edges.
    pub generate_feature_edges: bool,
    /// Compute per-polygon normals (collectively gated).
    pub generate_cell_normals: bool,
    /// Triangulate polygons post-extraction.
    pub triangulate: bool,
    /// Nonlinear subdivision level; 0 disables subdivision-aware handling.
    pub nonlinear_subdivision_level: u32,
    /// Attach original-cell-id provenance arrays.
    pub pass_through_cell_ids: bool,
    /// Attach original-point-id provenance arrays.
    pub pass_through_point_ids: bool,
    /// Match boundary faces by corner set only, ignoring mid-edge node
    /// order of higher-order cells.
    pub match_boundaries_ignoring_cell_order: bool,
    /// Hide AMR block faces shared with sibling blocks.
    pub hide_internal_amr_faces: bool,
    /// For non-overlapping AMR, allow outlines from metadata when heavy
    /// data is absent.
    pub use_non_overlapping_amr_metadata_for_outlines: bool,
    /// Block-color palette size.
    pub block_colors_distinct_values: u32,
    /// Attach process-id arrays; `None` means "iff more than one rank".
    pub generate_process_ids: Option<bool>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            use_outline: true,
            generate_feature_edges: false,
            // Generating cell normals by default would slow rendering paths
            // down considerably.
            generate_cell_normals: false,
            triangulate: false,
            nonlinear_subdivision_level: 1,
            pass_through_cell_ids: true,
            pass_through_point_ids: true,
            match_boundaries_ignoring_cell_order: false,
            hide_internal_amr_faces: true,
            use_non_overlapping_amr_metadata_for_outlines: true,
            block_colors_distinct_values: 7,
            generate_process_ids: None,
        }
    }
}

impl ExtractOptions {
    /// Resolve the process-id default against the communicator size.
    pub fn process_ids_enabled(&self, comm: &dyn Communicator) -> bool {
        self.generate_process_ids.unwrap_or(comm.size() > 1)
    }
}

/// Synchronous progress callback, fraction in `0..=1`.
pub type ProgressCallback = dyn Fn(f64) + Send + Sync;

/// Per-call working state handed through the converters.
pub struct ExtractionContext<'a> {
    /// Configuration snapshot for this call.
    pub options: &'a ExtractOptions,
    /// Collective communicator.
    pub comm: &'a dyn Communicator,
    /// Optional progress callback.
    pub progress: Option<&'a ProgressCallback>,
    /// Cooperative abort flag, polled between major steps.
    pub abort: &'a AtomicBool,
}

impl ExtractionContext<'_> {
    /// Report progress at a checkpoint. Fractions outside `(0, 1)` are
    /// forwarded as-is; callers clamp where it matters.
    pub fn update_progress(&self, fraction: f64) {
        if let Some(cb) = self.progress {
            cb(fraction);
        }
    }

    /// True when the caller requested cancellation. An aborted call
    /// returns whatever partial output exists; discarding it is the
    /// caller's job.
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }
}
