//! Output decoration and cleanup: provenance/coloring arrays attached to
//! finished pieces, collective cell-normal generation, and the fixed
//! post-processing order every piece goes through before leaving the
//! pipeline.

use crate::dataset::attributes::AttributeArray;
use crate::dataset::names;
use crate::dataset::polydata::PolyData;
use crate::extract::context::ExtractionContext;
use crate::extract::surface::feature_edges;
use crate::comm::ReduceOp;
use crate::geometry::normals::polygon_normal;

/// Dihedral threshold for the feature-edge reduction, degrees.
pub const FEATURE_ANGLE_DEG: f64 = 30.0;

/// Tag every point and cell of a piece with the flat composite index of
/// the leaf that produced it. Empty sides are left untouched.
pub fn add_composite_index(pd: &mut PolyData, index: u32) {
    if pd.num_points() > 0 {
        pd.point_data.add(
            names::COMPOSITE_INDEX,
            AttributeArray::UInt32(vec![index; pd.num_points()]),
        );
    }
    if pd.num_cells() > 0 {
        pd.cell_data.add(
            names::COMPOSITE_INDEX,
            AttributeArray::UInt32(vec![index; pd.num_cells()]),
        );
    }
}

/// Tag the cells of an AMR piece with the refinement level and the block
/// index within that level.
pub fn add_hierarchical_index(pd: &mut PolyData, level: u32, index: u32) {
    if pd.num_cells() == 0 {
        return;
    }
    pd.cell_data.add(
        names::AMR_LEVEL,
        AttributeArray::UInt32(vec![level; pd.num_cells()]),
    );
    pd.cell_data.add(
        names::AMR_INDEX,
        AttributeArray::UInt32(vec![index; pd.num_cells()]),
    );
}

/// Attach the palette ordinal for block coloring. A single-tuple
/// field-data array: the color applies to the whole piece.
pub fn add_block_colors(pd: &mut PolyData, color: u32) {
    pd.field_data
        .add(names::BLOCK_COLORS, AttributeArray::UInt32(vec![color]));
}

/// Tag every point with the producing rank.
pub fn add_process_ids(pd: &mut PolyData, rank: u32) {
    if pd.num_points() == 0 {
        return;
    }
    pd.point_data.add(
        names::PROCESS_ID,
        AttributeArray::UInt32(vec![rank; pd.num_points()]),
    );
}

/// Compute per-polygon normals and designate them active.
///
/// The pass only makes sense for pure polygonal output. With
/// `do_communicate` the decision is made unanimous across ranks: if any
/// rank's piece still carries vertices, lines, or strips, every rank
/// skips, so attribute layouts stay identical everywhere. Without it the
/// skip is decided locally; the composite and AMR walkers pass `false`
/// because they run this once per owned leaf or block, a count that
/// differs across ranks.
pub fn execute_cell_normals(pd: &mut PolyData, ctx: &ExtractionContext<'_>, do_communicate: bool) {
    let counts = pd.stream_counts();
    let mut skip = (counts[0] + counts[1] + counts[3] > 0) as u32;
    if do_communicate {
        skip = ctx.comm.all_reduce_u32(&[skip], ReduceOp::Max)[0];
    }
    if skip > 0 {
        log::warn!("cell normals skipped: output is not purely polygonal");
        return;
    }
    if pd.polys.len() != pd.num_cells() {
        return;
    }
    let mut values = Vec::with_capacity(3 * pd.polys.len());
    for cell in pd.polys.iter() {
        let n = polygon_normal(&pd.points, cell);
        values.extend([n[0] as f32, n[1] as f32, n[2] as f32]);
    }
    pd.cell_data.add(
        names::CELL_NORMALS,
        AttributeArray::Float32 { components: 3, values },
    );
    pd.cell_data.set_active_normals(names::CELL_NORMALS);
}

/// Fixed post-processing applied to every finished piece, in order:
/// feature-edge reduction, cell normals, ghost-cell removal, process ids.
/// Normals come before ghost removal so the skip decision is taken on the
/// pre-removal stream layout. `do_communicate` is true only on the
/// sole-input path, where every rank runs the cleanup exactly once; the
/// per-leaf and per-block walkers pass `false` so ranks owning different
/// pieces never issue mismatched collectives.
pub fn cleanup_output_data(pd: &mut PolyData, ctx: &ExtractionContext<'_>, do_communicate: bool) {
    let opts = ctx.options;
    // Outline and edge pieces carry no polygons; reducing them would only
    // erase their lines.
    if opts.generate_feature_edges && !pd.polys.is_empty() {
        *pd = feature_edges(pd, FEATURE_ANGLE_DEG);
    }
    if opts.generate_cell_normals {
        execute_cell_normals(pd, ctx, do_communicate);
    }
    pd.remove_ghost_cells();
    if opts.process_ids_enabled(ctx.comm) {
        add_process_ids(pd, ctx.comm.rank() as u32);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::comm::NoComm;
    use crate::extract::context::ExtractOptions;

    fn two_triangles() -> PolyData {
        let mut pd = PolyData::new();
        pd.points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        pd.polys.push(&[0, 1, 2]);
        pd.polys.push(&[0, 2, 3]);
        pd
    }

    fn ctx<'a>(opts: &'a ExtractOptions, abort: &'a AtomicBool) -> ExtractionContext<'a> {
        ExtractionContext {
            options: opts,
            comm: &NoComm,
            progress: None,
            abort,
        }
    }

    #[test]
    fn composite_index_skips_empty_sides() {
        let mut pd = PolyData::new();
        pd.points = vec![[0.0; 3]];
        add_composite_index(&mut pd, 5);
        assert!(pd.point_data.get(names::COMPOSITE_INDEX).is_some());
        assert!(pd.cell_data.get(names::COMPOSITE_INDEX).is_none());
    }

    #[test]
    fn normals_become_active() {
        let opts = ExtractOptions::default();
        let abort = AtomicBool::new(false);
        let mut pd = two_triangles();
        execute_cell_normals(&mut pd, &ctx(&opts, &abort), true);
        assert_eq!(pd.cell_data.active_normals(), Some(names::CELL_NORMALS));
        let arr = pd.cell_data.get(names::CELL_NORMALS).unwrap();
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn normals_skip_on_lines() {
        let opts = ExtractOptions::default();
        let abort = AtomicBool::new(false);
        let mut pd = two_triangles();
        pd.lines.push(&[0, 1]);
        execute_cell_normals(&mut pd, &ctx(&opts, &abort), true);
        assert!(pd.cell_data.get(names::CELL_NORMALS).is_none());
    }

    #[test]
    fn cleanup_order_feature_edges_then_ghosts() {
        let mut opts = ExtractOptions::default();
        opts.generate_feature_edges = true;
        let abort = AtomicBool::new(false);
        let mut pd = two_triangles();
        cleanup_output_data(&mut pd, &ctx(&opts, &abort), true);
        // Coplanar pair: 4 boundary edges survive, the diagonal does not.
        assert_eq!(pd.lines.len(), 4);
        assert_eq!(pd.polys.len(), 0);
    }

    #[test]
    fn process_ids_forced_on() {
        let mut opts = ExtractOptions::default();
        opts.generate_process_ids = Some(true);
        let abort = AtomicBool::new(false);
        let mut pd = two_triangles();
        cleanup_output_data(&mut pd, &ctx(&opts, &abort), true);
        let ids = pd
            .point_data
            .get(names::PROCESS_ID)
            .and_then(|a| a.as_u32())
            .unwrap();
        assert!(ids.iter().all(|&r| r == 0));
    }
}
