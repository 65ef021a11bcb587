//! AMR hierarchy walker: one partial outline or exterior surface per
//! block, internal faces between sibling blocks hidden, everything merged
//! into a single piece.
//!
//! Face visibility is a tolerance test against the global hierarchy
//! bounds: a block face within one spacing-norm of the matching global
//! face is on the exterior. The global bounds are agreed collectively so
//! every rank hides the same faces.

use crate::dataset::amr::AmrHierarchy;
use crate::dataset::polydata::{PolyData, append_pieces};
use crate::error::SurfaceSieveError;
use crate::extract::context::ExtractionContext;
use crate::extract::decorate::{add_composite_index, add_hierarchical_index, cleanup_output_data};
use crate::extract::outline::amr_block_outline;
use crate::extract::surface::structured_surface;
use crate::geometry::BoundingBox;

/// Extract the AMR hierarchy into one merged polygonal piece.
///
/// # Errors
/// Currently infallible in itself; the `Result` carries future collective
/// failures through the common pipeline signature.
pub fn execute_amr(
    amr: &AmrHierarchy,
    ctx: &ExtractionContext<'_>,
) -> Result<PolyData, SurfaceSieveError> {
    let opts = ctx.options;
    let global = ctx.comm.all_reduce_bounds(&amr.bounds());

    let mut pieces: Vec<PolyData> = Vec::new();
    let total = amr.total_blocks().max(1);
    let mut seen = 0usize;
    'levels: for (level, lv) in amr.levels.iter().enumerate() {
        let margin = (lv.spacing[0] * lv.spacing[0]
            + lv.spacing[1] * lv.spacing[1]
            + lv.spacing[2] * lv.spacing[2])
            .sqrt();
        for (index, block) in lv.blocks.iter().enumerate() {
            seen += 1;
            if ctx.is_aborted() {
                break 'levels;
            }
            // Blocks whose heavy data lives on another rank: surfaces need
            // the data; outlines can fall back to metadata bounds, except
            // for non-overlapping hierarchies when that fallback is
            // disabled.
            if block.data.is_none() {
                if !opts.use_outline {
                    continue;
                }
                if !amr.overlapping && !opts.use_non_overlapping_amr_metadata_for_outlines {
                    continue;
                }
            }

            let bounds = match &block.data {
                Some(grid) => grid.bounds(),
                None => block.bounds,
            };
            let faces = visible_faces(&bounds, &global, margin, opts.hide_internal_amr_faces);
            // Fully interior blocks contribute nothing, not even corner
            // points.
            if !faces.iter().any(|&f| f) {
                ctx.update_progress(seen as f64 / total as f64);
                continue;
            }

            let mut piece = if opts.use_outline {
                amr_block_outline(&bounds, &faces)
            } else {
                let Some(grid) = &block.data else {
                    continue;
                };
                let mut piece =
                    structured_surface(grid, &grid.point_data, &grid.cell_data, &faces, opts);
                piece.field_data.pass_from(&grid.field_data);
                piece
            };
            // Per-block cleanup must not communicate: ranks own different
            // blocks, so per-block collectives would mispair.
            cleanup_output_data(&mut piece, ctx, false);
            if piece.num_points() == 0 {
                ctx.update_progress(seen as f64 / total as f64);
                continue;
            }
            if !opts.use_outline {
                add_composite_index(&mut piece, amr.composite_index(level, index));
                add_hierarchical_index(&mut piece, level as u32, index as u32);
            }
            pieces.push(piece);
            ctx.update_progress(seen as f64 / total as f64);
        }
    }

    let refs: Vec<&PolyData> = pieces.iter().collect();
    let slot_map: Vec<Option<usize>> = (0..refs.len()).map(Some).collect();
    let (mut merged, _) = append_pieces(&refs, &slot_map);
    merged.field_data.pass_from(&amr.field_data);
    Ok(merged)
}

/// Which faces of a block lie on the global exterior. When internal-face
/// hiding is off, every face is visible.
fn visible_faces(
    block: &BoundingBox,
    global: &BoundingBox,
    margin: f64,
    hide_internal: bool,
) -> [bool; 6] {
    if !hide_internal {
        return [true; 6];
    }
    let b = block.as_bounds();
    let g = global.as_bounds();
    let mut faces = [false; 6];
    for i in 0..6 {
        faces[i] = (b[i] - g[i]).abs() < margin;
    }
    faces
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::comm::NoComm;
    use crate::dataset::amr::{AmrBlock, AmrLevel};
    use crate::dataset::attributes::AttributeSet;
    use crate::dataset::names;
    use crate::dataset::structured::ImageGrid;
    use crate::extract::context::ExtractOptions;
    use crate::geometry::Extent;

    fn ctx<'a>(opts: &'a ExtractOptions, abort: &'a AtomicBool) -> ExtractionContext<'a> {
        ExtractionContext {
            options: opts,
            comm: &NoComm,
            progress: None,
            abort,
        }
    }

    /// Two unit blocks side by side along x, one refinement level.
    fn two_block_hierarchy(with_data: bool) -> AmrHierarchy {
        let grid = |x0: f64| {
            let mut g = ImageGrid::new(Extent([0, 2, 0, 2, 0, 2]), [x0, 0.0, 0.0], [0.5; 3]);
            g.point_data = AttributeSet::new();
            g
        };
        let block = |x0: f64| AmrBlock {
            bounds: BoundingBox::from_bounds([x0, x0 + 1.0, 0.0, 1.0, 0.0, 1.0]),
            data: with_data.then(|| grid(x0)),
        };
        AmrHierarchy {
            levels: vec![AmrLevel {
                spacing: [0.5; 3],
                blocks: vec![block(0.0), block(1.0)],
            }],
            overlapping: true,
            field_data: AttributeSet::new(),
        }
    }

    #[test]
    fn internal_faces_are_hidden() {
        let amr = two_block_hierarchy(false);
        let opts = ExtractOptions::default();
        let abort = AtomicBool::new(false);
        let out = execute_amr(&amr, &ctx(&opts, &abort)).unwrap();
        // 5 visible faces per block: the touching xmax/xmin pair is
        // interior.
        assert_eq!(out.polys.len(), 10);
    }

    #[test]
    fn hide_toggle_restores_all_faces() {
        let amr = two_block_hierarchy(false);
        let opts = ExtractOptions {
            hide_internal_amr_faces: false,
            ..ExtractOptions::default()
        };
        let abort = AtomicBool::new(false);
        let out = execute_amr(&amr, &ctx(&opts, &abort)).unwrap();
        assert_eq!(out.polys.len(), 12);
    }

    #[test]
    fn surface_mode_skips_blocks_without_heavy_data() {
        let amr = two_block_hierarchy(false);
        let opts = ExtractOptions {
            use_outline: false,
            ..ExtractOptions::default()
        };
        let abort = AtomicBool::new(false);
        let out = execute_amr(&amr, &ctx(&opts, &abort)).unwrap();
        assert_eq!(out.num_cells(), 0);
    }

    #[test]
    fn surface_mode_decorates_with_hierarchy_indices() {
        let amr = two_block_hierarchy(true);
        let opts = ExtractOptions {
            use_outline: false,
            ..ExtractOptions::default()
        };
        let abort = AtomicBool::new(false);
        let out = execute_amr(&amr, &ctx(&opts, &abort)).unwrap();
        assert!(out.num_cells() > 0);
        let levels = out
            .cell_data
            .get(names::AMR_LEVEL)
            .and_then(|a| a.as_u32())
            .unwrap();
        assert!(levels.iter().all(|&l| l == 0));
        let idx = out
            .cell_data
            .get(names::AMR_INDEX)
            .and_then(|a| a.as_u32())
            .unwrap();
        assert!(idx.contains(&0) && idx.contains(&1));
        // Composite indices: 1 + blocks-before + index.
        let cidx = out
            .cell_data
            .get(names::COMPOSITE_INDEX)
            .and_then(|a| a.as_u32())
            .unwrap();
        assert!(cidx.contains(&1) && cidx.contains(&2));
        // Block colors never apply to AMR output.
        assert!(out.field_data.get(names::BLOCK_COLORS).is_none());
    }

    #[test]
    fn fully_interior_blocks_emit_nothing() {
        // 3x3x3 lattice of unit blocks; the center block touches no global
        // face and must not leave orphan corner points behind.
        let mut blocks = Vec::new();
        for k in 0..3 {
            for j in 0..3 {
                for i in 0..3 {
                    blocks.push(AmrBlock {
                        bounds: BoundingBox::from_bounds([
                            i as f64,
                            i as f64 + 1.0,
                            j as f64,
                            j as f64 + 1.0,
                            k as f64,
                            k as f64 + 1.0,
                        ]),
                        data: None,
                    });
                }
            }
        }
        let amr = AmrHierarchy {
            levels: vec![AmrLevel { spacing: [0.1; 3], blocks }],
            overlapping: true,
            field_data: AttributeSet::new(),
        };
        let opts = ExtractOptions::default();
        let abort = AtomicBool::new(false);
        let out = execute_amr(&amr, &ctx(&opts, &abort)).unwrap();
        assert_eq!(out.num_points(), 26 * 8);
    }

    #[test]
    fn abort_skips_every_level() {
        let mut amr = two_block_hierarchy(false);
        let finer = amr.levels[0].clone();
        amr.levels.push(finer);
        let opts = ExtractOptions::default();
        let abort = AtomicBool::new(true);
        let out = execute_amr(&amr, &ctx(&opts, &abort)).unwrap();
        assert_eq!(out.num_cells(), 0);
    }

    #[test]
    fn non_overlapping_metadata_fallback_toggle() {
        let mut amr = two_block_hierarchy(false);
        amr.overlapping = false;
        let abort = AtomicBool::new(false);

        let opts = ExtractOptions::default();
        let out = execute_amr(&amr, &ctx(&opts, &abort)).unwrap();
        assert!(out.num_cells() > 0);

        let opts = ExtractOptions {
            use_non_overlapping_amr_metadata_for_outlines: false,
            ..ExtractOptions::default()
        };
        let out = execute_amr(&amr, &ctx(&opts, &abort)).unwrap();
        assert_eq!(out.num_cells(), 0);
    }
}
