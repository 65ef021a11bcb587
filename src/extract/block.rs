//! The per-block converter: one leaf dataset in, one polygonal piece out.
//!
//! Dispatch over the dataset kind mirrors the input enum; each arm either
//! draws an outline or delegates to the matching surface kernel. The
//! `do_communicate` flag distinguishes standalone inputs (collective
//! outline reduction applies) from composite leaves (every rank handles
//! its own leaves).

use crate::dataset::attributes::AttributeArray;
use crate::dataset::names;
use crate::dataset::polydata::PolyData;
use crate::dataset::DataSet;
use crate::error::SurfaceSieveError;
use crate::extract::context::ExtractionContext;
use crate::extract::outline::outline_box;
use crate::extract::surface::{
    explicit_structured_surface, htg_feature_edges, htg_surface, recover_wireframe,
    structured_outline, structured_surface, triangulate_polys, unstructured_surface,
};
use crate::geometry::{BoundingBox, Extent, valid_whole_extent};

/// Convert one leaf dataset to polygonal geometry.
///
/// `whole_extent` is the update extent of the whole (possibly distributed)
/// structured dataset; it decides which exterior faces of this piece are
/// global boundaries. `do_communicate` enables the collective outline
/// behaviors (rank-0 emission, bounds reduction); composite walkers pass
/// `false` and synchronize at the tree level instead.
///
/// # Errors
/// `UnsupportedDataSet` for generic datasets carrying neither a boundary
/// mesh nor bounds to outline.
pub fn execute_block(
    ds: &DataSet,
    ctx: &ExtractionContext<'_>,
    whole_extent: Option<Extent>,
    do_communicate: bool,
) -> Result<PolyData, SurfaceSieveError> {
    let opts = ctx.options;
    match ds {
        DataSet::Image(g) => {
            if opts.use_outline {
                let ext = valid_whole_extent(whole_extent, g.extent);
                // One copy of the box is enough; satellites stay silent.
                if !ext.is_valid() || (do_communicate && ctx.comm.rank() != 0) {
                    return Ok(PolyData::new());
                }
                Ok(outline_box(&g.extent_bounds(ext)))
            } else {
                let faces = boundary_faces_of(g.extent, whole_extent);
                Ok(structured_surface(g, &g.point_data, &g.cell_data, &faces, opts))
            }
        }
        DataSet::Rectilinear(g) => {
            if opts.use_outline {
                Ok(structured_outline(g))
            } else {
                let faces = boundary_faces_of(g.extent, whole_extent);
                Ok(structured_surface(g, &g.point_data, &g.cell_data, &faces, opts))
            }
        }
        DataSet::Structured(g) => {
            if opts.use_outline {
                Ok(structured_outline(g))
            } else {
                let faces = boundary_faces_of(g.extent, whole_extent);
                Ok(structured_surface(g, &g.point_data, &g.cell_data, &faces, opts))
            }
        }
        DataSet::ExplicitStructured(g) => {
            if opts.use_outline {
                Ok(bounds_outline(g.bounds(), ctx, do_communicate))
            } else {
                Ok(explicit_structured_surface(g, opts))
            }
        }
        DataSet::Unstructured(g) => {
            if opts.use_outline {
                Ok(bounds_outline(g.bounds(), ctx, do_communicate))
            } else {
                Ok(unstructured_surface(g, opts))
            }
        }
        DataSet::Poly(p) => {
            if opts.use_outline {
                Ok(bounds_outline(p.bounds(), ctx, do_communicate))
            } else {
                Ok(polydata_execute(p, ctx))
            }
        }
        DataSet::HyperTree(g) => {
            // Feature edges come straight from the tree topology; the
            // generated surface never materializes.
            if opts.generate_feature_edges {
                Ok(htg_feature_edges(g))
            } else {
                Ok(htg_surface(g, opts))
            }
        }
        // Cell grids only ever outline, whatever the outline flag says.
        DataSet::CellGrid(g) => Ok(outline_box(&g.bbox)),
        DataSet::Generic(g) => {
            if opts.use_outline {
                return Ok(bounds_outline(g.bbox, ctx, do_communicate));
            }
            match &g.boundary {
                Some(b) => Ok(b.clone()),
                None => Err(SurfaceSieveError::UnsupportedDataSet("generic")),
            }
        }
    }
}

/// Which faces of `local` lie on the boundary of the whole dataset.
/// Partition-interior faces are skipped so distributed pieces do not draw
/// internal walls.
fn boundary_faces_of(local: Extent, whole_extent: Option<Extent>) -> [bool; 6] {
    let whole = valid_whole_extent(whole_extent, local);
    let (l, w) = (local.0, whole.0);
    [
        l[0] <= w[0],
        l[1] >= w[1],
        l[2] <= w[2],
        l[3] >= w[3],
        l[4] <= w[4],
        l[5] >= w[5],
    ]
}

/// Outline for bounds-only kinds. When communicating, satellite ranks fold
/// their bounds into rank 0 and emit nothing; rank 0 outlines the global
/// box.
fn bounds_outline(
    local: BoundingBox,
    ctx: &ExtractionContext<'_>,
    do_communicate: bool,
) -> PolyData {
    if !do_communicate {
        return outline_box(&local);
    }
    match ctx.comm.reduce_bounds(&local, 0) {
        Some(global) => outline_box(&global),
        None => PolyData::new(),
    }
}

/// Polygonal input passes through, decorated with identity provenance.
/// Triangulation reuses the wireframe-recovery chain so fanned triangles
/// still render their source polygon's edges.
fn polydata_execute(input: &PolyData, ctx: &ExtractionContext<'_>) -> PolyData {
    let opts = ctx.options;
    let mut out = input.clone();
    if opts.pass_through_point_ids {
        out.point_data.add(
            names::ORIGINAL_POINT_IDS,
            AttributeArray::Int64((0..out.num_points() as i64).collect()),
        );
    }
    if opts.pass_through_cell_ids {
        out.cell_data.add(
            names::ORIGINAL_CELL_IDS,
            AttributeArray::Int64((0..out.num_cells() as i64).collect()),
        );
    }
    if opts.triangulate {
        out.cell_data.add(
            names::ORIGINAL_FACE_IDS,
            AttributeArray::Int64((0..out.num_cells() as i64).collect()),
        );
        out = triangulate_polys(&out);
        if !opts.generate_feature_edges {
            recover_wireframe(&mut out);
        }
        out.cell_data.remove(names::ORIGINAL_FACE_IDS);
    }
    out
}
