//! Surface extraction kernels: structured exterior faces, unstructured
//! boundary-face and outer-surface extraction, triangulation, wireframe
//! recovery, feature edges, and hyper-tree-grid geometry.
//!
//! These are the per-dataset algorithms the block converter dispatches to.
//! All of them compact points, so provenance arrays are produced here
//! alongside the geometry they describe.

use hashbrown::HashMap;
use itertools::Itertools;

use crate::dataset::attributes::{AttributeArray, AttributeSet};
use crate::dataset::names;
use crate::dataset::polydata::PolyData;
use crate::dataset::structured::{ExplicitStructuredGrid, StructuredPoints};
use crate::dataset::unstructured::{CellFace, CellShape, UnstructuredGrid, cell_faces};
use crate::dataset::htg::HyperTreeGrid;
use crate::extract::context::ExtractOptions;
use crate::geometry::normals::{angle_deg, polygon_normal};

/// Maps source point ids to compacted output ids, remembering which source
/// points were used and in what order.
struct PointMap {
    map: HashMap<usize, usize>,
    used: Vec<usize>,
}

impl PointMap {
    fn new() -> Self {
        Self { map: HashMap::new(), used: Vec::new() }
    }

    fn get(&mut self, src: usize) -> usize {
        *self.map.entry(src).or_insert_with(|| {
            self.used.push(src);
            self.used.len() - 1
        })
    }
}

fn add_point_provenance(out: &mut PolyData, used: &[usize], pass_point_ids: bool) {
    if pass_point_ids {
        out.point_data.add(
            names::ORIGINAL_POINT_IDS,
            AttributeArray::Int64(used.iter().map(|&i| i as i64).collect()),
        );
    }
}

// ---------------------------------------------------------------------------
// Structured grids
// ---------------------------------------------------------------------------

/// Extract the exterior surface of a structured grid, restricted to the
/// faces enabled in `extract_face` (logical order `[xmin..zmax]`). Cells
/// are implicit, so faces are generated straight from the extent.
pub fn structured_surface<G: StructuredPoints>(
    grid: &G,
    point_data: &AttributeSet,
    cell_data: &AttributeSet,
    extract_face: &[bool; 6],
    opts: &ExtractOptions,
) -> PolyData {
    let extent = grid.extent();
    let pd = extent.point_dims();
    let mut out = PolyData::new();
    if extent.num_points() == 0 {
        return out;
    }
    let cd = extent.cell_dims();
    let flat: Vec<usize> = (0..3).filter(|&a| pd[a] == 1).collect();

    let pt_id = |i: usize, j: usize, k: usize| i + j * pd[0] + k * pd[0] * pd[1];
    let cell_id = |c: [usize; 3]| c[0] + c[1] * cd[0] + c[2] * cd[0] * cd[1];

    let mut points = PointMap::new();
    let mut cell_src: Vec<usize> = Vec::new();

    // Emit one quad for the face of cell `c` on `axis`/`side`.
    let emit_quad = |out: &mut PolyData,
                         points: &mut PointMap,
                         cell_src: &mut Vec<usize>,
                         c: [usize; 3],
                         axis: usize,
                         side: usize| {
        let ua = (axis + 1) % 3;
        let va = (axis + 2) % 3;
        let mut corner = c;
        corner[axis] = c[axis] + side;
        let at = |du: usize, dv: usize| {
            let mut p = corner;
            p[ua] += du;
            p[va] += dv;
            pt_id(p[0], p[1], p[2])
        };
        // Outward winding flips between the two sides.
        let ids = if side == 1 {
            [at(0, 0), at(1, 0), at(1, 1), at(0, 1)]
        } else {
            [at(0, 0), at(0, 1), at(1, 1), at(1, 0)]
        };
        let quad: Vec<usize> = ids.iter().map(|&s| points.get(s)).collect();
        out.polys.push(&quad);
        cell_src.push(cell_id(c));
    };

    match flat.len() {
        0 => {
            for axis in 0..3 {
                for side in 0..2 {
                    if !extract_face[2 * axis + side] {
                        continue;
                    }
                    let ua = (axis + 1) % 3;
                    let va = (axis + 2) % 3;
                    let plane = if side == 0 { 0 } else { cd[axis] - 1 };
                    for v in 0..cd[va] {
                        for u in 0..cd[ua] {
                            let mut c = [0usize; 3];
                            c[axis] = plane;
                            c[ua] = u;
                            c[va] = v;
                            emit_quad(&mut out, &mut points, &mut cell_src, c, axis, side);
                        }
                    }
                }
            }
        }
        1 => {
            // A flat grid is its own surface; emit every cell once, in the
            // single point layer the flat axis has.
            let axis = flat[0];
            let ua = (axis + 1) % 3;
            let va = (axis + 2) % 3;
            for v in 0..cd[va] {
                for u in 0..cd[ua] {
                    let mut c = [0usize; 3];
                    c[ua] = u;
                    c[va] = v;
                    let at = |du: usize, dv: usize| {
                        let mut p = c;
                        p[ua] += du;
                        p[va] += dv;
                        pt_id(p[0], p[1], p[2])
                    };
                    let ids = [at(0, 0), at(1, 0), at(1, 1), at(0, 1)];
                    let quad: Vec<usize> = ids.iter().map(|&s| points.get(s)).collect();
                    out.polys.push(&quad);
                    cell_src.push(cell_id(c));
                }
            }
        }
        2 => {
            let axis = (0..3).find(|a| pd[*a] > 1).unwrap_or(0);
            for u in 0..cd[axis] {
                let mut a = [0usize; 3];
                a[axis] = u;
                let mut b = [0usize; 3];
                b[axis] = u + 1;
                let seg = [
                    points.get(pt_id(a[0], a[1], a[2])),
                    points.get(pt_id(b[0], b[1], b[2])),
                ];
                out.lines.push(&seg);
                let mut c = [0usize; 3];
                c[axis] = u;
                cell_src.push(cell_id(c));
            }
        }
        _ => {
            let v = [points.get(0)];
            out.verts.push(&v);
            cell_src.push(0);
        }
    }

    for &src in &points.used {
        let k = src / (pd[0] * pd[1]);
        let j = (src / pd[0]) % pd[1];
        let i = src % pd[0];
        out.points.push(grid.point(i, j, k));
    }
    out.point_data = point_data.select(&points.used);
    out.cell_data = cell_data.select(&cell_src);
    add_point_provenance(&mut out, &points.used, opts.pass_through_point_ids);
    if opts.pass_through_cell_ids {
        out.cell_data.add(
            names::ORIGINAL_CELL_IDS,
            AttributeArray::Int64(cell_src.iter().map(|&i| i as i64).collect()),
        );
    }
    out
}

/// Wireframe outline of a structured grid: the 12 extent edges traced as
/// polylines through the actual grid points, so curvilinear grids outline
/// their true shape rather than a bounding box.
pub fn structured_outline<G: StructuredPoints>(grid: &G) -> PolyData {
    let extent = grid.extent();
    let pd = extent.point_dims();
    let mut out = PolyData::new();
    if extent.num_points() == 0 {
        return out;
    }
    let mut points = PointMap::new();
    let mut seen_edges: HashMap<Vec<usize>, ()> = HashMap::new();
    let pt_id = |p: [usize; 3]| p[0] + p[1] * pd[0] + p[2] * pd[0] * pd[1];
    for axis in 0..3 {
        let ua = (axis + 1) % 3;
        let va = (axis + 2) % 3;
        for &u_end in &[0usize, 1] {
            for &v_end in &[0usize, 1] {
                let mut ids = Vec::with_capacity(pd[axis]);
                for t in 0..pd[axis] {
                    let mut p = [0usize; 3];
                    p[axis] = t;
                    p[ua] = u_end * (pd[ua] - 1);
                    p[va] = v_end * (pd[va] - 1);
                    ids.push(pt_id(p));
                }
                // Flat axes collapse edges onto each other; keep one copy.
                if ids.len() < 2 || seen_edges.insert(ids.clone(), ()).is_some() {
                    continue;
                }
                let line: Vec<usize> = ids.iter().map(|&s| points.get(s)).collect();
                out.lines.push(&line);
            }
        }
    }
    for &src in &points.used {
        let k = src / (pd[0] * pd[1]);
        let j = (src / pd[0]) % pd[1];
        let i = src % pd[0];
        out.points.push(grid.point(i, j, k));
    }
    out
}

// ---------------------------------------------------------------------------
// Unstructured grids
// ---------------------------------------------------------------------------

fn face_key(face: &CellFace, ignore_mid_order: bool) -> Vec<usize> {
    let mut key: Vec<usize> = face.corners.iter().copied().sorted().collect();
    if !ignore_mid_order && !face.mids.is_empty() {
        key.push(usize::MAX); // separator
        key.extend(face.mids.iter().copied().sorted());
    }
    key
}

/// Boundary faces of the 3-D cells, counted by hashed corner sets; faces
/// used exactly once are external. Lower-dimensional cells pass through.
fn boundary_faces(
    input: &UnstructuredGrid,
    ignore_mid_order: bool,
) -> Vec<(usize, CellFace)> {
    let mut counts: HashMap<Vec<usize>, u32> = HashMap::new();
    let mut scratch = Vec::new();
    for (&shape, conn) in input.shapes.iter().zip(input.cells.iter()) {
        if shape.dimension() != 3 {
            continue;
        }
        scratch.clear();
        cell_faces(shape, conn, &mut scratch);
        for face in &scratch {
            *counts.entry(face_key(face, ignore_mid_order)).or_insert(0) += 1;
        }
    }
    let mut out = Vec::new();
    for (ci, (&shape, conn)) in input.shapes.iter().zip(input.cells.iter()).enumerate() {
        if shape.dimension() != 3 {
            continue;
        }
        scratch.clear();
        cell_faces(shape, conn, &mut scratch);
        for face in scratch.drain(..) {
            if counts[&face_key(&face, ignore_mid_order)] == 1 {
                out.push((ci, face));
            }
        }
    }
    out
}

/// Extract the 2-D boundary faces of an unstructured grid as another
/// unstructured grid, preserving per-face original-cell and original-point
/// ids. Point merging is deliberately suppressed (all input points are
/// kept) so discontinuous attributes stay distinguishable, and ghost cells
/// are retained so only valid exterior faces are produced downstream.
pub fn extract_boundary_faces(input: &UnstructuredGrid, opts: &ExtractOptions) -> UnstructuredGrid {
    let mut out = UnstructuredGrid::new();
    out.points = input.points.clone();
    out.point_data = input.point_data.clone();
    if opts.pass_through_point_ids {
        out.point_data.add(
            names::ORIGINAL_POINT_IDS,
            AttributeArray::Int64((0..input.num_points() as i64).collect()),
        );
    }
    out.field_data = input.field_data.clone();

    let mut src_cells: Vec<usize> = Vec::new();
    let mut push = |out: &mut UnstructuredGrid, src: usize, shape: CellShape, conn: &[usize]| {
        out.push_cell(shape, conn);
        src_cells.push(src);
    };

    for (ci, (&shape, conn)) in input.shapes.iter().zip(input.cells.iter()).enumerate() {
        if shape.dimension() <= 2 {
            push(&mut out, ci, shape, conn);
        }
    }
    for (ci, face) in boundary_faces(input, opts.match_boundaries_ignoring_cell_order) {
        let (shape, conn) = face_as_cell(&face);
        push(&mut out, ci, shape, &conn);
    }

    out.cell_data = input.cell_data.select(&src_cells);
    if opts.pass_through_cell_ids {
        out.cell_data.add(
            names::ORIGINAL_CELL_IDS,
            AttributeArray::Int64(src_cells.iter().map(|&i| i as i64).collect()),
        );
    }
    out
}

fn face_as_cell(face: &CellFace) -> (CellShape, Vec<usize>) {
    if face.mids.is_empty() {
        let shape = match face.corners.len() {
            3 => CellShape::Triangle,
            4 => CellShape::Quad,
            _ => CellShape::Polygon,
        };
        (shape, face.corners.clone())
    } else {
        let shape = match face.corners.len() {
            3 => CellShape::QuadraticTriangle,
            _ => CellShape::QuadraticQuad,
        };
        let mut conn = face.corners.clone();
        conn.extend_from_slice(&face.mids);
        (shape, conn)
    }
}

/// Controls for [`extract_outer_surface`].
pub struct OuterSurfaceOptions {
    /// Record the producing cell index of `input` under the internal
    /// original-face-id name instead of `vtkOriginalCellIds`.
    pub record_face_ids: bool,
    /// Write `vtkOriginalCellIds` (ignored when `record_face_ids`).
    pub pass_cell_ids: bool,
    /// Write `vtkOriginalPointIds` pointing at `input`'s points.
    pub pass_point_ids: bool,
    /// Nonlinear subdivision level; 0 emits corner-linear geometry.
    pub subdivision_level: u32,
    /// Match boundary faces ignoring mid-node order.
    pub match_boundaries: bool,
}

/// Extract the outer polygonal surface of an unstructured grid: boundary
/// faces of 3-D cells, 2-D cells as-is, 1-D cells as lines, 0-D as
/// vertices. Quadratic faces are linearized through their true mid-edge
/// nodes when `subdivision_level > 0`, so no points are synthesized and
/// every output point keeps a valid original id.
pub fn extract_outer_surface(input: &UnstructuredGrid, o: &OuterSurfaceOptions) -> PolyData {
    let mut out = PolyData::new();
    let mut points = PointMap::new();

    // Source cell per emitted cell, per output stream, gathered in
    // canonical stream order afterwards.
    let mut vert_src: Vec<usize> = Vec::new();
    let mut line_src: Vec<usize> = Vec::new();
    let mut poly_src: Vec<usize> = Vec::new();

    for (ci, (&shape, conn)) in input.shapes.iter().zip(input.cells.iter()).enumerate() {
        match shape.dimension() {
            0 => {
                let v: Vec<usize> = conn.iter().map(|&p| points.get(p)).collect();
                out.verts.push(&v);
                vert_src.push(ci);
            }
            1 => {
                if shape == CellShape::QuadraticEdge && o.subdivision_level > 0 {
                    for seg in [[conn[0], conn[2]], [conn[2], conn[1]]] {
                        let line = [points.get(seg[0]), points.get(seg[1])];
                        out.lines.push(&line);
                        line_src.push(ci);
                    }
                } else {
                    let line = [points.get(conn[0]), points.get(conn[1])];
                    out.lines.push(&line);
                    line_src.push(ci);
                }
            }
            2 => {
                let mut faces = Vec::new();
                cell_faces(shape, conn, &mut faces);
                for face in &faces {
                    emit_face(&mut out, &mut points, &mut poly_src, ci, face, o.subdivision_level);
                }
            }
            _ => {}
        }
    }
    // 3-D boundary faces.
    for (ci, face) in boundary_faces(input, o.match_boundaries) {
        emit_face(&mut out, &mut points, &mut poly_src, ci, &face, o.subdivision_level);
    }

    for &src in &points.used {
        out.points.push(input.points[src]);
    }

    // Point attributes: interpolated ids from earlier stages are stripped;
    // this stage records its own.
    out.point_data = input.point_data.select(&points.used);
    out.point_data.remove(names::ORIGINAL_POINT_IDS);
    add_point_provenance(&mut out, &points.used, o.pass_point_ids);

    let src_flat: Vec<usize> = vert_src
        .iter()
        .chain(line_src.iter())
        .chain(poly_src.iter())
        .copied()
        .collect();
    out.cell_data = input.cell_data.select(&src_flat);
    if o.record_face_ids {
        out.cell_data.add(
            names::ORIGINAL_FACE_IDS,
            AttributeArray::Int64(src_flat.iter().map(|&i| i as i64).collect()),
        );
    } else if o.pass_cell_ids {
        out.cell_data.add(
            names::ORIGINAL_CELL_IDS,
            AttributeArray::Int64(src_flat.iter().map(|&i| i as i64).collect()),
        );
    }
    out.field_data = input.field_data.clone();
    out
}

fn emit_face_polys(
    out: &mut PolyData,
    points: &mut PointMap,
    srcs: &mut Vec<usize>,
    src: usize,
    ids: &[usize],
) {
    let cell: Vec<usize> = ids.iter().map(|&p| points.get(p)).collect();
    out.polys.push(&cell);
    srcs.push(src);
}

fn emit_face(
    out: &mut PolyData,
    points: &mut PointMap,
    poly_srcs: &mut Vec<usize>,
    src: usize,
    face: &CellFace,
    level: u32,
) {
    if face.mids.is_empty() || level == 0 {
        emit_face_polys(out, points, poly_srcs, src, &face.corners);
    } else if face.corners.len() == 3 {
        let [c0, c1, c2] = [face.corners[0], face.corners[1], face.corners[2]];
        let [m01, m12, m20] = [face.mids[0], face.mids[1], face.mids[2]];
        for tri in [[c0, m01, m20], [m01, c1, m12], [m20, m12, c2], [m01, m12, m20]] {
            emit_face_polys(out, points, poly_srcs, src, &tri);
        }
    } else {
        // Quadratic quad: boundary-exact octagon through the mid nodes.
        let c = &face.corners;
        let m = &face.mids;
        let ring = [c[0], m[0], c[1], m[1], c[2], m[2], c[3], m[3]];
        emit_face_polys(out, points, poly_srcs, src, &ring);
    }
}

/// Full unstructured surface pipeline. Linear grids without triangulation
/// go straight through the outer-surface kernel. Nonlinear grids (at a
/// positive subdivision level) and triangulation requests take the
/// two-stage path: boundary-face pre-extraction, then linearized surface
/// extraction against the face grid, then triangulation and wireframe
/// recovery so subdivided faces still render with their original edges.
pub fn unstructured_surface(input: &UnstructuredGrid, opts: &ExtractOptions) -> PolyData {
    let two_stage =
        opts.triangulate || (!input.is_linear() && opts.nonlinear_subdivision_level > 0);
    if !two_stage {
        return extract_outer_surface(
            input,
            &OuterSurfaceOptions {
                record_face_ids: false,
                pass_cell_ids: opts.pass_through_cell_ids,
                pass_point_ids: opts.pass_through_point_ids,
                subdivision_level: opts.nonlinear_subdivision_level,
                match_boundaries: opts.match_boundaries_ignoring_cell_order,
            },
        );
    }

    let faces = extract_boundary_faces(input, opts);
    let mut surface = extract_outer_surface(
        &faces,
        &OuterSurfaceOptions {
            record_face_ids: true,
            pass_cell_ids: opts.pass_through_cell_ids,
            // Needed for the id chain even when the caller opted out.
            pass_point_ids: true,
            subdivision_level: opts.nonlinear_subdivision_level,
            match_boundaries: opts.match_boundaries_ignoring_cell_order,
        },
    );
    remap_point_ids(&mut surface, &faces);
    if opts.triangulate {
        surface = triangulate_polys(&surface);
    }
    if !opts.generate_feature_edges {
        recover_wireframe(&mut surface);
    }
    surface.cell_data.remove(names::ORIGINAL_FACE_IDS);
    if !opts.pass_through_point_ids {
        surface.point_data.remove(names::ORIGINAL_POINT_IDS);
    }
    surface
}

// Compose surface point ids through the intermediate face grid's own
// original-point-id array; -1 (unknown origin) propagates.
fn remap_point_ids(surface: &mut PolyData, stage: &UnstructuredGrid) {
    let remapped = {
        let Some(upstream) = stage
            .point_data
            .get(names::ORIGINAL_POINT_IDS)
            .and_then(|a| a.as_i64())
        else {
            return;
        };
        let Some(local) = surface
            .point_data
            .get(names::ORIGINAL_POINT_IDS)
            .and_then(|a| a.as_i64())
        else {
            return;
        };
        local
            .iter()
            .map(|&p| {
                if p < 0 {
                    -1
                } else {
                    upstream.get(p as usize).copied().unwrap_or(-1)
                }
            })
            .collect::<Vec<i64>>()
    };
    surface
        .point_data
        .add(names::ORIGINAL_POINT_IDS, AttributeArray::Int64(remapped));
}

// ---------------------------------------------------------------------------
// Triangulation and wireframe recovery
// ---------------------------------------------------------------------------

/// Fan-triangulate polygons and decompose strips into triangles; vertices
/// and lines pass through. Cell attributes follow each triangle's source
/// cell.
pub fn triangulate_polys(pd: &PolyData) -> PolyData {
    let mut out = PolyData::new();
    out.points = pd.points.clone();
    out.point_data = pd.point_data.clone();
    out.field_data = pd.field_data.clone();

    let counts = pd.stream_counts();
    let mut src: Vec<usize> = Vec::new();
    for (i, cell) in pd.verts.iter().enumerate() {
        out.verts.push(cell);
        src.push(i);
    }
    for (i, cell) in pd.lines.iter().enumerate() {
        out.lines.push(cell);
        src.push(counts[0] + i);
    }
    let mut poly_src: Vec<usize> = Vec::new();
    for (i, cell) in pd.polys.iter().enumerate() {
        let flat = counts[0] + counts[1] + i;
        for t in 1..cell.len().saturating_sub(1) {
            out.polys.push(&[cell[0], cell[t], cell[t + 1]]);
            poly_src.push(flat);
        }
    }
    for (i, cell) in pd.strips.iter().enumerate() {
        let flat = counts[0] + counts[1] + counts[2] + i;
        for t in 0..cell.len().saturating_sub(2) {
            let tri = if t % 2 == 0 {
                [cell[t], cell[t + 1], cell[t + 2]]
            } else {
                [cell[t + 1], cell[t], cell[t + 2]]
            };
            out.polys.push(&tri);
            poly_src.push(flat);
        }
    }
    src.extend(poly_src);
    out.cell_data = pd.cell_data.select(&src);
    out
}

/// Tag each polygon with an edge-visibility bitmask so triangulated
/// polygons still render as their original wireframe: an edge is hidden
/// iff it is shared by two polygons carrying the same original face id.
/// The mask lands in the `vtkEdgeFlags` cell array (bit `i` = edge
/// `corners[i] -> corners[i+1]` visible).
pub fn recover_wireframe(pd: &mut PolyData) {
    let n_cells = pd.num_cells();
    let counts = pd.stream_counts();
    let face_ids: Option<Vec<i64>> = pd
        .cell_data
        .get(names::ORIGINAL_FACE_IDS)
        .and_then(|a| a.as_i64())
        .map(|s| s.to_vec());
    if face_ids.is_none() {
        log::warn!("no original-face-id array; leaving all edges visible");
    }

    let mut masks = vec![u8::MAX; n_cells];
    let poly_base = counts[0] + counts[1];
    let mut edges: HashMap<(usize, usize), Vec<(usize, usize, i64)>> = HashMap::new();
    for (pi, cell) in pd.polys.iter().enumerate() {
        masks[poly_base + pi] = if cell.len() >= 8 {
            u8::MAX
        } else {
            (1u8 << cell.len()) - 1
        };
        let fid = face_ids
            .as_ref()
            .map(|f| f[poly_base + pi])
            .unwrap_or(pi as i64);
        for slot in 0..cell.len() {
            let a = cell[slot];
            let b = cell[(slot + 1) % cell.len()];
            let key = (a.min(b), a.max(b));
            edges.entry(key).or_default().push((pi, slot, fid));
        }
    }
    for users in edges.values() {
        for (i, &(pi, slot, fid)) in users.iter().enumerate() {
            let internal = users
                .iter()
                .enumerate()
                .any(|(j, &(_, _, other))| j != i && other == fid && other >= 0);
            if internal {
                masks[poly_base + pi] &= !(1u8 << slot.min(7));
            }
        }
    }
    pd.cell_data.add(names::EDGE_FLAGS, AttributeArray::UInt8(masks));
}

// ---------------------------------------------------------------------------
// Feature edges
// ---------------------------------------------------------------------------

/// Reduce a polygonal surface to its feature edges: boundary edges (used
/// by one polygon), non-manifold edges (more than two), and sharp edges
/// (two polygons whose normals differ by more than `feature_angle`
/// degrees).
pub fn feature_edges(pd: &PolyData, feature_angle: f64) -> PolyData {
    let mut edges: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (pi, cell) in pd.polys.iter().enumerate() {
        for slot in 0..cell.len() {
            let a = cell[slot];
            let b = cell[(slot + 1) % cell.len()];
            edges.entry((a.min(b), a.max(b))).or_default().push(pi);
        }
    }
    let normals: Vec<[f64; 3]> = pd
        .polys
        .iter()
        .map(|cell| polygon_normal(&pd.points, cell))
        .collect();

    let mut out = PolyData::new();
    let mut points = PointMap::new();
    for (&(a, b), users) in edges.iter().sorted_by_key(|(k, _)| **k) {
        let keep = match users.len() {
            1 => true,
            2 => angle_deg(normals[users[0]], normals[users[1]]) > feature_angle,
            _ => true,
        };
        if keep {
            let line = [points.get(a), points.get(b)];
            out.lines.push(&line);
        }
    }
    for &src in &points.used {
        out.points.push(pd.points[src]);
    }
    out.point_data = pd.point_data.select(&points.used);
    out.field_data = pd.field_data.clone();
    out
}

// ---------------------------------------------------------------------------
// Hyper-tree grids
// ---------------------------------------------------------------------------

struct HtgFace {
    leaf: usize,
    axis: usize,
    corners: [[f64; 3]; 4],
}

fn quantize(grid: &HyperTreeGrid, p: [f64; 3]) -> [i64; 3] {
    let eps = grid
        .root_size
        .iter()
        .fold(f64::INFINITY, |m, &s| m.min(s))
        .max(f64::MIN_POSITIVE)
        / 4096.0;
    [
        (p[0] / eps).round() as i64,
        (p[1] / eps).round() as i64,
        (p[2] / eps).round() as i64,
    ]
}

fn htg_boundary_faces(grid: &HyperTreeGrid) -> Vec<HtgFace> {
    let leaves = grid.leaves();
    let mut counts: HashMap<Vec<[i64; 3]>, u32> = HashMap::new();
    let mut faces = Vec::new();
    for (li, leaf) in leaves.iter().enumerate() {
        let [xmin, xmax, ymin, ymax, zmin, zmax] = leaf.as_bounds();
        let corner = |mask: usize| {
            [
                if mask & 1 == 1 { xmax } else { xmin },
                if mask & 2 == 2 { ymax } else { ymin },
                if mask & 4 == 4 { zmax } else { zmin },
            ]
        };
        // Corner masks per logical face, outline face order.
        const FACE_MASKS: [[usize; 4]; 6] = [
            [0, 4, 6, 2],
            [1, 3, 7, 5],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 2, 3, 1],
            [4, 5, 7, 6],
        ];
        for (fi, masks) in FACE_MASKS.iter().enumerate() {
            let corners = [corner(masks[0]), corner(masks[1]), corner(masks[2]), corner(masks[3])];
            let key: Vec<[i64; 3]> = corners
                .iter()
                .map(|&c| quantize(grid, c))
                .sorted()
                .collect();
            *counts.entry(key).or_insert(0) += 1;
            faces.push(HtgFace { leaf: li, axis: fi / 2, corners });
        }
    }
    faces
        .into_iter()
        .filter(|f| {
            let key: Vec<[i64; 3]> = f
                .corners
                .iter()
                .map(|&c| quantize(grid, c))
                .sorted()
                .collect();
            counts[&key] == 1
        })
        .collect()
}

/// Extract the exterior surface of a hyper-tree grid: the leaf-box faces
/// not shared between equal-size neighbor leaves.
pub fn htg_surface(grid: &HyperTreeGrid, opts: &ExtractOptions) -> PolyData {
    let faces = htg_boundary_faces(grid);
    let mut out = PolyData::new();
    let mut point_ids: HashMap<[i64; 3], usize> = HashMap::new();
    let mut leaf_src: Vec<usize> = Vec::new();
    for face in &faces {
        let mut quad = [0usize; 4];
        for (i, &c) in face.corners.iter().enumerate() {
            let key = quantize(grid, c);
            let next = point_ids.len();
            let id = *point_ids.entry(key).or_insert(next);
            if id == out.points.len() {
                out.points.push(c);
            }
            quad[i] = id;
        }
        out.polys.push(&quad);
        leaf_src.push(face.leaf);
    }
    out.cell_data = grid.cell_data.select(&leaf_src);
    if opts.pass_through_cell_ids {
        out.cell_data.add(
            names::ORIGINAL_CELL_IDS,
            AttributeArray::Int64(leaf_src.iter().map(|&i| i as i64).collect()),
        );
    }
    out.field_data = grid.field_data.clone();
    out
}

/// Feature edges of a hyper-tree grid, produced directly from the leaf
/// boxes without going through full surface generation: boundary edges of
/// the exterior face set plus creases where faces of different axes meet.
pub fn htg_feature_edges(grid: &HyperTreeGrid) -> PolyData {
    let faces = htg_boundary_faces(grid);
    let mut edges: HashMap<([i64; 3], [i64; 3]), (Vec<usize>, [f64; 3], [f64; 3])> = HashMap::new();
    for face in &faces {
        for i in 0..4 {
            let a = face.corners[i];
            let b = face.corners[(i + 1) % 4];
            let (ka, kb) = (quantize(grid, a), quantize(grid, b));
            let (key, pa, pb) = if ka <= kb { ((ka, kb), a, b) } else { ((kb, ka), b, a) };
            edges.entry(key).or_insert_with(|| (Vec::new(), pa, pb)).0.push(face.axis);
        }
    }
    let mut out = PolyData::new();
    let mut point_ids: HashMap<[i64; 3], usize> = HashMap::new();
    for (&(ka, kb), (axes, pa, pb)) in edges.iter().sorted_by_key(|(k, _)| **k) {
        let crease = axes.len() != 2 || axes[0] != axes[1];
        if !crease {
            continue;
        }
        let mut id_of = |key: [i64; 3], p: [f64; 3], out: &mut PolyData| {
            let next = point_ids.len();
            let id = *point_ids.entry(key).or_insert(next);
            if id == out.points.len() {
                out.points.push(p);
            }
            id
        };
        let line = [id_of(ka, *pa, &mut out), id_of(kb, *pb, &mut out)];
        out.lines.push(&line);
    }
    out.field_data = grid.field_data.clone();
    out
}

// ---------------------------------------------------------------------------
// Explicit structured grids
// ---------------------------------------------------------------------------

/// Surface of an explicit structured grid: hexahedral boundary faces via
/// the unstructured outer-surface kernel, with pass-through ids.
pub fn explicit_structured_surface(
    grid: &ExplicitStructuredGrid,
    opts: &ExtractOptions,
) -> PolyData {
    let mut ug = UnstructuredGrid::new();
    ug.points = grid.points.clone();
    ug.point_data = grid.point_data.clone();
    ug.cell_data = grid.cell_data.clone();
    ug.field_data = grid.field_data.clone();
    for cell in &grid.cells {
        ug.push_cell(CellShape::Hexahedron, cell);
    }
    extract_outer_surface(
        &ug,
        &OuterSurfaceOptions {
            record_face_ids: false,
            pass_cell_ids: opts.pass_through_cell_ids,
            pass_point_ids: opts.pass_through_point_ids,
            subdivision_level: 0,
            match_boundaries: false,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::htg::{HyperTree, HyperTreeGrid};
    use crate::dataset::structured::ImageGrid;
    use crate::geometry::Extent;

    fn unit_cube_grid() -> UnstructuredGrid {
        let mut g = UnstructuredGrid::new();
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    g.points.push([x as f64, y as f64, z as f64]);
                }
            }
        }
        g.push_cell(CellShape::Hexahedron, &[0, 1, 3, 2, 4, 5, 7, 6]);
        g
    }

    #[test]
    fn image_surface_covers_all_six_sides() {
        let img = ImageGrid::new(Extent([0, 2, 0, 2, 0, 2]), [0.0; 3], [1.0; 3]);
        let opts = ExtractOptions::default();
        let out = structured_surface(
            &img,
            &img.point_data,
            &img.cell_data,
            &[true; 6],
            &opts,
        );
        // 6 sides x 2x2 cells, and the interior point stays out.
        assert_eq!(out.polys.len(), 24);
        assert_eq!(out.num_points(), 26);
        let ids = out
            .point_data
            .get(names::ORIGINAL_POINT_IDS)
            .and_then(|a| a.as_i64())
            .unwrap();
        assert_eq!(ids.len(), 26);
        assert!(!ids.contains(&13)); // center of the 3x3x3 point lattice
        let cids = out
            .cell_data
            .get(names::ORIGINAL_CELL_IDS)
            .and_then(|a| a.as_i64())
            .unwrap();
        assert_eq!(cids.len(), 24);
    }

    #[test]
    fn image_surface_face_restriction() {
        let img = ImageGrid::new(Extent([0, 2, 0, 2, 0, 2]), [0.0; 3], [1.0; 3]);
        let opts = ExtractOptions::default();
        let mut faces = [false; 6];
        faces[0] = true;
        let out = structured_surface(&img, &img.point_data, &img.cell_data, &faces, &opts);
        assert_eq!(out.polys.len(), 4);
    }

    #[test]
    fn flat_grid_is_its_own_surface() {
        let img = ImageGrid::new(Extent([0, 2, 0, 2, 0, 0]), [0.0; 3], [1.0; 3]);
        let opts = ExtractOptions::default();
        let out = structured_surface(&img, &img.point_data, &img.cell_data, &[true; 6], &opts);
        assert_eq!(out.polys.len(), 4);
        assert_eq!(out.num_points(), 9);
    }

    #[test]
    fn structured_outline_traces_extent_edges() {
        let img = ImageGrid::new(Extent([0, 3, 0, 1, 0, 2]), [0.0; 3], [1.0; 3]);
        let out = structured_outline(&img);
        assert_eq!(out.lines.len(), 12);
        assert_eq!(out.lines.cell(0).len(), 4); // 4 points along x
    }

    #[test]
    fn tetra_surface_is_four_triangles() {
        let mut g = UnstructuredGrid::new();
        g.points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        g.push_cell(CellShape::Tetra, &[0, 1, 2, 3]);
        let out = unstructured_surface(&g, &ExtractOptions::default());
        assert_eq!(out.polys.len(), 4);
        assert_eq!(out.num_points(), 4);
        let pids = out
            .point_data
            .get(names::ORIGINAL_POINT_IDS)
            .and_then(|a| a.as_i64())
            .unwrap();
        let mut sorted = pids.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
        let cids = out
            .cell_data
            .get(names::ORIGINAL_CELL_IDS)
            .and_then(|a| a.as_i64())
            .unwrap();
        assert!(cids.iter().all(|&c| c == 0));
    }

    #[test]
    fn shared_face_is_internal() {
        let mut g = UnstructuredGrid::new();
        g.points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
        ];
        g.push_cell(CellShape::Tetra, &[0, 1, 2, 3]);
        g.push_cell(CellShape::Tetra, &[1, 2, 3, 4]);
        let out = unstructured_surface(&g, &ExtractOptions::default());
        assert_eq!(out.polys.len(), 6);
    }

    #[test]
    fn quadratic_tetra_subdivides_through_mid_nodes() {
        let mut g = UnstructuredGrid::new();
        let c = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        g.points.extend_from_slice(&c);
        const EDGES: [[usize; 2]; 6] = [[0, 1], [1, 2], [2, 0], [0, 3], [1, 3], [2, 3]];
        for [a, b] in EDGES {
            g.points.push([
                (c[a][0] + c[b][0]) / 2.0,
                (c[a][1] + c[b][1]) / 2.0,
                (c[a][2] + c[b][2]) / 2.0,
            ]);
        }
        g.push_cell(CellShape::QuadraticTetra, &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let out = unstructured_surface(&g, &ExtractOptions::default());
        // 4 faces, each split into 4 triangles through true mid nodes.
        assert_eq!(out.polys.len(), 16);
        assert_eq!(out.num_points(), 10);
        // The internal face-id scratch array never leaks.
        assert!(out.cell_data.get(names::ORIGINAL_FACE_IDS).is_none());
        // Wireframe recovery hid every subdivision-interior edge: the
        // center triangle of each face shares all 3 edges with siblings
        // of the same face.
        let masks = out
            .cell_data
            .get(names::EDGE_FLAGS)
            .and_then(|a| a.as_u8())
            .unwrap();
        assert!(masks.iter().any(|&m| m == 0));
        let pids = out
            .point_data
            .get(names::ORIGINAL_POINT_IDS)
            .and_then(|a| a.as_i64())
            .unwrap();
        assert!(pids.iter().all(|&p| (0..10).contains(&p)));
    }

    #[test]
    fn triangulation_fans_polygons_and_keeps_cell_data() {
        let mut pd = PolyData::new();
        pd.points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        pd.polys.push(&[0, 1, 2, 3]);
        pd.cell_data
            .add("tag", AttributeArray::Int64(vec![42]));
        let out = triangulate_polys(&pd);
        assert_eq!(out.polys.len(), 2);
        assert_eq!(out.strips.len(), 0);
        let tags = out.cell_data.get("tag").and_then(|a| a.as_i64()).unwrap();
        assert_eq!(tags, &[42, 42]);
    }

    #[test]
    fn wireframe_recovery_hides_same_face_shared_edges() {
        let mut pd = PolyData::new();
        pd.points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        pd.polys.push(&[0, 1, 2]);
        pd.polys.push(&[0, 2, 3]);
        pd.cell_data
            .add(names::ORIGINAL_FACE_IDS, AttributeArray::Int64(vec![7, 7]));
        recover_wireframe(&mut pd);
        let masks = pd
            .cell_data
            .get(names::EDGE_FLAGS)
            .and_then(|a| a.as_u8())
            .unwrap();
        // Diagonal 0-2 is edge 2 of the first triangle and edge 0 of the
        // second.
        assert_eq!(masks[0], 0b011);
        assert_eq!(masks[1], 0b110);
    }

    #[test]
    fn cube_feature_edges() {
        let out = unstructured_surface(&unit_cube_grid(), &ExtractOptions::default());
        let edges = feature_edges(&out, 30.0);
        assert_eq!(edges.lines.len(), 12);
        assert_eq!(edges.num_points(), 8);
    }

    #[test]
    fn coplanar_interior_edge_is_not_a_feature() {
        let mut pd = PolyData::new();
        pd.points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        pd.polys.push(&[0, 1, 4, 5]);
        pd.polys.push(&[1, 2, 3, 4]);
        let edges = feature_edges(&pd, 30.0);
        // 6 boundary edges; the shared edge 1-4 is flat and dropped.
        assert_eq!(edges.lines.len(), 6);
    }

    #[test]
    fn htg_single_leaf_surface_and_edges() {
        let grid = HyperTreeGrid {
            dims: [1, 1, 1],
            origin: [0.0; 3],
            root_size: [1.0; 3],
            trees: vec![HyperTree {
                root: [0, 0, 0],
                refined: vec![false],
            }],
            cell_data: AttributeSet::new(),
            field_data: AttributeSet::new(),
        };
        let out = htg_surface(&grid, &ExtractOptions::default());
        assert_eq!(out.polys.len(), 6);
        assert_eq!(out.num_points(), 8);
        let edges = htg_feature_edges(&grid);
        assert_eq!(edges.lines.len(), 12);
    }

    #[test]
    fn htg_refined_tree_drops_internal_faces() {
        let grid = HyperTreeGrid {
            dims: [1, 1, 1],
            origin: [0.0; 3],
            root_size: [1.0; 3],
            trees: vec![HyperTree {
                root: [0, 0, 0],
                refined: vec![true],
            }],
            cell_data: AttributeSet::new(),
            field_data: AttributeSet::new(),
        };
        // 8 octant leaves: 8*6 faces, 12 internal pairs removed.
        let out = htg_surface(&grid, &ExtractOptions::default());
        assert_eq!(out.polys.len(), 24);
    }

    #[test]
    fn boundary_face_stage_keeps_all_points() {
        let g = unit_cube_grid();
        let faces = extract_boundary_faces(&g, &ExtractOptions::default());
        assert_eq!(faces.num_points(), g.num_points());
        assert_eq!(faces.num_cells(), 6);
        let cids = faces
            .cell_data
            .get(names::ORIGINAL_CELL_IDS)
            .and_then(|a| a.as_i64())
            .unwrap();
        assert!(cids.iter().all(|&c| c == 0));
    }
}
