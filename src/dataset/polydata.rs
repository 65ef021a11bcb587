//! Polygonal mesh representation: the output currency of the pipeline.
//!
//! `PolyData` holds points plus four primitive streams (vertices, lines,
//! polygons, triangle strips) and point/cell/field attribute sets. Cells
//! have a canonical flat ordering — all verts, then lines, then polys, then
//! strips — and cell attributes are indexed in that order.

use serde::{Deserialize, Serialize};

use crate::dataset::attributes::AttributeSet;
use crate::dataset::names;
use crate::geometry::BoundingBox;

/// Offset/connectivity cell storage.
///
/// `offsets` always starts at 0 and has `len() + 1` entries; cell `i`
/// occupies `connectivity[offsets[i]..offsets[i+1]]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellArray {
    offsets: Vec<usize>,
    connectivity: Vec<usize>,
}

impl Default for CellArray {
    fn default() -> Self {
        Self { offsets: vec![0], connectivity: Vec::new() }
    }
}

impl CellArray {
    /// Empty cell array.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// True when there are no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one cell.
    pub fn push(&mut self, cell: &[usize]) {
        self.connectivity.extend_from_slice(cell);
        self.offsets.push(self.connectivity.len());
    }

    /// Point ids of cell `i`.
    pub fn cell(&self, i: usize) -> &[usize] {
        &self.connectivity[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Iterate cells in order.
    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        (0..self.len()).map(|i| self.cell(i))
    }

    /// Append all cells of `other`, shifting point ids by `point_offset`.
    pub fn append_shifted(&mut self, other: &CellArray, point_offset: usize) {
        for cell in other.iter() {
            self.connectivity.extend(cell.iter().map(|&p| p + point_offset));
            self.offsets.push(self.connectivity.len());
        }
    }
}

/// Polygonal mesh with attributes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PolyData {
    /// Point coordinates.
    pub points: Vec<[f64; 3]>,
    /// Vertex primitives.
    pub verts: CellArray,
    /// Line/polyline primitives.
    pub lines: CellArray,
    /// Polygon primitives.
    pub polys: CellArray,
    /// Triangle-strip primitives.
    pub strips: CellArray,
    /// Per-point attributes.
    pub point_data: AttributeSet,
    /// Per-cell attributes, canonical cell order.
    pub cell_data: AttributeSet,
    /// Dataset-level attributes.
    pub field_data: AttributeSet,
}

impl PolyData {
    /// Empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Total cells across all four primitive streams.
    pub fn num_cells(&self) -> usize {
        self.verts.len() + self.lines.len() + self.polys.len() + self.strips.len()
    }

    /// Bounding box of the points (inverted when empty).
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points)
    }

    /// Per-stream cell counts in canonical order.
    pub fn stream_counts(&self) -> [usize; 4] {
        [self.verts.len(), self.lines.len(), self.polys.len(), self.strips.len()]
    }

    /// Remove cells flagged in the `vtkGhostType` cell array, compacting
    /// cell attributes, then drop the ghost array itself. Points are left
    /// in place. A mesh without the array is returned untouched.
    pub fn remove_ghost_cells(&mut self) {
        let Some(ghost) = self.cell_data.get(names::GHOST_TYPE).and_then(|a| a.as_u8()) else {
            return;
        };
        if ghost.len() != self.num_cells() {
            log::warn!(
                "ghost array length {} does not match cell count {}; skipping ghost removal",
                ghost.len(),
                self.num_cells()
            );
            return;
        }
        let keep: Vec<bool> = ghost.iter().map(|&g| g == 0).collect();
        if keep.iter().all(|&k| k) {
            self.cell_data.remove(names::GHOST_TYPE);
            return;
        }

        let mut kept_flat = Vec::new();
        let mut flat = 0usize;
        let streams = [&self.verts, &self.lines, &self.polys, &self.strips];
        let mut new_streams = [CellArray::new(), CellArray::new(), CellArray::new(), CellArray::new()];
        for (s, stream) in streams.into_iter().enumerate() {
            for cell in stream.iter() {
                if keep[flat] {
                    new_streams[s].push(cell);
                    kept_flat.push(flat);
                }
                flat += 1;
            }
        }
        let [verts, lines, polys, strips] = new_streams;
        self.verts = verts;
        self.lines = lines;
        self.polys = polys;
        self.strips = strips;
        self.cell_data = self.cell_data.select(&kept_flat);
        self.cell_data.remove(names::GHOST_TYPE);
    }
}

/// Per-partition element offsets recorded when a multi-piece grouping is
/// merged by ordered concatenation. `points[i]` is the first output point
/// that came from partition `i`; the cell offsets are flat cell indices in
/// the merged mesh's canonical cell order. Empty partitions contribute zero
/// length but still occupy a slot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeOffsets {
    /// First output point per partition.
    pub points: Vec<usize>,
    /// First vertex cell per partition.
    pub verts: Vec<usize>,
    /// First line cell per partition.
    pub lines: Vec<usize>,
    /// First polygon cell per partition.
    pub polys: Vec<usize>,
    /// First strip cell per partition.
    pub strips: Vec<usize>,
}

/// Concatenate `pieces` into one mesh, recording per-piece offsets.
///
/// Points concatenate in piece order. Cells concatenate per stream (all
/// pieces' verts, then all lines, and so on) so the result's canonical cell
/// order holds. Point and cell attributes are merged by name: arrays
/// present with the same type in every contributing piece survive, others
/// are dropped. Field data is taken from the first piece, matching the
/// expectation that pieces of one grouping share field data.
///
/// `slots` is the number of partition slots in the grouping, which may
/// exceed `pieces.len()` when trailing partitions are absent; offsets are
/// reported per slot with `piece_of_slot` mapping slot -> index in `pieces`
/// (or `None` for absent slots).
pub fn append_pieces(pieces: &[&PolyData], slot_map: &[Option<usize>]) -> (PolyData, MergeOffsets) {
    let mut out = PolyData::new();
    let mut offsets = MergeOffsets::default();

    // Point offsets per slot, then concatenate points and point data.
    let mut point_cursor = 0usize;
    for slot in slot_map {
        offsets.points.push(point_cursor);
        if let Some(pi) = slot {
            point_cursor += pieces[*pi].num_points();
        }
    }
    let mut point_base = Vec::with_capacity(pieces.len());
    for piece in pieces {
        point_base.push(out.points.len());
        out.points.extend_from_slice(&piece.points);
    }
    out.point_data = merged_attributes(pieces, |p| &p.point_data);

    // Streams in canonical order; record flat cell offsets per slot.
    fn stream_of(p: &PolyData, s: usize) -> &CellArray {
        match s {
            0 => &p.verts,
            1 => &p.lines,
            2 => &p.polys,
            _ => &p.strips,
        }
    }
    let mut flat_cursor = 0usize;
    let mut source_cells: Vec<(usize, usize)> = Vec::new(); // (piece, piece-local flat id)
    for s in 0..4 {
        let stream_offsets = match s {
            0 => &mut offsets.verts,
            1 => &mut offsets.lines,
            2 => &mut offsets.polys,
            _ => &mut offsets.strips,
        };
        for slot in slot_map {
            stream_offsets.push(flat_cursor);
            if let Some(pi) = slot {
                flat_cursor += stream_of(pieces[*pi], s).len();
            }
        }
        for (pi, piece) in pieces.iter().enumerate() {
            let target = match s {
                0 => &mut out.verts,
                1 => &mut out.lines,
                2 => &mut out.polys,
                _ => &mut out.strips,
            };
            target.append_shifted(stream_of(piece, s), point_base[pi]);
            let local_base: usize = (0..s).map(|t| stream_of(piece, t).len()).sum();
            for c in 0..stream_of(piece, s).len() {
                source_cells.push((pi, local_base + c));
            }
        }
    }

    // Gather cell data in the output's canonical order.
    out.cell_data = gathered_cell_attributes(pieces, &source_cells);

    if let Some(first) = pieces.first() {
        out.field_data = first.field_data.clone();
    }
    (out, offsets)
}

fn merged_attributes<'a>(
    pieces: &[&'a PolyData],
    select: impl Fn(&'a PolyData) -> &'a AttributeSet,
) -> AttributeSet {
    let mut out = AttributeSet::new();
    let Some(first) = pieces.first() else {
        return out;
    };
    'arrays: for (name, array) in select(first).iter() {
        let mut merged = array.clone();
        for piece in &pieces[1..] {
            match select(piece).get(name) {
                Some(other) if merged.extend_from(other) => {}
                _ => continue 'arrays,
            }
        }
        out.add(name, merged);
    }
    out
}

fn gathered_cell_attributes(pieces: &[&PolyData], source: &[(usize, usize)]) -> AttributeSet {
    let mut out = AttributeSet::new();
    let Some(first) = pieces.first() else {
        return out;
    };
    'arrays: for (name, proto) in first.cell_data.iter() {
        // Every piece must carry the array with a matching type.
        for piece in pieces {
            match piece.cell_data.get(name) {
                Some(a) if std::mem::discriminant(a) == std::mem::discriminant(proto) => {}
                _ => continue 'arrays,
            }
        }
        let mut gathered = proto.select(&[]);
        for &(pi, local) in source {
            let Some(arr) = pieces[pi].cell_data.get(name) else {
                continue 'arrays;
            };
            if !gathered.extend_from(&arr.select(&[local])) {
                continue 'arrays;
            }
        }
        out.add(name, gathered);
    }
    out
}
