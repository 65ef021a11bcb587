//! Outline sources: the 12-edge wireframe box and the AMR partial-face
//! box. Corner and face tables match the conventional outline ordering so
//! downstream consumers see familiar geometry.

use crate::dataset::polydata::PolyData;
use crate::geometry::BoundingBox;

/// The 8 box corners in outline order: x fastest, then y, then z.
fn box_corners(b: &BoundingBox) -> [[f64; 3]; 8] {
    let [xmin, xmax, ymin, ymax, zmin, zmax] = b.as_bounds();
    [
        [xmin, ymin, zmin],
        [xmax, ymin, zmin],
        [xmin, ymax, zmin],
        [xmax, ymax, zmin],
        [xmin, ymin, zmax],
        [xmax, ymin, zmax],
        [xmin, ymax, zmax],
        [xmax, ymax, zmax],
    ]
}

const BOX_EDGES: [[usize; 2]; 12] = [
    [0, 1], [2, 3], [4, 5], [6, 7],
    [0, 2], [1, 3], [4, 6], [5, 7],
    [0, 4], [1, 5], [2, 6], [3, 7],
];

/// Quad per logical face, outward-facing winding. Face order is
/// `[xmin, xmax, ymin, ymax, zmin, zmax]`.
const BOX_FACES: [[usize; 4]; 6] = [
    [0, 4, 6, 2],
    [1, 3, 7, 5],
    [0, 1, 5, 4],
    [2, 6, 7, 3],
    [0, 2, 3, 1],
    [4, 5, 7, 6],
];

/// 8-point, 12-edge wireframe box. Degenerate (inverted) bounds yield an
/// empty mesh.
pub fn outline_box(bounds: &BoundingBox) -> PolyData {
    let mut out = PolyData::new();
    if !bounds.is_valid() {
        return out;
    }
    out.points.extend_from_slice(&box_corners(bounds));
    for e in &BOX_EDGES {
        out.lines.push(e);
    }
    out
}

/// Partial box for an AMR block: one quad per externally-visible face.
/// Full faces (rather than edges) so that front/back-face culling works on
/// the outline.
pub fn amr_block_outline(bounds: &BoundingBox, extract_face: &[bool; 6]) -> PolyData {
    let mut out = PolyData::new();
    if !bounds.is_valid() {
        return out;
    }
    out.points.extend_from_slice(&box_corners(bounds));
    for (face, &visible) in BOX_FACES.iter().zip(extract_face) {
        if visible {
            out.polys.push(face);
        }
    }
    out
}
