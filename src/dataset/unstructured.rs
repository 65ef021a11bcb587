//! Unstructured grids: points plus explicitly typed cells, including the
//! quadratic (nonlinear) shapes whose presence switches the surface
//! extractor into its subdivision-aware path.

use serde::{Deserialize, Serialize};

use crate::dataset::attributes::AttributeSet;
use crate::dataset::polydata::CellArray;
use crate::geometry::BoundingBox;

/// Cell shape. Quadratic shapes carry mid-edge nodes after the corners in
/// VTK node ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellShape {
    /// Single point.
    Vertex,
    /// Two-point segment.
    Line,
    /// Linear triangle.
    Triangle,
    /// Linear quadrilateral.
    Quad,
    /// Arbitrary linear polygon.
    Polygon,
    /// Linear tetrahedron.
    Tetra,
    /// Linear hexahedron.
    Hexahedron,
    /// Linear wedge (triangular prism).
    Wedge,
    /// Linear pyramid.
    Pyramid,
    /// Quadratic edge: 2 corners + 1 mid node.
    QuadraticEdge,
    /// Quadratic triangle: 3 corners + 3 mid-edge nodes.
    QuadraticTriangle,
    /// Quadratic quadrilateral: 4 corners + 4 mid-edge nodes.
    QuadraticQuad,
    /// Quadratic tetrahedron: 4 corners + 6 mid-edge nodes.
    QuadraticTetra,
    /// Quadratic hexahedron: 8 corners + 12 mid-edge nodes.
    QuadraticHexahedron,
}

impl CellShape {
    /// True for degree-1 interpolation shapes.
    pub fn is_linear(&self) -> bool {
        !matches!(
            self,
            CellShape::QuadraticEdge
                | CellShape::QuadraticTriangle
                | CellShape::QuadraticQuad
                | CellShape::QuadraticTetra
                | CellShape::QuadraticHexahedron
        )
    }

    /// Topological dimension.
    pub fn dimension(&self) -> u8 {
        match self {
            CellShape::Vertex => 0,
            CellShape::Line | CellShape::QuadraticEdge => 1,
            CellShape::Triangle
            | CellShape::Quad
            | CellShape::Polygon
            | CellShape::QuadraticTriangle
            | CellShape::QuadraticQuad => 2,
            CellShape::Tetra
            | CellShape::Hexahedron
            | CellShape::Wedge
            | CellShape::Pyramid
            | CellShape::QuadraticTetra
            | CellShape::QuadraticHexahedron => 3,
        }
    }
}

/// One face of a 3-D cell, or a 2-D cell viewed as its own face. `mids` is
/// empty for linear faces and holds the mid-edge node per boundary edge
/// (edge `i` runs `corners[i] -> corners[(i+1) % n]`) for quadratic ones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellFace {
    /// Corner point ids, outward-oriented.
    pub corners: Vec<usize>,
    /// Mid-edge point ids, one per edge, or empty.
    pub mids: Vec<usize>,
}

// Face corner tables, VTK cell orderings.
const TETRA_FACES: [[usize; 3]; 4] = [[0, 1, 3], [1, 2, 3], [2, 0, 3], [0, 2, 1]];
// (edge endpoints -> quadratic tetra mid node 4..9)
const TETRA_FACE_MIDS: [[usize; 3]; 4] = [[4, 8, 7], [5, 9, 8], [6, 7, 9], [6, 5, 4]];
const HEX_FACES: [[usize; 4]; 6] = [
    [0, 4, 7, 3],
    [1, 2, 6, 5],
    [0, 1, 5, 4],
    [3, 7, 6, 2],
    [0, 3, 2, 1],
    [4, 5, 6, 7],
];
// (edge endpoints -> quadratic hex mid node 8..19)
const HEX_FACE_MIDS: [[usize; 4]; 6] = [
    [16, 15, 19, 11],
    [9, 18, 13, 17],
    [8, 17, 12, 16],
    [19, 14, 18, 10],
    [11, 10, 9, 8],
    [12, 13, 14, 15],
];
const WEDGE_TRI_FACES: [[usize; 3]; 2] = [[0, 1, 2], [3, 5, 4]];
const WEDGE_QUAD_FACES: [[usize; 4]; 3] = [[0, 3, 4, 1], [1, 4, 5, 2], [2, 5, 3, 0]];
const PYRAMID_TRI_FACES: [[usize; 3]; 4] = [[0, 1, 4], [1, 2, 4], [2, 3, 4], [3, 0, 4]];
const PYRAMID_QUAD_FACE: [usize; 4] = [0, 3, 2, 1];

/// Enumerate the 2-D faces of a 3-D cell, or return the cell itself for a
/// 2-D cell. 0-D/1-D cells yield nothing.
pub fn cell_faces(shape: CellShape, conn: &[usize], out: &mut Vec<CellFace>) {
    let face = |corners: &[usize], mids: &[usize]| CellFace {
        corners: corners.iter().map(|&i| conn[i]).collect(),
        mids: mids.iter().map(|&i| conn[i]).collect(),
    };
    match shape {
        CellShape::Triangle | CellShape::Quad | CellShape::Polygon => out.push(CellFace {
            corners: conn.to_vec(),
            mids: Vec::new(),
        }),
        CellShape::QuadraticTriangle => out.push(CellFace {
            corners: conn[..3].to_vec(),
            mids: conn[3..6].to_vec(),
        }),
        CellShape::QuadraticQuad => out.push(CellFace {
            corners: conn[..4].to_vec(),
            mids: conn[4..8].to_vec(),
        }),
        CellShape::Tetra => {
            for f in &TETRA_FACES {
                out.push(face(f, &[]));
            }
        }
        CellShape::QuadraticTetra => {
            for (f, m) in TETRA_FACES.iter().zip(&TETRA_FACE_MIDS) {
                out.push(face(f, m));
            }
        }
        CellShape::Hexahedron => {
            for f in &HEX_FACES {
                out.push(face(f, &[]));
            }
        }
        CellShape::QuadraticHexahedron => {
            for (f, m) in HEX_FACES.iter().zip(&HEX_FACE_MIDS) {
                out.push(face(f, m));
            }
        }
        CellShape::Wedge => {
            for f in &WEDGE_TRI_FACES {
                out.push(face(f, &[]));
            }
            for f in &WEDGE_QUAD_FACES {
                out.push(face(f, &[]));
            }
        }
        CellShape::Pyramid => {
            out.push(face(&PYRAMID_QUAD_FACE, &[]));
            for f in &PYRAMID_TRI_FACES {
                out.push(face(f, &[]));
            }
        }
        CellShape::Vertex | CellShape::Line | CellShape::QuadraticEdge => {}
    }
}

/// Unstructured grid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UnstructuredGrid {
    /// Point positions.
    pub points: Vec<[f64; 3]>,
    /// Shape of each cell.
    pub shapes: Vec<CellShape>,
    /// Connectivity, one entry per cell, parallel to `shapes`.
    pub cells: CellArray,
    /// Per-point attributes.
    pub point_data: AttributeSet,
    /// Per-cell attributes.
    pub cell_data: AttributeSet,
    /// Dataset-level attributes.
    pub field_data: AttributeSet,
}

impl UnstructuredGrid {
    /// Empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cell.
    pub fn push_cell(&mut self, shape: CellShape, conn: &[usize]) {
        self.shapes.push(shape);
        self.cells.push(conn);
    }

    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of cells.
    pub fn num_cells(&self) -> usize {
        self.shapes.len()
    }

    /// Geometric bounds of the points.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points)
    }

    /// True when every cell is degree-1. The cheap characterization that
    /// decides whether the subdivision-aware surface path is needed.
    pub fn is_linear(&self) -> bool {
        self.shapes.iter().all(|s| s.is_linear())
    }
}
