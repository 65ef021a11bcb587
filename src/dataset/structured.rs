//! Structured dataset kinds: image, rectilinear, curvilinear, and
//! explicit structured grids.
//!
//! All four share the extent-indexed point/cell id space; the
//! [`StructuredPoints`] trait is the seam the structured surface and
//! outline extractors work through.

use serde::{Deserialize, Serialize};

use crate::dataset::attributes::AttributeSet;
use crate::geometry::{BoundingBox, Extent};

/// Point lookup by structured index, relative to the extent origin.
///
/// Implementations must return the geometric position of the grid point at
/// `(i, j, k)` where each index is in `0..point_dims()[axis]`.
pub trait StructuredPoints {
    /// Index extent of the grid.
    fn extent(&self) -> Extent;
    /// Position of the point at relative index `(i, j, k)`.
    fn point(&self, i: usize, j: usize, k: usize) -> [f64; 3];
}

/// Uniform grid: origin + spacing over an extent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageGrid {
    /// Index extent.
    pub extent: Extent,
    /// Position of index `(0,0,0)` in the *global* index space.
    pub origin: [f64; 3],
    /// Spacing per axis.
    pub spacing: [f64; 3],
    /// Per-point attributes.
    pub point_data: AttributeSet,
    /// Per-cell attributes.
    pub cell_data: AttributeSet,
    /// Dataset-level attributes.
    pub field_data: AttributeSet,
}

impl ImageGrid {
    /// Uniform grid with empty attributes.
    pub fn new(extent: Extent, origin: [f64; 3], spacing: [f64; 3]) -> Self {
        Self {
            extent,
            origin,
            spacing,
            point_data: AttributeSet::new(),
            cell_data: AttributeSet::new(),
            field_data: AttributeSet::new(),
        }
    }

    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.extent.num_points()
    }

    /// Number of cells.
    pub fn num_cells(&self) -> usize {
        self.extent.num_cells()
    }

    /// Geometric bounds of `extent` under this origin/spacing mapping.
    pub fn extent_bounds(&self, extent: Extent) -> BoundingBox {
        let e = extent.0;
        BoundingBox::from_bounds([
            self.origin[0] + self.spacing[0] * e[0] as f64,
            self.origin[0] + self.spacing[0] * e[1] as f64,
            self.origin[1] + self.spacing[1] * e[2] as f64,
            self.origin[1] + self.spacing[1] * e[3] as f64,
            self.origin[2] + self.spacing[2] * e[4] as f64,
            self.origin[2] + self.spacing[2] * e[5] as f64,
        ])
    }

    /// Geometric bounds of the grid's own extent.
    pub fn bounds(&self) -> BoundingBox {
        self.extent_bounds(self.extent)
    }
}

impl StructuredPoints for ImageGrid {
    fn extent(&self) -> Extent {
        self.extent
    }
    fn point(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        let e = self.extent.0;
        [
            self.origin[0] + self.spacing[0] * (e[0] + i as i32) as f64,
            self.origin[1] + self.spacing[1] * (e[2] + j as i32) as f64,
            self.origin[2] + self.spacing[2] * (e[4] + k as i32) as f64,
        ]
    }
}

/// Rectilinear grid: per-axis coordinate arrays over an extent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RectilinearGrid {
    /// Index extent; coordinate arrays are indexed relative to it.
    pub extent: Extent,
    /// X coordinates, one per point along the x axis.
    pub x: Vec<f64>,
    /// Y coordinates.
    pub y: Vec<f64>,
    /// Z coordinates.
    pub z: Vec<f64>,
    /// Per-point attributes.
    pub point_data: AttributeSet,
    /// Per-cell attributes.
    pub cell_data: AttributeSet,
    /// Dataset-level attributes.
    pub field_data: AttributeSet,
}

impl RectilinearGrid {
    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.extent.num_points()
    }

    /// Number of cells.
    pub fn num_cells(&self) -> usize {
        self.extent.num_cells()
    }

    /// Geometric bounds from the coordinate arrays.
    pub fn bounds(&self) -> BoundingBox {
        let mut b = BoundingBox::default();
        if !(self.x.is_empty() || self.y.is_empty() || self.z.is_empty()) {
            b.add_point([self.x[0], self.y[0], self.z[0]]);
            b.add_point([
                self.x[self.x.len() - 1],
                self.y[self.y.len() - 1],
                self.z[self.z.len() - 1],
            ]);
        }
        b
    }
}

impl StructuredPoints for RectilinearGrid {
    fn extent(&self) -> Extent {
        self.extent
    }
    fn point(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        [self.x[i], self.y[j], self.z[k]]
    }
}

/// Curvilinear grid: explicit points over an extent, row-major (x fastest).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuredGrid {
    /// Index extent.
    pub extent: Extent,
    /// Explicit point positions, `extent.num_points()` entries.
    pub points: Vec<[f64; 3]>,
    /// Per-point attributes.
    pub point_data: AttributeSet,
    /// Per-cell attributes.
    pub cell_data: AttributeSet,
    /// Dataset-level attributes.
    pub field_data: AttributeSet,
}

impl StructuredGrid {
    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of cells.
    pub fn num_cells(&self) -> usize {
        self.extent.num_cells()
    }

    /// Geometric bounds of the explicit points.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points)
    }
}

impl StructuredPoints for StructuredGrid {
    fn extent(&self) -> Extent {
        self.extent
    }
    fn point(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        let pd = self.extent.point_dims();
        self.points[i + j * pd[0] + k * pd[0] * pd[1]]
    }
}

/// Structured topology with explicit hexahedral cells, allowing holes and
/// cell reordering relative to the implicit structured layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplicitStructuredGrid {
    /// Index extent (cell-centered bookkeeping only).
    pub extent: Extent,
    /// Point positions.
    pub points: Vec<[f64; 3]>,
    /// Hexahedral cells, VTK corner ordering.
    pub cells: Vec<[usize; 8]>,
    /// Per-point attributes.
    pub point_data: AttributeSet,
    /// Per-cell attributes.
    pub cell_data: AttributeSet,
    /// Dataset-level attributes.
    pub field_data: AttributeSet,
}

impl ExplicitStructuredGrid {
    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of cells.
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Geometric bounds of the points.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points)
    }
}
