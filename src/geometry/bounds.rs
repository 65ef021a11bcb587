//! Axis-aligned bounding boxes and structured index extents.
//!
//! `BoundingBox` is the value reduced across ranks for outline generation;
//! `Extent` carries the `[xmin,xmax,ymin,ymax,zmin,zmax]` index range a
//! structured dataset occupies, together with the whole-extent validation
//! rule used by the structured converters.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
///
/// # Invariants
///
/// A default-constructed box is *inverted* (`min > max` on every axis) so
/// that `add_point`/`union` work without a sentinel flag. An inverted box
/// reports `is_valid() == false` and is the canonical "degenerate bounds"
/// value of the error taxonomy: converters receiving one produce an empty
/// mesh rather than an error.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: [f64; 3],
    /// Maximum corner.
    pub max: [f64; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }
}

impl BoundingBox {
    /// Build from VTK-ordered bounds `[xmin,xmax,ymin,ymax,zmin,zmax]`.
    pub fn from_bounds(b: [f64; 6]) -> Self {
        Self {
            min: [b[0], b[2], b[4]],
            max: [b[1], b[3], b[5]],
        }
    }

    /// Bounds in VTK order `[xmin,xmax,ymin,ymax,zmin,zmax]`.
    pub fn as_bounds(&self) -> [f64; 6] {
        [
            self.min[0], self.max[0], self.min[1], self.max[1], self.min[2], self.max[2],
        ]
    }

    /// True when `min <= max` on all three axes.
    pub fn is_valid(&self) -> bool {
        (0..3).all(|a| self.min[a] <= self.max[a])
    }

    /// Grow to contain `p`.
    pub fn add_point(&mut self, p: [f64; 3]) {
        for a in 0..3 {
            self.min[a] = self.min[a].min(p[a]);
            self.max[a] = self.max[a].max(p[a]);
        }
    }

    /// Grow to contain `other`. Inverted inputs are no-ops.
    pub fn union(&mut self, other: &BoundingBox) {
        if other.is_valid() {
            self.add_point(other.min);
            self.add_point(other.max);
        }
    }

    /// Box containing all of `points`; inverted if `points` is empty.
    pub fn from_points(points: &[[f64; 3]]) -> Self {
        let mut b = Self::default();
        for &p in points {
            b.add_point(p);
        }
        b
    }
}

/// Structured index extent `[xmin,xmax,ymin,ymax,zmin,zmax]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent(pub [i32; 6]);

impl Extent {
    /// Valid iff `min <= max` on all three axes.
    pub fn is_valid(&self) -> bool {
        let e = self.0;
        e[0] <= e[1] && e[2] <= e[3] && e[4] <= e[5]
    }

    /// Number of points along each axis (zero for an invalid extent).
    pub fn point_dims(&self) -> [usize; 3] {
        if !self.is_valid() {
            return [0; 3];
        }
        let e = self.0;
        [
            (e[1] - e[0] + 1) as usize,
            (e[3] - e[2] + 1) as usize,
            (e[5] - e[4] + 1) as usize,
        ]
    }

    /// Number of cells along each axis. A flat axis (one point) counts as
    /// one cell layer so that lower-dimensional grids keep a cell id space.
    pub fn cell_dims(&self) -> [usize; 3] {
        let pd = self.point_dims();
        [pd[0].max(2) - 1, pd[1].max(2) - 1, pd[2].max(2) - 1]
    }

    /// Total number of points.
    pub fn num_points(&self) -> usize {
        let pd = self.point_dims();
        pd[0] * pd[1] * pd[2]
    }

    /// Total number of cells.
    pub fn num_cells(&self) -> usize {
        if self.num_points() == 0 {
            return 0;
        }
        let cd = self.cell_dims();
        cd[0] * cd[1] * cd[2]
    }
}

/// Pick the effective extent for a structured conversion: the externally
/// supplied whole extent when it is non-degenerate, otherwise the dataset's
/// own extent.
pub fn valid_whole_extent(whole: Option<Extent>, fallback: Extent) -> Extent {
    match whole {
        Some(w) if w.is_valid() => w,
        _ => fallback,
    }
}
