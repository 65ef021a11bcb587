//! Hyper-tree grids and the two small leaf kinds that share this module:
//! cell grids (bounding outline only) and generic datasets (pre-tessellated
//! boundary adapter).

use serde::{Deserialize, Serialize};

use crate::dataset::attributes::AttributeSet;
use crate::dataset::polydata::PolyData;
use crate::geometry::BoundingBox;

/// One refinement tree rooted at a cell of the root lattice. Nodes are
/// stored breadth-first: node `i` refined means its 8 children are appended
/// to the node list in fixed octant order (x fastest).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HyperTree {
    /// Root cell position in the lattice.
    pub root: [usize; 3],
    /// Breadth-first refinement flags; `refined[i]` means node `i` has
    /// children. Leaves are nodes with `refined[i] == false` or beyond the
    /// recorded descriptor (implicitly unrefined).
    pub refined: Vec<bool>,
}

/// Hyper-tree grid: a lattice of root cells, each optionally refined by a
/// branch-factor-2 tree per axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HyperTreeGrid {
    /// Root cells per axis.
    pub dims: [usize; 3],
    /// Position of the lattice corner.
    pub origin: [f64; 3],
    /// Size of one root cell per axis.
    pub root_size: [f64; 3],
    /// Trees; lattice cells without a tree are empty space.
    pub trees: Vec<HyperTree>,
    /// Per-leaf-cell attributes, indexed in leaf enumeration order.
    pub cell_data: AttributeSet,
    /// Dataset-level attributes.
    pub field_data: AttributeSet,
}

impl HyperTreeGrid {
    /// Leaf boxes in deterministic order: trees in storage order, each
    /// tree's leaves breadth-first.
    pub fn leaves(&self) -> Vec<BoundingBox> {
        let mut out = Vec::new();
        for tree in &self.trees {
            let corner = [
                self.origin[0] + tree.root[0] as f64 * self.root_size[0],
                self.origin[1] + tree.root[1] as f64 * self.root_size[1],
                self.origin[2] + tree.root[2] as f64 * self.root_size[2],
            ];
            let root_box = BoundingBox {
                min: corner,
                max: [
                    corner[0] + self.root_size[0],
                    corner[1] + self.root_size[1],
                    corner[2] + self.root_size[2],
                ],
            };
            // Breadth-first walk mirroring the descriptor layout.
            let mut queue = vec![root_box];
            let mut node = 0usize;
            let mut cursor = 0usize;
            while cursor < queue.len() {
                let bbox = queue[cursor];
                cursor += 1;
                let refined = tree.refined.get(node).copied().unwrap_or(false);
                node += 1;
                if refined {
                    let mid = [
                        (bbox.min[0] + bbox.max[0]) * 0.5,
                        (bbox.min[1] + bbox.max[1]) * 0.5,
                        (bbox.min[2] + bbox.max[2]) * 0.5,
                    ];
                    for oct in 0..8usize {
                        let mut min = bbox.min;
                        let mut max = mid;
                        for a in 0..3 {
                            if oct >> a & 1 == 1 {
                                min[a] = mid[a];
                                max[a] = bbox.max[a];
                            }
                        }
                        queue.push(BoundingBox { min, max });
                    }
                } else {
                    out.push(bbox);
                }
            }
        }
        out
    }

    /// Number of leaf cells.
    pub fn num_cells(&self) -> usize {
        self.leaves().len()
    }

    /// Bounds of the full root lattice.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox {
            min: self.origin,
            max: [
                self.origin[0] + self.dims[0] as f64 * self.root_size[0],
                self.origin[1] + self.dims[1] as f64 * self.root_size[1],
                self.origin[2] + self.dims[2] as f64 * self.root_size[2],
            ],
        }
    }
}

/// Cell grid: an opaque dataset for which only a bounding outline is ever
/// produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellGrid {
    /// Geometric bounds.
    pub bbox: BoundingBox,
    /// Cell count, for reporting only.
    pub num_cells: usize,
    /// Dataset-level attributes.
    pub field_data: AttributeSet,
}

/// Generic dataset adapter: a dataset kind outside the closed structured /
/// unstructured families, exposed through a pre-tessellated polygonal
/// boundary. `boundary == None` marks a kind no tessellator was registered
/// for; surface extraction then fails (sole input) or skips (in a tree).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenericDataset {
    /// Geometric bounds.
    pub bbox: BoundingBox,
    /// Point count, used by the outline path's emptiness check.
    pub num_points: usize,
    /// Tessellated boundary surface, if available.
    pub boundary: Option<PolyData>,
    /// Dataset-level attributes.
    pub field_data: AttributeSet,
}
