//! Dataset data model: the polymorphic input kinds the extraction pipeline
//! consumes and the polygonal output it produces.
//!
//! The dynamic-kind dispatch of the original dataset hierarchy is expressed
//! as the closed [`DataSet`] enum; the block converter matches on it. The
//! top-level [`DataObject`] additionally distinguishes composite trees and
//! AMR hierarchies, which route to dedicated walkers.

pub mod amr;
pub mod attributes;
pub mod composite;
pub mod htg;
pub mod polydata;
pub mod structured;
pub mod unstructured;

use serde::{Deserialize, Serialize};

use crate::error::SurfaceSieveError;
use crate::geometry::BoundingBox;

use amr::AmrHierarchy;
use attributes::AttributeSet;
use composite::CompositeTree;
use htg::{CellGrid, GenericDataset, HyperTreeGrid};
use polydata::PolyData;
use structured::{ExplicitStructuredGrid, ImageGrid, RectilinearGrid, StructuredGrid};
use unstructured::UnstructuredGrid;

/// Well-known attribute array names.
pub mod names {
    /// Original cell id provenance array.
    pub const ORIGINAL_CELL_IDS: &str = "vtkOriginalCellIds";
    /// Original point id provenance array.
    pub const ORIGINAL_POINT_IDS: &str = "vtkOriginalPointIds";
    /// Internal original-face-id array consumed by wireframe recovery and
    /// removed from final output.
    pub const ORIGINAL_FACE_IDS: &str = "RecoverWireframeOriginalFaceIds";
    /// Flat composite index of the producing leaf.
    pub const COMPOSITE_INDEX: &str = "vtkCompositeIndex";
    /// Palette-cycled block color ordinal.
    pub const BLOCK_COLORS: &str = "vtkBlockColors";
    /// AMR refinement level of the producing block.
    pub const AMR_LEVEL: &str = "vtkAMRLevel";
    /// Index of the producing block within its AMR level.
    pub const AMR_INDEX: &str = "vtkAMRIndex";
    /// Producing process rank.
    pub const PROCESS_ID: &str = "vtkProcessId";
    /// Per-polygon geometric normals.
    pub const CELL_NORMALS: &str = "cellNormals";
    /// Ghost element flags.
    pub const GHOST_TYPE: &str = "vtkGhostType";
    /// Serialized structural assembly descriptor.
    pub const DATA_ASSEMBLY: &str = "vtkDataAssembly";
    /// Per-polygon edge-visibility bitmask written by wireframe recovery.
    pub const EDGE_FLAGS: &str = "vtkEdgeFlags";
}

/// A leaf dataset: every non-composite kind the block converter handles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DataSet {
    /// Uniform grid.
    Image(ImageGrid),
    /// Rectilinear grid.
    Rectilinear(RectilinearGrid),
    /// Curvilinear grid.
    Structured(StructuredGrid),
    /// Structured topology with explicit hexahedral cells.
    ExplicitStructured(ExplicitStructuredGrid),
    /// Unstructured grid.
    Unstructured(UnstructuredGrid),
    /// Polygonal mesh.
    Poly(PolyData),
    /// Hyper-tree grid.
    HyperTree(HyperTreeGrid),
    /// Cell grid (bounding outline only).
    CellGrid(CellGrid),
    /// Generic dataset adapter.
    Generic(GenericDataset),
}

impl DataSet {
    /// Stable kind name, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            DataSet::Image(_) => "image",
            DataSet::Rectilinear(_) => "rectilinear",
            DataSet::Structured(_) => "structured",
            DataSet::ExplicitStructured(_) => "explicit-structured",
            DataSet::Unstructured(_) => "unstructured",
            DataSet::Poly(_) => "polydata",
            DataSet::HyperTree(_) => "hyper-tree-grid",
            DataSet::CellGrid(_) => "cell-grid",
            DataSet::Generic(_) => "generic",
        }
    }

    /// Number of points.
    pub fn num_points(&self) -> usize {
        match self {
            DataSet::Image(g) => g.num_points(),
            DataSet::Rectilinear(g) => g.num_points(),
            DataSet::Structured(g) => g.num_points(),
            DataSet::ExplicitStructured(g) => g.num_points(),
            DataSet::Unstructured(g) => g.num_points(),
            DataSet::Poly(p) => p.num_points(),
            DataSet::HyperTree(_) | DataSet::CellGrid(_) => 0,
            DataSet::Generic(g) => g.num_points,
        }
    }

    /// Number of cells.
    pub fn num_cells(&self) -> usize {
        match self {
            DataSet::Image(g) => g.num_cells(),
            DataSet::Rectilinear(g) => g.num_cells(),
            DataSet::Structured(g) => g.num_cells(),
            DataSet::ExplicitStructured(g) => g.num_cells(),
            DataSet::Unstructured(g) => g.num_cells(),
            DataSet::Poly(p) => p.num_cells(),
            DataSet::HyperTree(g) => g.num_cells(),
            DataSet::CellGrid(g) => g.num_cells,
            DataSet::Generic(g) => g.boundary.as_ref().map_or(0, |b| b.num_cells()),
        }
    }

    /// Geometric bounds (inverted when unknown/empty).
    pub fn bounds(&self) -> BoundingBox {
        match self {
            DataSet::Image(g) => g.bounds(),
            DataSet::Rectilinear(g) => g.bounds(),
            DataSet::Structured(g) => g.bounds(),
            DataSet::ExplicitStructured(g) => g.bounds(),
            DataSet::Unstructured(g) => g.bounds(),
            DataSet::Poly(p) => p.bounds(),
            DataSet::HyperTree(g) => g.bounds(),
            DataSet::CellGrid(g) => g.bbox,
            DataSet::Generic(g) => g.bbox,
        }
    }

    /// Dataset-level attributes.
    pub fn field_data(&self) -> &AttributeSet {
        match self {
            DataSet::Image(g) => &g.field_data,
            DataSet::Rectilinear(g) => &g.field_data,
            DataSet::Structured(g) => &g.field_data,
            DataSet::ExplicitStructured(g) => &g.field_data,
            DataSet::Unstructured(g) => &g.field_data,
            DataSet::Poly(p) => &p.field_data,
            DataSet::HyperTree(g) => &g.field_data,
            DataSet::CellGrid(g) => &g.field_data,
            DataSet::Generic(g) => &g.field_data,
        }
    }

    /// Structural attribute sanity check: every point/cell array must have
    /// one tuple per element. The cheap pre-check run before composite
    /// traversal.
    ///
    /// # Errors
    /// `MalformedAttributes` naming the first offending array.
    pub fn check_attributes(&self) -> Result<(), SurfaceSieveError> {
        let (point_data, cell_data): (Option<&AttributeSet>, Option<&AttributeSet>) = match self {
            DataSet::Image(g) => (Some(&g.point_data), Some(&g.cell_data)),
            DataSet::Rectilinear(g) => (Some(&g.point_data), Some(&g.cell_data)),
            DataSet::Structured(g) => (Some(&g.point_data), Some(&g.cell_data)),
            DataSet::ExplicitStructured(g) => (Some(&g.point_data), Some(&g.cell_data)),
            DataSet::Unstructured(g) => (Some(&g.point_data), Some(&g.cell_data)),
            DataSet::Poly(p) => (Some(&p.point_data), Some(&p.cell_data)),
            DataSet::HyperTree(g) => (None, Some(&g.cell_data)),
            DataSet::CellGrid(_) | DataSet::Generic(_) => (None, None),
        };
        if let Some(pd) = point_data {
            pd.check_lengths(self.num_points())?;
        }
        if let Some(cd) = cell_data {
            cd.check_lengths(self.num_cells())?;
        }
        Ok(())
    }
}

/// Top-level input: a leaf dataset, a composite tree, or an AMR hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DataObject {
    /// Non-composite dataset.
    DataSet(DataSet),
    /// Composite tree.
    Composite(CompositeTree),
    /// AMR hierarchy (flattened by extraction, never returned as a
    /// recursive tree).
    Amr(AmrHierarchy),
}
