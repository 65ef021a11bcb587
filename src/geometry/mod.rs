//! Geometric primitives shared across the extraction pipeline.
//!
//! Axis-aligned bounding boxes, structured index extents, and polygon
//! normal helpers used by the outline and surface extractors.

pub mod bounds;
pub mod normals;

pub use bounds::{BoundingBox, Extent, valid_whole_extent};
