//! AMR hierarchies: levels of axis-aligned uniform blocks at increasing
//! refinement, with metadata bounds that let outline generation avoid
//! touching heavy data.

use serde::{Deserialize, Serialize};

use crate::dataset::attributes::AttributeSet;
use crate::dataset::structured::ImageGrid;
use crate::geometry::BoundingBox;

/// One block of one AMR level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmrBlock {
    /// Metadata bounds, valid even when `data` is absent on this rank.
    pub bounds: BoundingBox,
    /// Heavy data, present only on the owning rank.
    pub data: Option<ImageGrid>,
}

/// One refinement level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmrLevel {
    /// Grid spacing shared by every block of this level.
    pub spacing: [f64; 3],
    /// Blocks, in index order.
    pub blocks: Vec<AmrBlock>,
}

/// An AMR hierarchy.
///
/// `overlapping` distinguishes hierarchies whose metadata (bounds, spacing)
/// is trustworthy without heavy data from those where only realized blocks
/// know their geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmrHierarchy {
    /// Levels, coarsest first.
    pub levels: Vec<AmrLevel>,
    /// True when per-block metadata describes geometry reliably.
    pub overlapping: bool,
    /// Dataset-level attributes.
    pub field_data: AttributeSet,
}

impl AmrHierarchy {
    /// Total block count across all levels.
    pub fn total_blocks(&self) -> usize {
        self.levels.iter().map(|l| l.blocks.len()).sum()
    }

    /// Union of all block bounds known to this rank (metadata preferred,
    /// realized data as fallback). May be partial in a distributed setting;
    /// the AMR walker all-reduces it.
    pub fn bounds(&self) -> BoundingBox {
        let mut b = BoundingBox::default();
        for level in &self.levels {
            for block in &level.blocks {
                if block.bounds.is_valid() {
                    b.union(&block.bounds);
                } else if let Some(data) = &block.data {
                    b.union(&data.bounds());
                }
            }
        }
        b
    }

    /// Composite index of block `(level, index)`: root is 0, blocks are
    /// enumerated level-major starting at 1. Identical on every rank.
    pub fn composite_index(&self, level: usize, index: usize) -> u32 {
        let before: usize = self.levels[..level].iter().map(|l| l.blocks.len()).sum();
        (1 + before + index) as u32
    }
}
