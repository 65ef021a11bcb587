//! Composite dataset trees and their output mirrors.
//!
//! Input trees are immutable; traversal produces `(path, flat index, leaf)`
//! tuples in a fixed pre-order, and the output tree is built separately,
//! keyed by the same paths. Flat indices number every node of the tree —
//! root first, then each child slot in order, recursing into composite
//! children — so all ranks walking structurally identical trees agree on
//! the numbering. That agreement is what the distributed leaf-presence
//! synchronization relies on.

use serde::{Deserialize, Serialize};

use crate::dataset::DataSet;
use crate::dataset::attributes::AttributeSet;
use crate::dataset::polydata::{MergeOffsets, PolyData};

/// What flavor of composite container the root is. Partitioned inputs get
/// partition-count synchronization; collections additionally get two-level
/// block coloring and assembly passthrough.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositeKind {
    /// Multiblock tree.
    MultiBlock,
    /// Single partitioned dataset (one multi-piece grouping).
    PartitionedDataSet,
    /// Collection of partitioned datasets.
    PartitionedCollection,
}

/// A node of an input composite tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Grouping of optional children, each a subtree or a leaf.
    MultiBlock {
        /// Child slots; `None` is an absent block.
        children: Vec<Option<TreeNode>>,
    },
    /// Partitioned grouping of optional leaf datasets.
    MultiPiece {
        /// Partition slots; `None` is an absent partition.
        partitions: Vec<Option<DataSet>>,
    },
    /// Leaf dataset.
    Leaf(DataSet),
}

/// An input composite tree plus root-level metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositeTree {
    /// Container flavor.
    pub kind: CompositeKind,
    /// Root node.
    pub root: TreeNode,
    /// Serialized structural assembly descriptor, if the input carries one.
    pub assembly: Option<String>,
}

/// Position of one leaf slot: the child-index path from the root and the
/// node's flat index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafSlot {
    /// Child indices from the root.
    pub path: Vec<usize>,
    /// Pre-order flat index.
    pub flat_index: u32,
}

impl TreeNode {
    fn subtree_slots(&self) -> u32 {
        match self {
            TreeNode::Leaf(_) => 1,
            TreeNode::MultiPiece { partitions } => 1 + partitions.len() as u32,
            TreeNode::MultiBlock { children } => {
                1 + children
                    .iter()
                    .map(|c| c.as_ref().map_or(1, |n| n.subtree_slots()))
                    .sum::<u32>()
            }
        }
    }

    /// Leaf slots in deterministic pre-order. Absent slots are included
    /// with `None` so callers see the full structural shape.
    pub fn leaf_slots(&self) -> Vec<(LeafSlot, Option<&DataSet>)> {
        let mut out = Vec::new();
        self.collect_slots(&mut Vec::new(), &mut 0, &mut out);
        out
    }

    fn collect_slots<'a>(
        &'a self,
        path: &mut Vec<usize>,
        next_index: &mut u32,
        out: &mut Vec<(LeafSlot, Option<&'a DataSet>)>,
    ) {
        let my_index = *next_index;
        *next_index += 1;
        match self {
            TreeNode::Leaf(ds) => {
                out.push((LeafSlot { path: path.clone(), flat_index: my_index }, Some(ds)));
            }
            TreeNode::MultiPiece { partitions } => {
                for (i, part) in partitions.iter().enumerate() {
                    path.push(i);
                    out.push((
                        LeafSlot { path: path.clone(), flat_index: *next_index },
                        part.as_ref(),
                    ));
                    *next_index += 1;
                    path.pop();
                }
            }
            TreeNode::MultiBlock { children } => {
                for (i, child) in children.iter().enumerate() {
                    path.push(i);
                    match child {
                        Some(node) => node.collect_slots(path, next_index, out),
                        None => {
                            out.push((
                                LeafSlot { path: path.clone(), flat_index: *next_index },
                                None,
                            ));
                            *next_index += 1;
                        }
                    }
                    path.pop();
                }
            }
        }
    }
}

impl CompositeTree {
    /// First non-null leaf dataset in pre-order, the representative for the
    /// attribute pre-check pass.
    pub fn first_dataset(&self) -> Option<&DataSet> {
        self.root
            .leaf_slots()
            .into_iter()
            .find_map(|(_, ds)| ds)
    }
}

/// A node of the output tree: same shape as the input, leaves replaced by
/// extracted surfaces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OutputNode {
    /// Grouping of optional children.
    MultiBlock {
        /// Child slots.
        children: Vec<Option<OutputNode>>,
    },
    /// Partitioned grouping of optional surfaces, with merge offsets once
    /// the grouping has been collapsed.
    MultiPiece {
        /// Partition slots.
        partitions: Vec<Option<PolyData>>,
        /// Per-partition element offsets recorded by the merge.
        offsets: Option<MergeOffsets>,
    },
    /// Extracted leaf surface.
    Leaf(PolyData),
}

/// Output composite tree mirroring the input topology.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputTree {
    /// Container flavor, copied from the input.
    pub kind: CompositeKind,
    /// Root node.
    pub root: OutputNode,
    /// Root-level attributes (block colors, assembly descriptor).
    pub field_data: AttributeSet,
}

impl OutputNode {
    fn mirror(node: &TreeNode) -> OutputNode {
        match node {
            TreeNode::Leaf(_) => OutputNode::MultiBlock { children: Vec::new() },
            TreeNode::MultiPiece { partitions } => OutputNode::MultiPiece {
                partitions: vec![None; partitions.len()],
                offsets: None,
            },
            TreeNode::MultiBlock { children } => OutputNode::MultiBlock {
                children: children
                    .iter()
                    .map(|c| match c {
                        Some(TreeNode::Leaf(_)) | None => None,
                        Some(node) => Some(OutputNode::mirror(node)),
                    })
                    .collect(),
            },
        }
    }

    fn subtree_slots(&self) -> u32 {
        match self {
            OutputNode::Leaf(_) => 1,
            OutputNode::MultiPiece { partitions, .. } => 1 + partitions.len() as u32,
            OutputNode::MultiBlock { children } => {
                1 + children
                    .iter()
                    .map(|c| c.as_ref().map_or(1, |n| n.subtree_slots()))
                    .sum::<u32>()
            }
        }
    }
}

impl OutputTree {
    /// Empty output tree with the same topology as `input`. Every leaf
    /// slot starts absent.
    pub fn mirror(input: &CompositeTree) -> OutputTree {
        let root = match &input.root {
            // A bare leaf at the root still yields a one-slot container so
            // the output is uniformly a tree.
            TreeNode::Leaf(_) => OutputNode::MultiBlock { children: vec![None] },
            node => OutputNode::mirror(node),
        };
        OutputTree {
            kind: input.kind,
            root,
            field_data: AttributeSet::new(),
        }
    }

    /// Install `pd` at the leaf slot addressed by `path`.
    ///
    /// Paths come from [`TreeNode::leaf_slots`]; a bare-leaf input root is
    /// addressed by the empty path.
    pub fn set_leaf(&mut self, path: &[usize], pd: PolyData) {
        let path = if path.is_empty() { &[0][..] } else { path };
        Self::set_in(&mut self.root, path, pd);
    }

    fn set_in(node: &mut OutputNode, path: &[usize], pd: PolyData) {
        match node {
            OutputNode::MultiPiece { partitions, .. } => {
                debug_assert_eq!(path.len(), 1);
                if path[0] >= partitions.len() {
                    partitions.resize(path[0] + 1, None);
                }
                partitions[path[0]] = Some(pd);
            }
            OutputNode::MultiBlock { children } => {
                let i = path[0];
                if i >= children.len() {
                    children.resize(i + 1, None);
                }
                if path.len() == 1 {
                    match &mut children[i] {
                        slot @ None => *slot = Some(OutputNode::Leaf(pd)),
                        Some(OutputNode::Leaf(existing)) => *existing = pd,
                        Some(inner) => Self::set_in(inner, &[0], pd),
                    }
                } else {
                    let child = children[i]
                        .get_or_insert_with(|| OutputNode::MultiBlock { children: Vec::new() });
                    Self::set_in(child, &path[1..], pd);
                }
            }
            OutputNode::Leaf(existing) => *existing = pd,
        }
    }

    /// Leaf slots of the *output* structure (which may have grown by
    /// partition padding) with their flat indices and presence.
    pub fn leaf_slots(&self) -> Vec<(LeafSlot, bool)> {
        let mut out = Vec::new();
        Self::collect_slots(&self.root, &mut Vec::new(), &mut 0, &mut out);
        out
    }

    fn collect_slots(
        node: &OutputNode,
        path: &mut Vec<usize>,
        next_index: &mut u32,
        out: &mut Vec<(LeafSlot, bool)>,
    ) {
        let my_index = *next_index;
        *next_index += 1;
        match node {
            OutputNode::Leaf(_) => {
                out.push((LeafSlot { path: path.clone(), flat_index: my_index }, true));
            }
            OutputNode::MultiPiece { partitions, .. } => {
                for (i, part) in partitions.iter().enumerate() {
                    path.push(i);
                    out.push((
                        LeafSlot { path: path.clone(), flat_index: *next_index },
                        part.is_some(),
                    ));
                    *next_index += 1;
                    path.pop();
                }
            }
            OutputNode::MultiBlock { children } => {
                for (i, child) in children.iter().enumerate() {
                    path.push(i);
                    match child {
                        Some(inner) => Self::collect_slots(inner, path, next_index, out),
                        None => {
                            out.push((
                                LeafSlot { path: path.clone(), flat_index: *next_index },
                                false,
                            ));
                            *next_index += 1;
                        }
                    }
                    path.pop();
                }
            }
        }
    }

    /// Mutable access to the surface at a leaf slot, if present.
    pub fn leaf_mut(&mut self, path: &[usize]) -> Option<&mut PolyData> {
        let path = if path.is_empty() { &[0][..] } else { path };
        Self::leaf_mut_in(&mut self.root, path)
    }

    fn leaf_mut_in<'a>(node: &'a mut OutputNode, path: &[usize]) -> Option<&'a mut PolyData> {
        match node {
            OutputNode::Leaf(pd) => Some(pd),
            OutputNode::MultiPiece { partitions, .. } => {
                partitions.get_mut(path.first().copied()?)?.as_mut()
            }
            OutputNode::MultiBlock { children } => {
                let child = children.get_mut(path.first().copied()?)?.as_mut()?;
                if path.len() == 1 {
                    match child {
                        OutputNode::Leaf(pd) => Some(pd),
                        _ => None,
                    }
                } else {
                    Self::leaf_mut_in(child, &path[1..])
                }
            }
        }
    }

    /// Apply `f` to every multi-piece grouping, in pre-order.
    pub fn for_each_multipiece_mut(
        &mut self,
        f: &mut impl FnMut(&mut Vec<Option<PolyData>>, &mut Option<MergeOffsets>),
    ) {
        Self::walk_multipieces(&mut self.root, f);
    }

    fn walk_multipieces(
        node: &mut OutputNode,
        f: &mut impl FnMut(&mut Vec<Option<PolyData>>, &mut Option<MergeOffsets>),
    ) {
        match node {
            OutputNode::MultiPiece { partitions, offsets } => f(partitions, offsets),
            OutputNode::MultiBlock { children } => {
                for child in children.iter_mut().flatten() {
                    Self::walk_multipieces(child, f);
                }
            }
            OutputNode::Leaf(_) => {}
        }
    }

    /// Apply `f` to every present leaf surface, in pre-order.
    pub fn for_each_leaf_mut(&mut self, f: &mut impl FnMut(&mut PolyData)) {
        Self::walk_leaves(&mut self.root, f);
    }

    fn walk_leaves(node: &mut OutputNode, f: &mut impl FnMut(&mut PolyData)) {
        match node {
            OutputNode::Leaf(pd) => f(pd),
            OutputNode::MultiPiece { partitions, .. } => {
                for pd in partitions.iter_mut().flatten() {
                    f(pd);
                }
            }
            OutputNode::MultiBlock { children } => {
                for child in children.iter_mut().flatten() {
                    Self::walk_leaves(child, f);
                }
            }
        }
    }

    /// Apply `f` to every present leaf surface under root child `i`. Used
    /// by two-level block coloring for collections.
    pub fn for_each_leaf_under_child_mut(&mut self, i: usize, f: &mut impl FnMut(&mut PolyData)) {
        if let OutputNode::MultiBlock { children } = &mut self.root
            && let Some(Some(child)) = children.get_mut(i)
        {
            Self::walk_leaves(child, f);
        }
    }

    /// Number of root children.
    pub fn num_root_children(&self) -> usize {
        match &self.root {
            OutputNode::MultiBlock { children } => children.len(),
            OutputNode::MultiPiece { partitions, .. } => partitions.len(),
            OutputNode::Leaf(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataSet;
    use crate::dataset::polydata::PolyData;

    fn leaf() -> DataSet {
        DataSet::Poly(PolyData::new())
    }

    #[test]
    fn flat_indices_are_preorder() {
        // root(0) -> [leaf(1), mb(2) -> [leaf(3), None(4)], leaf(5)]
        let tree = TreeNode::MultiBlock {
            children: vec![
                Some(TreeNode::Leaf(leaf())),
                Some(TreeNode::MultiBlock {
                    children: vec![Some(TreeNode::Leaf(leaf())), None],
                }),
                Some(TreeNode::Leaf(leaf())),
            ],
        };
        let slots = tree.leaf_slots();
        let indices: Vec<u32> = slots.iter().map(|(s, _)| s.flat_index).collect();
        assert_eq!(indices, vec![1, 3, 4, 5]);
        assert!(slots[2].1.is_none());
        assert_eq!(slots[1].0.path, vec![1, 0]);
    }

    #[test]
    fn mirror_and_set_leaf_round_trip() {
        let input = CompositeTree {
            kind: CompositeKind::MultiBlock,
            root: TreeNode::MultiBlock {
                children: vec![
                    Some(TreeNode::Leaf(leaf())),
                    Some(TreeNode::MultiPiece { partitions: vec![None, Some(leaf())] }),
                ],
            },
            assembly: None,
        };
        let mut out = OutputTree::mirror(&input);
        let mut pd = PolyData::new();
        pd.points.push([1.0, 2.0, 3.0]);
        out.set_leaf(&[1, 1], pd);
        assert!(out.leaf_mut(&[1, 1]).is_some());
        assert!(out.leaf_mut(&[1, 0]).is_none());
        assert!(out.leaf_mut(&[0]).is_none());
        // Output slots line up with input slots before any padding.
        let islots = input.root.leaf_slots();
        let oslots = out.leaf_slots();
        assert_eq!(islots.len(), oslots.len());
        for (a, b) in islots.iter().zip(&oslots) {
            assert_eq!(a.0.flat_index, b.0.flat_index);
        }
    }
}
