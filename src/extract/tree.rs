//! Composite tree walker: converts every leaf of a composite input into a
//! surface piece and assembles the mirrored output tree, keeping the
//! structural bookkeeping (flat indices, partition counts, leaf presence)
//! identical across ranks.
//!
//! Collective steps run in a fixed order on every rank: partition-count
//! padding, multi-piece merging, then leaf-presence synchronization. Each
//! step leaves all ranks with structurally identical trees, which is what
//! lets the next step use element-wise reductions.

use crate::comm::ReduceOp;
use crate::dataset::attributes::AttributeArray;
use crate::dataset::composite::{CompositeKind, CompositeTree, OutputTree};
use crate::dataset::names;
use crate::dataset::polydata::{PolyData, append_pieces};
use crate::error::SurfaceSieveError;
use crate::extract::block::execute_block;
use crate::extract::context::ExtractionContext;
use crate::extract::decorate::{add_block_colors, add_composite_index, cleanup_output_data};

/// Walk a composite input and produce the mirrored output tree.
///
/// # Errors
/// `MalformedAttributes` when the representative leaf fails the attribute
/// pre-check. Unsupported leaves inside the tree are skipped with a
/// warning rather than failing the whole walk.
pub fn execute_tree(
    input: &CompositeTree,
    ctx: &ExtractionContext<'_>,
) -> Result<OutputTree, SurfaceSieveError> {
    if let Some(first) = input.first_dataset() {
        first.check_attributes()?;
    }

    let mut out = OutputTree::mirror(input);
    let slots = input.root.leaf_slots();
    let total = slots.len().max(1);
    for (i, (slot, leaf)) in slots.into_iter().enumerate() {
        if ctx.is_aborted() {
            break;
        }
        let Some(ds) = leaf else {
            continue;
        };
        let mut piece = match execute_block(ds, ctx, None, false) {
            Ok(piece) => piece,
            Err(SurfaceSieveError::UnsupportedDataSet(kind)) => {
                log::warn!("skipping unsupported {kind} leaf at flat index {}", slot.flat_index);
                continue;
            }
            Err(e) => return Err(e),
        };
        piece.field_data.pass_from(ds.field_data());
        // Per-leaf cleanup must not communicate: ranks own different
        // leaves, so per-leaf collectives would mispair.
        cleanup_output_data(&mut piece, ctx, false);
        // Fully empty conversions are discarded; presence sync will
        // restore a placeholder if another rank produced geometry there.
        if piece.num_points() == 0 {
            ctx.update_progress((i + 1) as f64 / total as f64);
            continue;
        }
        add_composite_index(&mut piece, slot.flat_index);
        out.set_leaf(&slot.path, piece);
        ctx.update_progress((i + 1) as f64 / total as f64);
    }

    let partitioned = matches!(
        input.kind,
        CompositeKind::PartitionedDataSet | CompositeKind::PartitionedCollection
    );
    if partitioned {
        sync_partition_counts(&mut out, ctx);
    }
    merge_multipieces(&mut out);
    sync_leaf_presence(&mut out, ctx);

    if ctx.options.block_colors_distinct_values > 0 {
        assign_block_colors(&mut out, ctx);
    }
    if let Some(assembly) = &input.assembly {
        out.field_data.add(
            names::DATA_ASSEMBLY,
            AttributeArray::Str(vec![assembly.clone()]),
        );
    }
    Ok(out)
}

/// Pad every multi-piece grouping to the maximum partition count any rank
/// holds, so the groupings (and therefore the flat indexing) agree before
/// merging. Groupings are visited in pre-order on all ranks.
fn sync_partition_counts(out: &mut OutputTree, ctx: &ExtractionContext<'_>) {
    let mut counts: Vec<u32> = Vec::new();
    out.for_each_multipiece_mut(&mut |partitions, _| {
        counts.push(partitions.len() as u32);
    });
    if counts.is_empty() {
        return;
    }
    let global = ctx.comm.all_reduce_u32(&counts, ReduceOp::Max);
    let mut i = 0usize;
    out.for_each_multipiece_mut(&mut |partitions, _| {
        if let Some(&n) = global.get(i)
            && partitions.len() < n as usize
        {
            partitions.resize(n as usize, None);
        }
        i += 1;
    });
}

/// Collapse each multi-piece grouping to a single merged piece, recording
/// per-slot offsets across all five primitive streams. Absent slots keep a
/// zero-length entry in the offsets so slot numbering survives the merge.
fn merge_multipieces(out: &mut OutputTree) {
    out.for_each_multipiece_mut(&mut |partitions, offsets| {
        if partitions.is_empty() {
            return;
        }
        let mut pieces: Vec<&PolyData> = Vec::new();
        let slot_map: Vec<Option<usize>> = partitions
            .iter()
            .map(|p| {
                p.as_ref().map(|pd| {
                    pieces.push(pd);
                    pieces.len() - 1
                })
            })
            .collect();
        let (merged, merge_offsets) = append_pieces(&pieces, &slot_map);
        *offsets = Some(merge_offsets);
        *partitions = vec![Some(merged)];
    });
}

/// Make leaf presence agree across ranks: a slot any rank filled becomes
/// present everywhere, absent ranks holding an empty placeholder tagged
/// with the slot's flat index. Consumers see the same tree shape on every
/// rank.
fn sync_leaf_presence(out: &mut OutputTree, ctx: &ExtractionContext<'_>) {
    if ctx.comm.size() <= 1 {
        return;
    }
    let slots = out.leaf_slots();
    if slots.is_empty() {
        return;
    }
    let bits: Vec<u32> = slots.iter().map(|(_, present)| *present as u32).collect();
    let global = ctx.comm.all_reduce_u32(&bits, ReduceOp::Max);
    for ((slot, present), anywhere) in slots.into_iter().zip(global) {
        if anywhere == 1 && !present {
            let mut placeholder = PolyData::new();
            placeholder.field_data.add(
                names::COMPOSITE_INDEX,
                AttributeArray::UInt32(vec![slot.flat_index]),
            );
            out.set_leaf(&slot.path, placeholder);
        }
    }
}

/// Palette-cycled block colors. Collections color per top-level group so
/// all partitions of one partitioned dataset share a color; other inputs
/// color per leaf slot, counting absent slots so the cycle is stable under
/// missing blocks.
fn assign_block_colors(out: &mut OutputTree, ctx: &ExtractionContext<'_>) {
    let distinct = ctx.options.block_colors_distinct_values;
    let mut any = false;
    if out.kind == CompositeKind::PartitionedCollection {
        for i in 0..out.num_root_children() {
            let color = i as u32 % distinct;
            out.for_each_leaf_under_child_mut(i, &mut |pd| {
                add_block_colors(pd, color);
                any = true;
            });
        }
    } else {
        let slots = out.leaf_slots();
        for (ordinal, (slot, present)) in slots.into_iter().enumerate() {
            if !present {
                continue;
            }
            if let Some(pd) = out.leaf_mut(&slot.path) {
                add_block_colors(pd, ordinal as u32 % distinct);
                any = true;
            }
        }
    }
    if any {
        out.field_data
            .add(names::BLOCK_COLORS, AttributeArray::UInt32(vec![0]));
    }
}
