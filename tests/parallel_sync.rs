//! Multi-rank synchronization behaviors, exercised with in-process
//! thread-backed communicator worlds.

use std::sync::Arc;
use std::thread;

use serial_test::serial;
use surface_sieve::prelude::*;

fn tri(x: f64) -> DataSet {
    let mut pd = PolyData::new();
    pd.points = vec![[x, 0.0, 0.0], [x + 1.0, 0.0, 0.0], [x, 1.0, 0.0]];
    pd.polys.push(&[0, 1, 2]);
    DataSet::Poly(pd)
}

fn run_world<T: Send + 'static>(
    size: usize,
    f: impl Fn(ThreadComm) -> T + Send + Sync + 'static,
) -> Vec<T> {
    let f = Arc::new(f);
    let handles: Vec<_> = ThreadComm::world(size)
        .into_iter()
        .map(|comm| {
            let f = Arc::clone(&f);
            thread::spawn(move || f(comm))
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn surface_extractor(comm: ThreadComm) -> GeometryExtractor {
    let mut ex = GeometryExtractor::with_comm(Arc::new(comm));
    ex.options.use_outline = false;
    ex
}

#[test]
#[serial]
fn leaf_presence_syncs_with_placeholders() {
    // Six sibling slots; rank 0 fills slot 4, rank 1 fills slot 0.
    let results = run_world(2, |comm| {
        let rank = comm.rank();
        let mut children: Vec<Option<TreeNode>> = vec![None; 6];
        let filled = if rank == 0 { 4 } else { 0 };
        children[filled] = Some(TreeNode::Leaf(tri(rank as f64 * 10.0)));
        let input = DataObject::Composite(CompositeTree {
            kind: CompositeKind::MultiBlock,
            root: TreeNode::MultiBlock { children },
            assembly: None,
        });
        let ex = surface_extractor(comm);
        let ExtractOutput::Tree(out) = ex.extract(&input, None).unwrap() else {
            panic!("expected a tree");
        };
        out
    });
    for (rank, mut out) in results.into_iter().enumerate() {
        let present: Vec<bool> = out.leaf_slots().iter().map(|(_, p)| *p).collect();
        assert_eq!(present, vec![true, false, false, false, true, false], "rank {rank}");
        // The remote slot is an empty placeholder carrying its flat index.
        let remote = if rank == 0 { (0usize, 1u32) } else { (4usize, 5u32) };
        let pd = out.leaf_mut(&[remote.0]).unwrap();
        assert_eq!(pd.num_points(), 0);
        assert_eq!(
            pd.field_data
                .get(names::COMPOSITE_INDEX)
                .and_then(|a| a.as_u32()),
            Some(&[remote.1][..])
        );
    }
}

#[test]
#[serial]
fn partition_counts_pad_to_the_global_maximum() {
    let results = run_world(2, |comm| {
        let rank = comm.rank();
        let partitions = if rank == 0 {
            vec![Some(tri(0.0))]
        } else {
            vec![Some(tri(10.0)), Some(tri(20.0)), Some(tri(30.0))]
        };
        let input = DataObject::Composite(CompositeTree {
            kind: CompositeKind::PartitionedDataSet,
            root: TreeNode::MultiPiece { partitions },
            assembly: None,
        });
        let ex = surface_extractor(comm);
        let ExtractOutput::Tree(out) = ex.extract(&input, None).unwrap() else {
            panic!("expected a tree");
        };
        out
    });
    for out in results {
        let OutputNode::MultiPiece { offsets, .. } = &out.root else {
            panic!("expected a multi-piece root");
        };
        // Offsets span the padded slot count on every rank.
        assert_eq!(offsets.as_ref().unwrap().points.len(), 3);
    }
}

#[test]
#[serial]
fn cell_normals_skip_unanimously() {
    // Rank 1's piece carries a line, so *both* ranks must skip normals.
    let results = run_world(2, |comm| {
        let rank = comm.rank();
        let mut pd = PolyData::new();
        pd.points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        pd.polys.push(&[0, 1, 2]);
        if rank == 1 {
            pd.lines.push(&[0, 1]);
        }
        let mut ex = surface_extractor(comm);
        ex.options.generate_cell_normals = true;
        let input = DataObject::DataSet(DataSet::Poly(pd));
        let ExtractOutput::Surface(out) = ex.extract(&input, None).unwrap() else {
            panic!("expected a surface");
        };
        out
    });
    for out in results {
        assert!(out.cell_data.get(names::CELL_NORMALS).is_none());
    }
}

#[test]
#[serial]
fn cell_normals_appear_when_all_ranks_are_polygonal() {
    let results = run_world(2, |comm| {
        let mut ex = surface_extractor(comm);
        ex.options.generate_cell_normals = true;
        let input = DataObject::DataSet(tri(0.0));
        let ExtractOutput::Surface(out) = ex.extract(&input, None).unwrap() else {
            panic!("expected a surface");
        };
        out
    });
    for out in results {
        let normals = out.cell_data.get(names::CELL_NORMALS).unwrap();
        assert_eq!(normals.len(), 1);
        assert_eq!(out.cell_data.active_normals(), Some(names::CELL_NORMALS));
    }
}

#[test]
#[serial]
fn cell_normals_on_trees_stay_local_per_leaf() {
    // Ranks own different numbers of leaves. Per-leaf cleanup must not
    // issue collectives, or the two ranks' reductions would mispair; the
    // walk has to finish and still decorate every owned leaf locally.
    let results = run_world(2, |comm| {
        let rank = comm.rank();
        let mut children: Vec<Option<TreeNode>> = vec![None; 3];
        if rank == 0 {
            children[0] = Some(TreeNode::Leaf(tri(0.0)));
        } else {
            children[1] = Some(TreeNode::Leaf(tri(5.0)));
            children[2] = Some(TreeNode::Leaf(tri(10.0)));
        }
        let input = DataObject::Composite(CompositeTree {
            kind: CompositeKind::MultiBlock,
            root: TreeNode::MultiBlock { children },
            assembly: None,
        });
        let mut ex = surface_extractor(comm);
        ex.options.generate_cell_normals = true;
        let ExtractOutput::Tree(out) = ex.extract(&input, None).unwrap() else {
            panic!("expected a tree");
        };
        (rank, out)
    });
    for (rank, mut out) in results {
        let owned: &[usize] = if rank == 0 { &[0] } else { &[1, 2] };
        for &slot in owned {
            let pd = out.leaf_mut(&[slot]).unwrap();
            assert!(
                pd.cell_data.get(names::CELL_NORMALS).is_some(),
                "rank {rank} slot {slot}"
            );
        }
    }
}

#[test]
#[serial]
fn outline_reduces_bounds_to_rank_zero() {
    let results = run_world(2, |comm| {
        let rank = comm.rank();
        let mut g = UnstructuredGrid::new();
        let x0 = rank as f64 * 5.0;
        g.points = vec![
            [x0, 0.0, 0.0],
            [x0 + 1.0, 0.0, 0.0],
            [x0, 1.0, 0.0],
            [x0, 0.0, 1.0],
        ];
        g.push_cell(CellShape::Tetra, &[0, 1, 2, 3]);
        let ex = GeometryExtractor::with_comm(Arc::new(comm)); // outline mode
        let input = DataObject::DataSet(DataSet::Unstructured(g));
        let ExtractOutput::Surface(out) = ex.extract(&input, None).unwrap() else {
            panic!("expected a surface");
        };
        (rank, out)
    });
    for (rank, out) in results {
        if rank == 0 {
            assert_eq!(out.lines.len(), 12);
            // Global bounds span both ranks' tetrahedra.
            assert_eq!(out.bounds().as_bounds()[1], 6.0);
        } else {
            assert_eq!(out.num_points(), 0);
        }
    }
}

#[test]
#[serial]
fn process_ids_default_on_for_multi_rank_worlds() {
    let results = run_world(2, |comm| {
        let rank = comm.rank();
        let ex = surface_extractor(comm);
        let input = DataObject::DataSet(tri(rank as f64));
        let ExtractOutput::Surface(out) = ex.extract(&input, None).unwrap() else {
            panic!("expected a surface");
        };
        (rank, out)
    });
    for (rank, out) in results {
        let ids = out
            .point_data
            .get(names::PROCESS_ID)
            .and_then(|a| a.as_u32())
            .unwrap();
        assert!(ids.iter().all(|&r| r as usize == rank));
    }
}

#[test]
#[serial]
fn amr_global_bounds_agree_across_ranks() {
    // Each rank only knows its own block's metadata; hiding still works
    // because the global bounds are reduced collectively.
    let results = run_world(2, |comm| {
        let rank = comm.rank();
        let x0 = rank as f64;
        let block = AmrBlock {
            bounds: BoundingBox::from_bounds([x0, x0 + 1.0, 0.0, 1.0, 0.0, 1.0]),
            data: None,
        };
        let amr = AmrHierarchy {
            levels: vec![AmrLevel { spacing: [0.5; 3], blocks: vec![block] }],
            overlapping: true,
            field_data: AttributeSet::new(),
        };
        let ex = GeometryExtractor::with_comm(Arc::new(comm));
        let input = DataObject::Amr(amr);
        let ExtractOutput::Surface(out) = ex.extract(&input, None).unwrap() else {
            panic!("expected a surface");
        };
        out
    });
    for out in results {
        // Each rank emits its one block with the shared face hidden.
        assert_eq!(out.polys.len(), 5);
    }
}
