//! Property tests for merging, triangulation, and outline generation.

use proptest::prelude::*;
use surface_sieve::extract::outline::outline_box;
use surface_sieve::extract::surface::triangulate_polys;
use surface_sieve::prelude::*;
use surface_sieve::dataset::polydata::append_pieces;

fn piece_strategy() -> impl Strategy<Value = PolyData> {
    (3usize..12).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(0..n, 3..6), 0..5).prop_map(move |cells| {
            let mut pd = PolyData::new();
            for i in 0..n {
                pd.points.push([i as f64, (i * i) as f64, 0.0]);
            }
            for cell in &cells {
                pd.polys.push(cell);
            }
            pd
        })
    })
}

proptest! {
    #[test]
    fn merged_totals_and_offsets_are_consistent(
        pieces in prop::collection::vec(piece_strategy(), 1..5),
    ) {
        let refs: Vec<&PolyData> = pieces.iter().collect();
        let slot_map: Vec<Option<usize>> = (0..refs.len()).map(Some).collect();
        let (merged, offsets) = append_pieces(&refs, &slot_map);

        let total_points: usize = pieces.iter().map(|p| p.num_points()).sum();
        let total_cells: usize = pieces.iter().map(|p| p.num_cells()).sum();
        prop_assert_eq!(merged.num_points(), total_points);
        prop_assert_eq!(merged.num_cells(), total_cells);

        prop_assert_eq!(offsets.points.len(), refs.len());
        prop_assert!(offsets.points.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(offsets.polys.windows(2).all(|w| w[0] <= w[1]));

        // Every merged cell references a point of the merged mesh.
        for cell in merged.polys.iter() {
            prop_assert!(cell.iter().all(|&p| p < merged.num_points()));
        }
    }

    #[test]
    fn triangulation_fans_every_polygon(pd in piece_strategy()) {
        let tri = triangulate_polys(&pd);
        let expect: usize = pd.polys.iter().map(|c| c.len() - 2).sum();
        prop_assert_eq!(tri.polys.len(), expect);
        prop_assert!(tri.polys.iter().all(|c| c.len() == 3));
        prop_assert_eq!(tri.points, pd.points);
    }

    #[test]
    fn outline_corners_lie_on_the_box(
        origin in prop::array::uniform3(-100.0f64..100.0),
        size in prop::array::uniform3(0.01f64..50.0),
    ) {
        let b = BoundingBox {
            min: origin,
            max: [origin[0] + size[0], origin[1] + size[1], origin[2] + size[2]],
        };
        let out = outline_box(&b);
        prop_assert_eq!(out.num_points(), 8);
        prop_assert_eq!(out.lines.len(), 12);
        for p in &out.points {
            for a in 0..3 {
                prop_assert!(b.min[a] <= p[a] && p[a] <= b.max[a]);
            }
        }
    }

    #[test]
    fn image_surface_covers_every_exterior_cell(
        dims in prop::array::uniform3(1i32..5),
    ) {
        let mut ex = GeometryExtractor::new();
        ex.options.use_outline = false;
        let [nx, ny, nz] = dims;
        let img = ImageGrid::new(Extent([0, nx, 0, ny, 0, nz]), [0.0; 3], [1.0; 3]);
        let input = DataObject::DataSet(DataSet::Image(img));
        let ExtractOutput::Surface(out) = ex.extract(&input, None).unwrap() else {
            panic!("expected a surface");
        };
        let expect = 2 * (nx * ny + ny * nz + nz * nx) as usize;
        prop_assert_eq!(out.polys.len(), expect);
    }
}
