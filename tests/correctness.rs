use cubegen::{
    cache::{whole_path, CacheReader, CubeSource},
    cube::canonicalize,
    gen::{gen, GenOptions, RESULTS},
    hashy::generate_shapes,
    point::Point,
};

fn plain() -> GenOptions {
    GenOptions::default()
}

#[test]
fn counts_match_reference_table() {
    for n in 1..=6 {
        let level = gen(n, 1, &plain()).unwrap();
        assert_eq!(level.num_cubes(), RESULTS[n - 1], "count mismatch at n = {n}");
    }
}

#[test]
fn counts_deterministic_across_threads() {
    let single = gen(5, 1, &plain()).unwrap();
    let multi = gen(5, 4, &plain()).unwrap();
    assert_eq!(single.num_cubes(), 29);
    assert_eq!(multi.num_cubes(), 29);

    // not just the count: the canonical sets per shape must coincide
    for shape in generate_shapes(5) {
        let mut a: Vec<Vec<Point>> = single
            .cubes_by_shape(shape)
            .iter()
            .map(|v| v.points().collect())
            .collect();
        let mut b: Vec<Vec<Point>> = multi
            .cubes_by_shape(shape)
            .iter()
            .map(|v| v.points().collect())
            .collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }
}

#[test]
fn straight_piece_is_alone_in_its_shape() {
    let level = gen(4, 1, &plain()).unwrap();
    let range = level.cubes_by_shape(Point::new(0, 0, 3));
    assert_eq!(range.len(), 1);
    let points: Vec<Point> = range.get(0).points().collect();
    assert_eq!(
        points,
        vec![
            Point::new(0, 0, 0),
            Point::new(0, 0, 1),
            Point::new(0, 0, 2),
            Point::new(0, 0, 3),
        ]
    );
}

#[test]
fn stored_cubes_are_canonical_and_consistent() {
    let level = gen(5, 1, &plain()).unwrap();
    let mut seen = std::collections::HashSet::new();
    for shape in generate_shapes(5) {
        for view in level.cubes_by_shape(shape).iter() {
            let points: Vec<Point> = view.points().collect();
            assert!(points.windows(2).all(|w| w[0] < w[1]));

            let mut max = Point::ORIGIN;
            for &p in &points {
                assert!(p.x() >= 0 && p.y() >= 0 && p.z() >= 0);
                max = max.max_parts(p);
            }
            assert_eq!(max, shape);
            assert!(shape.is_sorted_shape());

            let (canon, canon_shape) = canonicalize(&points, shape);
            assert_eq!(canon.points(), points.as_slice());
            assert_eq!(canon_shape, shape);

            // no cube may appear under two shapes
            assert!(seen.insert(points));
        }
    }
    assert_eq!(seen.len() as u64, 29);
}

#[test]
fn cache_roundtrip_and_reuse() {
    let dir = tempfile::tempdir().unwrap();
    let opts = GenOptions {
        write_cache: true,
        base_path: dir.path().to_path_buf(),
        ..GenOptions::default()
    };

    let level4 = gen(4, 1, &opts).unwrap();
    let reader = CacheReader::load(&whole_path(dir.path(), 4)).unwrap();
    assert_eq!(reader.n(), 4);
    assert_eq!(reader.num_cubes(), level4.num_cubes());

    for shape in generate_shapes(4) {
        let mut written: Vec<Vec<Point>> = level4
            .cubes_by_shape(shape)
            .iter()
            .map(|v| v.points().collect())
            .collect();
        let mut loaded: Vec<Vec<Point>> = reader
            .cubes_by_shape(shape)
            .iter()
            .map(|v| v.points().collect())
            .collect();
        written.sort();
        loaded.sort();
        assert_eq!(written, loaded);

        for cube in &loaded {
            let (canon, _) = canonicalize(cube, shape);
            assert_eq!(canon.points(), cube.as_slice());
        }
    }
    drop(reader);

    // levels 5 and 6 pick up the written caches and agree with the table
    let cached = GenOptions {
        use_cache: true,
        ..opts
    };
    assert_eq!(gen(5, 1, &cached).unwrap().num_cubes(), 29);
    assert_eq!(gen(6, 1, &cached).unwrap().num_cubes(), 166);
}

#[test]
fn malformed_cache_falls_back_to_recompute() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(whole_path(dir.path(), 3), b"not a cache file").unwrap();

    let opts = GenOptions {
        use_cache: true,
        base_path: dir.path().to_path_buf(),
        ..GenOptions::default()
    };
    assert_eq!(gen(4, 1, &opts).unwrap().num_cubes(), 8);
}

#[test]
fn split_cache_mode_counts_check_out() {
    let dir = tempfile::tempdir().unwrap();
    let opts = GenOptions {
        split_cache: true,
        base_path: dir.path().to_path_buf(),
        ..GenOptions::default()
    };

    // the run cross-checks every level against the reference table
    gen(4, 2, &opts).unwrap();
    for shape in generate_shapes(4) {
        let path = cubegen::cache::split_path(dir.path(), 4, shape);
        assert!(path.exists(), "missing split file for {shape:?}");
    }
    let total: u64 = generate_shapes(4)
        .into_iter()
        .map(|shape| {
            CacheReader::load(&cubegen::cache::split_path(dir.path(), 4, shape))
                .unwrap()
                .num_cubes()
        })
        .sum();
    assert_eq!(total, 8);

    // regenerating the next level straight from the split files
    let next = GenOptions {
        use_cache: true,
        ..opts
    };
    gen(5, 2, &next).unwrap();
}
