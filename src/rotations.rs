use crate::point::{Point, Shape};

/// The 24 proper rotations of the oriented cube as signed axis
/// permutations: (axis sources, signs). Identity first.
pub const LUT: [([usize; 3], [i8; 3]); 24] = [
    ([0, 1, 2], [1, 1, 1]),
    ([0, 1, 2], [-1, -1, 1]),
    ([0, 1, 2], [-1, 1, -1]),
    ([0, 1, 2], [1, -1, -1]),
    ([0, 2, 1], [-1, -1, -1]),
    ([0, 2, 1], [-1, 1, 1]),
    ([0, 2, 1], [1, -1, 1]),
    ([0, 2, 1], [1, 1, -1]),
    ([1, 0, 2], [-1, -1, -1]),
    ([1, 0, 2], [-1, 1, 1]),
    ([1, 0, 2], [1, -1, 1]),
    ([1, 0, 2], [1, 1, -1]),
    ([1, 2, 0], [-1, -1, 1]),
    ([1, 2, 0], [-1, 1, -1]),
    ([1, 2, 0], [1, -1, -1]),
    ([1, 2, 0], [1, 1, 1]),
    ([2, 0, 1], [-1, -1, 1]),
    ([2, 0, 1], [-1, 1, -1]),
    ([2, 0, 1], [1, -1, -1]),
    ([2, 0, 1], [1, 1, 1]),
    ([2, 1, 0], [-1, -1, -1]),
    ([2, 1, 0], [-1, 1, 1]),
    ([2, 1, 0], [1, -1, 1]),
    ([2, 1, 0], [1, 1, -1]),
];

/// Applies rotation `i` to `src` with bounding extents `shape`, writing the
/// image into `dst`. Returns the rotated shape and whether the rotation
/// survived the shape prune: images whose rotated shape is not sorted
/// ascending are rejected without touching `dst`. The caller sorts `dst`.
pub fn rotate(i: usize, shape: Shape, src: &[Point], dst: &mut Vec<Point>) -> (Shape, bool) {
    let (perm, signs) = LUT[i];
    let rot_shape = Point::new(shape.at(perm[0]), shape.at(perm[1]), shape.at(perm[2]));
    if !rot_shape.is_sorted_shape() {
        return (rot_shape, false);
    }
    dst.clear();
    dst.extend(src.iter().map(|p| {
        let component = |j: usize| {
            if signs[j] < 0 {
                shape.at(perm[j]) - p.at(perm[j])
            } else {
                p.at(perm[j])
            }
        };
        Point::new(component(0), component(1), component(2))
    }));
    (rot_shape, true)
}

#[test]
fn test_identity_first() {
    assert_eq!(LUT[0], ([0, 1, 2], [1, 1, 1]));
}

#[test]
fn test_table_distinct() {
    for i in 0..LUT.len() {
        for j in i + 1..LUT.len() {
            assert_ne!(LUT[i], LUT[j], "rotations {i} and {j} coincide");
        }
    }
}

#[test]
fn test_table_spans_all_orientations() {
    // the L-tetromino has no rotational symmetry, so all 24 images differ
    let src = [
        Point::new(0, 0, 0),
        Point::new(0, 1, 0),
        Point::new(0, 2, 0),
        Point::new(1, 0, 0),
    ];
    let shape = Point::new(1, 2, 0);
    let mut images = std::collections::BTreeSet::new();
    let mut dst = Vec::new();
    for i in 0..LUT.len() {
        let (perm, signs) = LUT[i];
        // apply without the shape prune to see every orientation
        for p in &src {
            let component = |j: usize| {
                if signs[j] < 0 {
                    shape.at(perm[j]) - p.at(perm[j])
                } else {
                    p.at(perm[j])
                }
            };
            dst.push(Point::new(component(0), component(1), component(2)));
        }
        dst.sort_unstable();
        images.insert(std::mem::take(&mut dst));
    }
    assert_eq!(images.len(), 24);
}

#[test]
fn test_rotate_domino() {
    // shape (1,0,0) only sorts under permutations sending axis 0 last
    let src = [Point::new(0, 0, 0), Point::new(1, 0, 0)];
    let shape = Point::new(1, 0, 0);
    let mut dst = Vec::new();
    let mut accepted = 0;
    let mut best: Vec<Point> = Vec::new();
    for i in 0..LUT.len() {
        let (rot_shape, ok) = rotate(i, shape, &src, &mut dst);
        if !ok {
            continue;
        }
        accepted += 1;
        assert_eq!(rot_shape, Point::new(0, 0, 1));
        dst.sort_unstable();
        if best.as_slice() < dst.as_slice() {
            std::mem::swap(&mut best, &mut dst);
        }
    }
    assert_eq!(accepted, 8);
    assert_eq!(best, vec![Point::new(0, 0, 0), Point::new(0, 0, 1)]);
}
