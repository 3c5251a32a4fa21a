use {
    crate::{
        point::{Point, Shape},
        rotations,
    },
    std::borrow::Borrow,
};

/// An owned polycube: its points, sorted ascending in canonical form.
/// Equality, order and hashing all defer to the point slice, so sets can
/// be probed with a borrowed `&[Point]` before allocating.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cube(Box<[Point]>);

impl Cube {
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Componentwise max over all points: the bounding extents, assuming
    /// the cube is non-negatively translated.
    pub fn shape(&self) -> Shape {
        self.0
            .iter()
            .fold(Point::ORIGIN, |acc, &p| acc.max_parts(p))
    }
}

impl From<&[Point]> for Cube {
    fn from(points: &[Point]) -> Self {
        Self(points.into())
    }
}

impl From<Vec<Point>> for Cube {
    fn from(points: Vec<Point>) -> Self {
        Self(points.into())
    }
}

impl Borrow<[Point]> for Cube {
    fn borrow(&self) -> &[Point] {
        &self.0
    }
}

/// Picks the canonical representative of the rotation class of `points`
/// (any translation-normalized image with extents `shape`): the
/// lexicographically largest sorted image among the rotations whose
/// rotated shape is sorted ascending. Returns that image in `best`
/// together with its shape; `rotated` is scratch.
pub fn canonicalize_into(
    points: &[Point],
    shape: Shape,
    rotated: &mut Vec<Point>,
    best: &mut Vec<Point>,
) -> Shape {
    let mut best_shape = shape;
    let mut none_set = true;
    for i in 0..rotations::LUT.len() {
        let (rot_shape, ok) = rotations::rotate(i, shape, points, rotated);
        if !ok {
            continue;
        }
        rotated.sort_unstable();
        if none_set || best.as_slice() < rotated.as_slice() {
            none_set = false;
            std::mem::swap(best, rotated);
            best_shape = rot_shape;
        }
    }
    debug_assert!(!none_set, "no rotation produced a sorted shape");
    best_shape
}

/// Allocating wrapper around [`canonicalize_into`].
pub fn canonicalize(points: &[Point], shape: Shape) -> (Cube, Shape) {
    let mut rotated = Vec::with_capacity(points.len());
    let mut best = Vec::with_capacity(points.len());
    let canon_shape = canonicalize_into(points, shape, &mut rotated, &mut best);
    (Cube::from(best), canon_shape)
}

#[cfg(test)]
fn tromino() -> (Vec<Point>, Shape) {
    (
        vec![Point::new(0, 0, 0), Point::new(0, 1, 0), Point::new(1, 0, 0)],
        Point::new(1, 1, 0),
    )
}

#[test]
fn test_canonicalize_idempotent() {
    let (points, shape) = tromino();
    let (canon, canon_shape) = canonicalize(&points, shape);
    assert!(canon_shape.is_sorted_shape());
    let (again, again_shape) = canonicalize(canon.points(), canon_shape);
    assert_eq!(canon, again);
    assert_eq!(canon_shape, again_shape);
}

#[test]
fn test_canonicalize_rotation_invariant() {
    let (points, shape) = tromino();
    let (canon, canon_shape) = canonicalize(&points, shape);

    let mut image = Vec::new();
    for i in 0..rotations::LUT.len() {
        let (rot_shape, ok) = rotations::rotate(i, shape, &points, &mut image);
        if !ok {
            continue;
        }
        let (c, s) = canonicalize(&image, rot_shape);
        assert_eq!(c, canon);
        assert_eq!(s, canon_shape);
    }
}

#[test]
fn test_canonicalize_domino() {
    let points = vec![Point::new(0, 0, 0), Point::new(1, 0, 0)];
    let (canon, canon_shape) = canonicalize(&points, Point::new(1, 0, 0));
    assert_eq!(
        canon.points(),
        &[Point::new(0, 0, 0), Point::new(0, 0, 1)]
    );
    assert_eq!(canon_shape, Point::new(0, 0, 1));
}

#[test]
fn test_cube_shape() {
    let cube = Cube::from(vec![Point::new(0, 0, 0), Point::new(0, 2, 1)]);
    assert_eq!(cube.shape(), Point::new(0, 2, 1));
    assert_eq!(cube.len(), 2);
}
