use std::fmt;

/// Lattice point packed as (x, y, z) signed bytes in one `u32`, x highest.
/// The fourth byte is always zero, so the packed value doubles as the
/// 24-bit point hash and gives lexicographic (x, y, z) ordering for free.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point(u32);

/// A bounding-box extent triple, reusing the point packing. Canonical
/// shapes are sorted ascending (d0 <= d1 <= d2).
pub type Shape = Point;

impl Point {
    pub const ORIGIN: Point = Point(0);

    pub fn new(x: i8, y: i8, z: i8) -> Self {
        Self(((x as u8 as u32) << 16) | ((y as u8 as u32) << 8) | (z as u8 as u32))
    }

    pub fn x(self) -> i8 {
        (self.0 >> 16) as u8 as i8
    }

    pub fn y(self) -> i8 {
        (self.0 >> 8) as u8 as i8
    }

    pub fn z(self) -> i8 {
        self.0 as u8 as i8
    }

    pub fn at(self, axis: usize) -> i8 {
        match axis {
            0 => self.x(),
            1 => self.y(),
            2 => self.z(),
            _ => panic!("axis {axis} out of range"),
        }
    }

    pub fn with_at(self, axis: usize, v: i8) -> Self {
        match axis {
            0 => Self::new(v, self.y(), self.z()),
            1 => Self::new(self.x(), v, self.z()),
            2 => Self::new(self.x(), self.y(), v),
            _ => panic!("axis {axis} out of range"),
        }
    }

    pub fn packed(self) -> u32 {
        self.0
    }

    pub fn translated(self, dx: i8, dy: i8, dz: i8) -> Self {
        Self::new(self.x() + dx, self.y() + dy, self.z() + dz)
    }

    pub fn max_parts(self, other: Self) -> Self {
        Self::new(
            self.x().max(other.x()),
            self.y().max(other.y()),
            self.z().max(other.z()),
        )
    }

    pub fn is_sorted_shape(self) -> bool {
        self.x() <= self.y() && self.y() <= self.z()
    }

    /// Number of lattice cells inside the bounding box described by this
    /// extent triple.
    pub fn volume(self) -> u32 {
        (self.x() as u32 + 1) * (self.y() as u32 + 1) * (self.z() as u32 + 1)
    }

    pub fn to_bytes3(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }

    pub fn from_bytes3(b: [u8; 3]) -> Self {
        Self(((b[0] as u32) << 16) | ((b[1] as u32) << 8) | (b[2] as u32))
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.x(), self.y(), self.z())
    }
}

#[test]
fn test_pack_accessors() {
    let p = Point::new(1, 2, 3);
    assert_eq!(p.packed(), 0x010203);
    assert_eq!((p.x(), p.y(), p.z()), (1, 2, 3));
    assert_eq!((p.at(0), p.at(1), p.at(2)), (1, 2, 3));
}

#[test]
fn test_pack_order() {
    assert!(Point::new(0, 0, 1) < Point::new(0, 1, 0));
    assert!(Point::new(0, 1, 0) < Point::new(1, 0, 0));
    assert!(Point::new(0, 0, 0) < Point::new(0, 0, 1));
    // negative coordinates wrap high in the unsigned packing
    assert!(Point::new(126, 0, 0) < Point::new(-1, 0, 0));
}

#[test]
fn test_pack_random() {
    use rand::Rng;
    let mut rng = rand::thread_rng();

    for _ in 0..1000 {
        let (x, y, z) = rng.gen::<(i8, i8, i8)>();
        let p = Point::new(x, y, z);
        assert_eq!((p.x(), p.y(), p.z()), (x, y, z));
        assert_eq!(Point::from_bytes3(p.to_bytes3()), p);

        let (a, b, c) = rng.gen::<(i8, i8, i8)>();
        let q = Point::new(a, b, c);
        let key = |p: Point| (p.x() as u8, p.y() as u8, p.z() as u8);
        assert_eq!(p.cmp(&q), key(p).cmp(&key(q)));
    }
}

#[test]
fn test_shape_helpers() {
    assert!(Point::new(0, 1, 2).is_sorted_shape());
    assert!(!Point::new(1, 0, 0).is_sorted_shape());
    assert_eq!(Point::new(0, 1, 2).volume(), 6);
    assert_eq!(Point::new(0, 0, 0).volume(), 1);
}
