use {
    crate::{
        cube::Cube,
        point::{Point, Shape},
    },
    rustc_hash::FxHashSet,
    std::{collections::BTreeMap, sync::RwLock},
};

pub const NUM_HASH_BUCKETS: usize = 8;

/// Order-sensitive fold over the 24-bit packed points, seeded with the
/// cube length. This exact mixer fixes the hash-bucket assignment of
/// every canonical cube; do not change it without rewriting caches.
pub fn fold_hash(points: &[Point]) -> u64 {
    let mut seed = points.len() as u64;
    for p in points {
        let h = p.packed() as u64;
        seed ^= h
            .wrapping_add(0x9e37_79b9)
            .wrapping_add(seed << 6)
            .wrapping_add(seed >> 2);
    }
    seed
}

#[derive(Default)]
struct HashBucket {
    set: RwLock<FxHashSet<Cube>>,
}

impl HashBucket {
    fn contains(&self, points: &[Point]) -> bool {
        self.set.read().unwrap().contains(points)
    }

    fn insert(&self, points: &[Point]) {
        self.set.write().unwrap().insert(Cube::from(points));
    }

    fn len(&self) -> usize {
        self.set.read().unwrap().len()
    }

    fn clear(&self) {
        let mut set = self.set.write().unwrap();
        set.clear();
        set.shrink_to_fit();
    }
}

/// All canonical cubes of one shape, striped over `NUM_HASH_BUCKETS`
/// reader/writer-locked sets keyed by `fold_hash`.
#[derive(Default)]
pub struct ShapeBucket {
    byhash: [HashBucket; NUM_HASH_BUCKETS],
}

impl ShapeBucket {
    pub fn insert(&self, points: &[Point]) {
        let bucket = &self.byhash[(fold_hash(points) % NUM_HASH_BUCKETS as u64) as usize];
        // the common path is a hit under the shared lock; a racing miss
        // is resolved by the set itself under the exclusive lock
        if !bucket.contains(points) {
            bucket.insert(points);
        }
    }

    pub fn contains(&self, points: &[Point]) -> bool {
        self.byhash[(fold_hash(points) % NUM_HASH_BUCKETS as u64) as usize].contains(points)
    }

    pub fn size(&self) -> usize {
        self.byhash.iter().map(HashBucket::len).sum()
    }

    pub fn clear(&self) {
        for bucket in &self.byhash {
            bucket.clear();
        }
    }

    /// Visits every cube of this shape, one hash stripe at a time, each
    /// under its read lock.
    pub fn for_each(&self, mut f: impl FnMut(&Cube)) {
        for bucket in &self.byhash {
            for cube in bucket.set.read().unwrap().iter() {
                f(cube);
            }
        }
    }
}

/// Every shape with 0 <= x <= y <= z < n whose box holds at least n
/// cells, in ascending order.
pub fn generate_shapes(n: usize) -> Vec<Shape> {
    let mut shapes = Vec::new();
    for x in 0..n {
        for y in x..n {
            for z in y..n {
                let shape = Point::new(x as i8, y as i8, z as i8);
                if shape.volume() as usize >= n {
                    shapes.push(shape);
                }
            }
        }
    }
    shapes
}

/// The shape-sharded cube store: one `ShapeBucket` per feasible shape,
/// preallocated up front so inserts never touch the map structure.
#[derive(Default)]
pub struct Hashy {
    byshape: BTreeMap<Shape, ShapeBucket>,
}

impl Hashy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, n: usize) {
        for shape in generate_shapes(n) {
            self.byshape.insert(shape, ShapeBucket::default());
        }
    }

    pub fn insert(&self, points: &[Point], shape: Shape) {
        match self.byshape.get(&shape) {
            Some(bucket) => bucket.insert(points),
            None => panic!("shape {shape:?} was not preallocated"),
        }
    }

    pub fn contains(&self, points: &[Point], shape: Shape) -> bool {
        self.byshape
            .get(&shape)
            .is_some_and(|bucket| bucket.contains(points))
    }

    pub fn size(&self) -> usize {
        self.byshape.values().map(ShapeBucket::size).sum()
    }

    pub fn shape_size(&self, shape: Shape) -> usize {
        self.byshape.get(&shape).map_or(0, ShapeBucket::size)
    }

    pub fn num_shapes(&self) -> usize {
        self.byshape.len()
    }

    pub fn bucket(&self, shape: Shape) -> Option<&ShapeBucket> {
        self.byshape.get(&shape)
    }

    pub fn clear_shape(&self, shape: Shape) {
        if let Some(bucket) = self.byshape.get(&shape) {
            bucket.clear();
        }
    }

    /// Shape buckets in ascending shape order.
    pub fn iter(&self) -> impl Iterator<Item = (&Shape, &ShapeBucket)> {
        self.byshape.iter()
    }

    pub fn shapes(&self) -> impl Iterator<Item = Shape> + '_ {
        self.byshape.keys().copied()
    }
}

#[test]
fn test_fold_hash_reference() {
    // seed = 1, then 1 ^ (0 + 0x9e3779b9 + (1 << 6) + (1 >> 2))
    assert_eq!(fold_hash(&[Point::new(0, 0, 0)]), 0x9e37_79f8);
}

#[test]
fn test_fold_hash_order_sensitive() {
    let a = [Point::new(0, 0, 0), Point::new(0, 0, 1)];
    let b = [Point::new(0, 0, 1), Point::new(0, 0, 0)];
    assert_ne!(fold_hash(&a), fold_hash(&b));
}

#[test]
fn test_generate_shapes_small() {
    assert_eq!(generate_shapes(1), vec![Point::new(0, 0, 0)]);
    assert_eq!(
        generate_shapes(2),
        vec![Point::new(0, 0, 1), Point::new(0, 1, 1), Point::new(1, 1, 1)]
    );

    let shapes = generate_shapes(3);
    assert_eq!(shapes.len(), 8);
    assert!(shapes.contains(&Point::new(0, 0, 2)));
    assert!(shapes.contains(&Point::new(0, 1, 1)));
    assert!(!shapes.contains(&Point::new(0, 0, 1)));
    assert!(shapes.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_insert_idempotent() {
    let mut hashes = Hashy::new();
    hashes.init(2);
    let domino = [Point::new(0, 0, 0), Point::new(0, 0, 1)];
    let shape = Point::new(0, 0, 1);
    for _ in 0..5 {
        hashes.insert(&domino, shape);
    }
    assert_eq!(hashes.size(), 1);
    assert_eq!(hashes.shape_size(shape), 1);
    assert!(hashes.contains(&domino, shape));
}

#[test]
fn test_size_sums_hash_buckets() {
    let mut hashes = Hashy::new();
    hashes.init(4);
    let shape = Point::new(0, 1, 2);
    let bar = [Point::new(0, 0, 0), Point::new(0, 0, 1), Point::new(0, 0, 2)];
    for z in 0..3i8 {
        let mut cube = bar.to_vec();
        cube.push(Point::new(0, 1, z));
        hashes.insert(&cube, shape);
    }
    hashes.insert(
        &[Point::new(0, 0, 0), Point::new(0, 1, 0), Point::new(0, 1, 1), Point::new(0, 1, 2)],
        shape,
    );
    let bucket = hashes.bucket(shape).unwrap();
    let striped: usize = bucket.byhash.iter().map(HashBucket::len).sum();
    assert_eq!(striped, bucket.size());
    assert_eq!(hashes.size(), bucket.size());
}

#[test]
#[should_panic(expected = "not preallocated")]
fn test_insert_unknown_shape_panics() {
    let mut hashes = Hashy::new();
    hashes.init(2);
    hashes.insert(&[Point::new(0, 0, 0)], Point::new(0, 0, 0));
}

#[test]
fn test_clear_shape() {
    let mut hashes = Hashy::new();
    hashes.init(2);
    let shape = Point::new(0, 0, 1);
    hashes.insert(&[Point::new(0, 0, 0), Point::new(0, 0, 1)], shape);
    hashes.clear_shape(shape);
    assert_eq!(hashes.size(), 0);
    assert_eq!(hashes.num_shapes(), 3);
}
