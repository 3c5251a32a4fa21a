use {
    crate::{
        cube::Cube,
        error::Error,
        hashy::{Hashy, ShapeBucket},
        point::{Point, Shape},
    },
    memmap2::{Mmap, MmapMut},
    std::{
        fs::{File, OpenOptions},
        io::ErrorKind,
        ops::Range,
        path::{Path, PathBuf},
    },
};

// ====================
// cache file layout, little-endian
// ====================
//
// header (24 bytes):
//   u32 magic = "PCUB"
//   u32 n               points per polycube
//   u32 num_shapes      length of the shape table
//   u32 (padding, zero)
//   u64 num_polycubes   total cubes in the file
//
// shape table, num_shapes entries of 24 bytes:
//   u8 dim0, dim1, dim2 sorted extents, stored verbatim
//   u8 reserved (zero)
//   u32 (padding, zero)
//   u64 offset          byte offset of this shape's block from file start
//   u64 size            block length, multiple of 3 * n
//
// point blocks follow in table order, 3 bytes per point (x, y, z).

pub const MAGIC: u32 = 0x4255_4350;
pub const POINT_SIZE: usize = 3;
pub const HEADER_SIZE: usize = 24;
pub const SHAPE_ENTRY_SIZE: usize = 24;

pub fn whole_path(base: &Path, n: usize) -> PathBuf {
    base.join(format!("cubes_{n}.bin"))
}

pub fn split_path(base: &Path, n: usize, shape: Shape) -> PathBuf {
    base.join(format!(
        "cubes_{}_{}-{}-{}.bin",
        n,
        shape.x(),
        shape.y(),
        shape.z()
    ))
}

/// Borrowed view of one cube record: `n` points of 3 bytes each.
#[derive(Clone, Copy)]
pub struct CubeView<'a> {
    data: &'a [u8],
}

impl<'a> CubeView<'a> {
    pub fn len(&self) -> usize {
        self.data.len() / POINT_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = Point> + 'a {
        self.data
            .chunks_exact(POINT_SIZE)
            .map(|c| Point::from_bytes3([c[0], c[1], c[2]]))
    }

    pub fn decode_into(&self, out: &mut Vec<Point>) {
        out.extend(self.points());
    }

    pub fn to_cube(&self) -> Cube {
        self.points().collect::<Vec<_>>().into()
    }
}

/// All cubes of one shape as a contiguous run of records. Views into a
/// range must not outlive the reader that owns the backing bytes.
#[derive(Clone, Copy)]
pub struct ShapeRange<'a> {
    n: usize,
    shape: Shape,
    data: &'a [u8],
}

impl<'a> ShapeRange<'a> {
    pub fn new(n: usize, shape: Shape, data: &'a [u8]) -> Self {
        debug_assert!(n > 0 && data.len() % (POINT_SIZE * n) == 0);
        Self { n, shape, data }
    }

    pub fn empty(n: usize, shape: Shape) -> Self {
        Self { n, shape, data: &[] }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn len(&self) -> usize {
        if self.n == 0 {
            0
        } else {
            self.data.len() / (POINT_SIZE * self.n)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, i: usize) -> CubeView<'a> {
        let record = POINT_SIZE * self.n;
        CubeView {
            data: &self.data[i * record..(i + 1) * record],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = CubeView<'a>> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }
}

/// A provider of level data: either a mapped cache file or an in-memory
/// snapshot of a finished level.
pub trait CubeSource {
    fn num_cubes(&self) -> u64;
    fn cubes_by_shape(&self, shape: Shape) -> ShapeRange<'_>;
}

struct ParsedHeader {
    n: usize,
    num_shapes: usize,
    num_polycubes: u64,
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

fn parse_header(path: &Path, bytes: &[u8]) -> Result<ParsedHeader, Error> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::malformed(path, "file shorter than header"));
    }
    if read_u32(bytes, 0) != MAGIC {
        return Err(Error::malformed(path, "bad magic"));
    }
    let n = read_u32(bytes, 4) as usize;
    if n == 0 || n > 126 {
        return Err(Error::malformed(path, "cube size out of range"));
    }
    Ok(ParsedHeader {
        n,
        num_shapes: read_u32(bytes, 8) as usize,
        num_polycubes: read_u64(bytes, 16),
    })
}

/// Memory-mapped reader for one cache file. The whole file stays mapped
/// for the reader's lifetime; `cubes_by_shape` hands out zero-copy views.
pub struct CacheReader {
    mmap: Mmap,
    path: PathBuf,
    n: usize,
    num_polycubes: u64,
    shapes: Vec<(Shape, Range<usize>)>,
}

impl CacheReader {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::CacheMissing(path.to_path_buf()),
            _ => Error::io(path, e),
        })?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;

        let header = parse_header(path, &mmap)?;
        let record = POINT_SIZE * header.n;
        let table_end = HEADER_SIZE + header.num_shapes * SHAPE_ENTRY_SIZE;
        if mmap.len() < table_end {
            return Err(Error::malformed(path, "truncated shape table"));
        }

        // offsets are recomputed by prefix-summing the entry sizes from
        // the end of the shape table, so stale stored offsets are harmless
        let mut shapes = Vec::with_capacity(header.num_shapes);
        let mut offset = table_end;
        let mut total = 0u64;
        for i in 0..header.num_shapes {
            let at = HEADER_SIZE + i * SHAPE_ENTRY_SIZE;
            let shape = Point::new(mmap[at] as i8, mmap[at + 1] as i8, mmap[at + 2] as i8);
            if !shape.is_sorted_shape() {
                return Err(Error::malformed(path, "shape entry is not sorted"));
            }
            let size = read_u64(&mmap, at + 16) as usize;
            if size % record != 0 {
                return Err(Error::malformed(path, "block size not a multiple of cube records"));
            }
            total += (size / record) as u64;
            shapes.push((shape, offset..offset + size));
            offset += size;
        }
        if offset > mmap.len() {
            return Err(Error::malformed(path, "point blocks exceed the file"));
        }
        if total != header.num_polycubes {
            return Err(Error::malformed(path, "cube count disagrees with header"));
        }

        Ok(Self {
            mmap,
            path: path.to_path_buf(),
            n: header.n,
            num_polycubes: header.num_polycubes,
            shapes,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn num_shapes(&self) -> usize {
        self.shapes.len()
    }

    pub fn shapes(&self) -> impl Iterator<Item = Shape> + '_ {
        self.shapes.iter().map(|(s, _)| *s)
    }

    pub fn describe(&self) -> String {
        format!(
            "magic: {:x} n: {} numShapes: {} numPolycubes: {}",
            MAGIC,
            self.n,
            self.shapes.len(),
            self.num_polycubes
        )
    }
}

impl CubeSource for CacheReader {
    fn num_cubes(&self) -> u64 {
        self.num_polycubes
    }

    fn cubes_by_shape(&self, shape: Shape) -> ShapeRange<'_> {
        match self.shapes.iter().find(|(s, _)| *s == shape) {
            Some((_, range)) => ShapeRange::new(self.n, shape, &self.mmap[range.clone()]),
            None => ShapeRange::empty(self.n, shape),
        }
    }
}

/// In-memory snapshot of a finished level in the on-disk record layout,
/// so the driver can iterate it exactly like a mapped file.
#[derive(Default)]
pub struct FlatCache {
    n: usize,
    data: Vec<u8>,
    shapes: Vec<(Shape, Range<usize>)>,
}

impl FlatCache {
    pub fn from_hashy(hashes: &Hashy, n: usize) -> Self {
        let mut data = Vec::with_capacity(hashes.size() * POINT_SIZE * n);
        let mut shapes = Vec::with_capacity(hashes.num_shapes());
        for (&shape, bucket) in hashes.iter() {
            let start = data.len();
            bucket.for_each(|cube| {
                for p in cube.points() {
                    data.extend_from_slice(&p.to_bytes3());
                }
            });
            shapes.push((shape, start..data.len()));
        }
        Self { n, data, shapes }
    }
}

impl CubeSource for FlatCache {
    fn num_cubes(&self) -> u64 {
        if self.n == 0 {
            0
        } else {
            (self.data.len() / (POINT_SIZE * self.n)) as u64
        }
    }

    fn cubes_by_shape(&self, shape: Shape) -> ShapeRange<'_> {
        match self.shapes.iter().find(|(s, _)| *s == shape) {
            Some((_, range)) => ShapeRange::new(self.n, shape, &self.data[range.clone()]),
            None => ShapeRange::empty(self.n, shape),
        }
    }
}

/// Writes a whole level. Empty stores produce no file.
pub fn write_cache_file(path: &Path, hashes: &Hashy, n: usize) -> Result<(), Error> {
    if hashes.size() == 0 {
        return Ok(());
    }
    let entries: Vec<(Shape, &ShapeBucket)> = hashes.iter().map(|(&s, b)| (s, b)).collect();
    write_file(path, n, &entries)
}

/// Writes a single shape's cubes as a split cache file (`num_shapes` = 1).
/// Empty shapes still produce a file so split levels stay complete.
pub fn write_shape_file(path: &Path, hashes: &Hashy, n: usize, shape: Shape) -> Result<(), Error> {
    let bucket = hashes
        .bucket(shape)
        .unwrap_or_else(|| panic!("shape {shape:?} was not preallocated"));
    write_file(path, n, &[(shape, bucket)])
}

fn write_file(path: &Path, n: usize, entries: &[(Shape, &ShapeBucket)]) -> Result<(), Error> {
    let record = POINT_SIZE * n;
    let counts: Vec<usize> = entries.iter().map(|(_, b)| b.size()).collect();
    let total_cubes: u64 = counts.iter().map(|&c| c as u64).sum();
    let table_end = HEADER_SIZE + entries.len() * SHAPE_ENTRY_SIZE;
    let file_len = table_end + counts.iter().sum::<usize>() * record;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    file.set_len(file_len as u64).map_err(|e| Error::io(path, e))?;
    let mut mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|e| Error::io(path, e))?;

    mmap[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    mmap[4..8].copy_from_slice(&(n as u32).to_le_bytes());
    mmap[8..12].copy_from_slice(&(entries.len() as u32).to_le_bytes());
    mmap[16..24].copy_from_slice(&total_cubes.to_le_bytes());

    let mut offset = table_end as u64;
    for (i, ((shape, _), &count)) in entries.iter().zip(&counts).enumerate() {
        let at = HEADER_SIZE + i * SHAPE_ENTRY_SIZE;
        let size = (count * record) as u64;
        mmap[at..at + 3].copy_from_slice(&shape.to_bytes3());
        mmap[at + 8..at + 16].copy_from_slice(&offset.to_le_bytes());
        mmap[at + 16..at + 24].copy_from_slice(&size.to_le_bytes());
        offset += size;
    }

    // one copy job per shape block; the store is quiescent while saving
    let (_, mut rest) = mmap.split_at_mut(table_end);
    rayon::scope(|s| {
        for (&(_, bucket), &count) in entries.iter().zip(&counts) {
            let (block, tail) = std::mem::take(&mut rest).split_at_mut(count * record);
            rest = tail;
            s.spawn(move |_| fill_block(block, bucket));
        }
    });

    mmap.flush().map_err(|e| Error::io(path, e))?;
    println!("saved {}", path.display());
    Ok(())
}

fn fill_block(block: &mut [u8], bucket: &ShapeBucket) {
    let mut at = 0;
    bucket.for_each(|cube| {
        for p in cube.points() {
            block[at..at + POINT_SIZE].copy_from_slice(&p.to_bytes3());
            at += POINT_SIZE;
        }
    });
    assert_eq!(at, block.len(), "store changed while saving");
}

#[cfg(test)]
fn domino_store() -> Hashy {
    let mut hashes = Hashy::new();
    hashes.init(2);
    hashes.insert(
        &[Point::new(0, 0, 0), Point::new(0, 0, 1)],
        Point::new(0, 0, 1),
    );
    hashes
}

#[test]
fn test_save_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = whole_path(dir.path(), 2);
    write_cache_file(&path, &domino_store(), 2).unwrap();

    let reader = CacheReader::load(&path).unwrap();
    assert_eq!(reader.n(), 2);
    assert_eq!(reader.num_cubes(), 1);
    assert_eq!(reader.num_shapes(), 1);

    let range = reader.cubes_by_shape(Point::new(0, 0, 1));
    assert_eq!(range.len(), 1);
    let points: Vec<Point> = range.get(0).points().collect();
    assert_eq!(points, vec![Point::new(0, 0, 0), Point::new(0, 0, 1)]);
}

#[test]
fn test_stale_offsets_recomputed() {
    let dir = tempfile::tempdir().unwrap();
    let path = whole_path(dir.path(), 2);
    write_cache_file(&path, &domino_store(), 2).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let at = HEADER_SIZE + 8;
    let stale = read_u64(&bytes, at) + 1024;
    bytes[at..at + 8].copy_from_slice(&stale.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let reader = CacheReader::load(&path).unwrap();
    let range = reader.cubes_by_shape(Point::new(0, 0, 1));
    let points: Vec<Point> = range.get(0).points().collect();
    assert_eq!(points, vec![Point::new(0, 0, 0), Point::new(0, 0, 1)]);
}

#[test]
fn test_bad_magic_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = whole_path(dir.path(), 2);
    write_cache_file(&path, &domino_store(), 2).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] ^= 0xff;
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        CacheReader::load(&path),
        Err(Error::CacheMalformed { .. })
    ));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        CacheReader::load(&whole_path(dir.path(), 9)),
        Err(Error::CacheMissing(_))
    ));
}

#[test]
fn test_split_file_empty_shape() {
    let dir = tempfile::tempdir().unwrap();
    let mut hashes = Hashy::new();
    hashes.init(2);
    let shape = Point::new(0, 0, 1);
    let path = split_path(dir.path(), 2, shape);
    write_shape_file(&path, &hashes, 2, shape).unwrap();

    let reader = CacheReader::load(&path).unwrap();
    assert_eq!(reader.num_cubes(), 0);
    assert!(reader.cubes_by_shape(shape).is_empty());
}

#[test]
fn test_flatcache_matches_reader() {
    let dir = tempfile::tempdir().unwrap();
    let hashes = domino_store();
    let path = whole_path(dir.path(), 2);
    write_cache_file(&path, &hashes, 2).unwrap();
    let reader = CacheReader::load(&path).unwrap();
    let flat = FlatCache::from_hashy(&hashes, 2);

    assert_eq!(flat.num_cubes(), reader.num_cubes());
    let shape = Point::new(0, 0, 1);
    let a: Vec<Vec<Point>> = flat
        .cubes_by_shape(shape)
        .iter()
        .map(|v| v.points().collect())
        .collect();
    let b: Vec<Vec<Point>> = reader
        .cubes_by_shape(shape)
        .iter()
        .map(|v| v.points().collect())
        .collect();
    assert_eq!(a, b);
}
