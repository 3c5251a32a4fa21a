use {
    crate::{
        cache::{CubeView, ShapeRange},
        cube::canonicalize_into,
        hashy::Hashy,
        point::{Point, Shape},
        Overwriter,
    },
    std::{ops::Range, sync::Mutex},
};

/// Cubes claimed per cursor bump.
pub const CHUNK_SIZE: usize = 500;

/// One (target shape, source shape) expansion job.
#[derive(Clone, Copy, Debug)]
pub struct ExpandCtx {
    pub target_shape: Shape,
    pub source_shape: Shape,
    pub growth: [bool; 3],
    pub cross_shape: bool,
}

/// Decides whether `source` can reach `target` by growing at most one
/// axis by one, and with which growth axes. Tied source extents widen
/// the mask: a +1 on the sorted target corresponds to several positional
/// axes of the source when extents tie, and missing those would drop
/// polycubes.
pub fn growth_context(target: Shape, source: Shape) -> Option<ExpandCtx> {
    let mut diff = [0i32; 3];
    let mut abssum = 0;
    for (axis, d) in diff.iter_mut().enumerate() {
        *d = target.at(axis) as i32 - source.at(axis) as i32;
        if *d < 0 {
            return None;
        }
        abssum += *d;
    }
    if abssum > 1 {
        return None;
    }
    if diff[2] == 1 && source.at(2) == source.at(1) {
        diff[1] = 1;
    }
    if diff[1] == 1 && source.at(1) == source.at(0) {
        diff[0] = 1;
    }
    Some(ExpandCtx {
        target_shape: target,
        source_shape: source,
        growth: [diff[0] == 1, diff[1] == 1, diff[2] == 1],
        cross_shape: abssum != 0,
    })
}

/// Per-worker buffers reused across every expansion.
#[derive(Default)]
pub struct Scratch {
    base: Vec<Point>,
    candidates: Vec<Point>,
    child: Vec<Point>,
    rotated: Vec<Point>,
    best: Vec<Point>,
}

/// Grows `cube` by one cell in every legal position for `ctx`, inserting
/// each child's canonical form into `hashes`.
pub fn expand(cube: CubeView<'_>, ctx: &ExpandCtx, hashes: &Hashy, scratch: &mut Scratch) {
    let Scratch {
        base,
        candidates,
        child,
        rotated,
        best,
    } = scratch;

    base.clear();
    cube.decode_into(base);
    debug_assert!(base.windows(2).all(|w| w[0] < w[1]));

    candidates.clear();
    if ctx.cross_shape {
        for &p in base.iter() {
            for axis in 0..3 {
                if !ctx.growth[axis] {
                    continue;
                }
                if p.at(axis) == ctx.source_shape.at(axis) {
                    candidates.push(p.with_at(axis, p.at(axis) + 1));
                }
                if p.at(axis) == 0 {
                    candidates.push(p.with_at(axis, -1));
                }
            }
        }
    } else {
        for &p in base.iter() {
            for axis in 0..3 {
                if p.at(axis) < ctx.source_shape.at(axis) {
                    candidates.push(p.with_at(axis, p.at(axis) + 1));
                }
                if p.at(axis) > 0 {
                    candidates.push(p.with_at(axis, p.at(axis) - 1));
                }
            }
        }
    }
    candidates.sort_unstable();
    candidates.dedup();
    candidates.retain(|q| base.binary_search(q).is_err());

    for &q in candidates.iter() {
        let dx = (q.x() < 0) as i8;
        let dy = (q.y() < 0) as i8;
        let dz = (q.z() < 0) as i8;

        let first = q.translated(dx, dy, dz);
        child.clear();
        child.push(first);
        let mut shape = first;
        for &p in base.iter() {
            let moved = p.translated(dx, dy, dz);
            shape = shape.max_parts(moved);
            child.push(moved);
        }

        let canon_shape = canonicalize_into(child, shape, rotated, best);
        debug_assert_eq!(canon_shape, ctx.target_shape);
        hashes.insert(best, canon_shape);
    }
}

/// A shared cursor over one source range; workers claim `CHUNK_SIZE`
/// cubes at a time and expand them into the store.
pub struct Workset<'a> {
    cursor: Mutex<usize>,
    range: ShapeRange<'a>,
    ctx: ExpandCtx,
    hashes: &'a Hashy,
}

impl<'a> Workset<'a> {
    pub fn new(range: ShapeRange<'a>, ctx: ExpandCtx, hashes: &'a Hashy) -> Self {
        Self {
            cursor: Mutex::new(0),
            range,
            ctx,
            hashes,
        }
    }

    pub fn next_chunk(&self) -> Option<(Range<usize>, f32)> {
        let mut cursor = self.cursor.lock().unwrap();
        let len = self.range.len();
        if *cursor >= len {
            return None;
        }
        let start = *cursor;
        let end = (start + CHUNK_SIZE).min(len);
        *cursor = end;
        Some((start..end, 100.0 * start as f32 / len as f32))
    }

    /// Runs `threads` workers to completion over this workset.
    pub fn run(&self, threads: usize) {
        rayon::scope(|s| {
            for id in 0..threads.max(1) {
                s.spawn(move |_| self.work(id));
            }
        });
    }

    fn work(&self, id: usize) {
        let mut scratch = Scratch::default();
        let mut progress = (id == 0).then(Overwriter::default);
        while let Some((chunk, percent)) = self.next_chunk() {
            if let Some(ov) = progress.as_mut() {
                ov.print(format!("  {percent:5.2}%"));
            }
            for i in chunk {
                expand(self.range.get(i), &self.ctx, self.hashes, &mut scratch);
            }
        }
    }
}

#[cfg(test)]
use crate::cube::canonicalize;

#[test]
fn test_growth_context_same_shape() {
    let s = Point::new(0, 1, 2);
    let ctx = growth_context(s, s).unwrap();
    assert!(!ctx.cross_shape);
    assert_eq!(ctx.growth, [false, false, false]);
}

#[test]
fn test_growth_context_single_axis() {
    let ctx = growth_context(Point::new(0, 0, 2), Point::new(0, 0, 1)).unwrap();
    assert!(ctx.cross_shape);
    assert_eq!(ctx.growth, [false, false, true]);
}

#[test]
fn test_growth_context_widens_ties() {
    let ctx = growth_context(Point::new(1, 1, 2), Point::new(1, 1, 1)).unwrap();
    assert_eq!(ctx.growth, [true, true, true]);

    let ctx = growth_context(Point::new(0, 1, 1), Point::new(0, 0, 1)).unwrap();
    assert_eq!(ctx.growth, [true, true, false]);

    // no tie, no widening
    let ctx = growth_context(Point::new(0, 1, 3), Point::new(0, 1, 2)).unwrap();
    assert_eq!(ctx.growth, [false, false, true]);
}

#[test]
fn test_growth_context_rejects() {
    assert!(growth_context(Point::new(0, 0, 1), Point::new(0, 0, 2)).is_none());
    assert!(growth_context(Point::new(0, 1, 2), Point::new(0, 0, 1)).is_none());
}

#[cfg(test)]
fn expand_collect(base: &[Point], ctx: &ExpandCtx, n: usize) -> Vec<(Vec<Point>, Shape)> {
    let mut hashes = Hashy::new();
    hashes.init(n + 1);
    let data: Vec<u8> = base.iter().flat_map(|p| p.to_bytes3()).collect();
    let range = ShapeRange::new(n, ctx.source_shape, &data);
    let mut scratch = Scratch::default();
    expand(range.get(0), ctx, &hashes, &mut scratch);

    let mut out = Vec::new();
    for (&shape, bucket) in hashes.iter() {
        bucket.for_each(|cube| out.push((cube.points().to_vec(), shape)));
    }
    out
}

#[test]
fn test_expand_domino_to_bar() {
    let base = [Point::new(0, 0, 0), Point::new(0, 0, 1)];
    let ctx = growth_context(Point::new(0, 0, 2), Point::new(0, 0, 1)).unwrap();
    let children = expand_collect(&base, &ctx, 2);
    let bar = canonicalize(
        &[Point::new(0, 0, 0), Point::new(0, 0, 1), Point::new(0, 0, 2)],
        Point::new(0, 0, 2),
    );
    assert_eq!(children, vec![(bar.0.points().to_vec(), bar.1)]);
}

#[test]
fn test_expand_domino_to_ell() {
    let base = [Point::new(0, 0, 0), Point::new(0, 0, 1)];
    let ctx = growth_context(Point::new(0, 1, 1), Point::new(0, 0, 1)).unwrap();
    let children = expand_collect(&base, &ctx, 2);
    // every lateral growth canonicalizes to the one bent tromino
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].1, Point::new(0, 1, 1));
}

#[test]
fn test_expand_same_shape_no_room() {
    // the domino fills its box; same-shape expansion has nowhere to go
    let base = [Point::new(0, 0, 0), Point::new(0, 0, 1)];
    let ctx = growth_context(Point::new(0, 0, 1), Point::new(0, 0, 1)).unwrap();
    let children = expand_collect(&base, &ctx, 2);
    assert!(children.is_empty());
}

#[test]
fn test_expand_cross_shape_widened() {
    // bent tromino into the 1x2x3 box: the tied source extents widen the
    // growth mask to y and z; children are the free T, S and L pieces
    let base = [
        Point::new(0, 0, 0),
        Point::new(0, 0, 1),
        Point::new(0, 1, 1),
    ];
    let ctx = growth_context(Point::new(0, 1, 2), Point::new(0, 1, 1)).unwrap();
    assert_eq!(ctx.growth, [false, true, true]);
    let children = expand_collect(&base, &ctx, 3);
    for (points, shape) in &children {
        assert_eq!(*shape, Point::new(0, 1, 2));
        assert_eq!(points.len(), 4);
    }
    assert_eq!(children.len(), 3);
}

#[test]
fn test_workset_chunks() {
    let n = 1;
    let cubes = 1200;
    let data = vec![0u8; cubes * 3];
    let mut hashes = Hashy::new();
    hashes.init(2);
    let range = ShapeRange::new(n, Point::new(0, 0, 0), &data);
    let ctx = growth_context(Point::new(0, 0, 0), Point::new(0, 0, 0)).unwrap();
    let ws = Workset::new(range, ctx, &hashes);

    assert_eq!(ws.next_chunk().unwrap().0, 0..500);
    assert_eq!(ws.next_chunk().unwrap().0, 500..1000);
    let (last, percent) = ws.next_chunk().unwrap();
    assert_eq!(last, 1000..1200);
    assert!(percent > 80.0);
    assert!(ws.next_chunk().is_none());
}
