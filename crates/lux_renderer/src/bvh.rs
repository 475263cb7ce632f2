//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! Built once with binned SAH splits into a flat node array in depth-first
//! pre-order, then compiled into six hit tables, one per cube-map face of
//! the ray direction. Traversal is a linear walk over a table that jumps
//! past a whole subtree whenever its box is missed, so no recursion or
//! child pointers are needed in the hot loop.

use crate::primitive::Hittable;
use lux_math::{cube_map_face, Aabb, Interval, Ray, Vec3};
use std::time::Instant;

/// Number of SAH buckets per split.
const BUCKET_COUNT: usize = 16;

/// Node of the compact tree.
///
/// The left child of an interior node at `i` is `i + 1`, the right child is
/// `i + 1 + nodes[i + 1].subtree_size`. Leaves hold exactly one primitive.
#[derive(Debug, Clone, Copy)]
pub struct BvhNode {
    pub bound: Aabb,
    /// Handle into the primitive slice the tree was built over
    pub primitive: Option<u32>,
    /// Nodes in this subtree, `2 * leaves - 1`
    pub subtree_size: u32,
}

impl BvhNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.primitive.is_some()
    }
}

/// One step of a table-ordered walk.
#[derive(Debug, Clone, Copy)]
struct HitEntry {
    /// Where the walk continues when this node's box is missed
    miss_next: u32,
    node_index: u32,
}

/// Build-time record, discarded once the tree is complete.
#[derive(Debug, Clone, Copy)]
struct HittableInfo {
    bound: Aabb,
    centroid: Vec3,
    primitive: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    count: usize,
    bound: Aabb,
}

/// Flat BVH over a slice of primitives addressed by index.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    hit_tables: [Vec<HitEntry>; 6],
}

impl Bvh {
    /// Build a BVH over `primitives`. The same slice must be passed to the
    /// query functions.
    pub fn new<P: Hittable>(primitives: &[P]) -> Self {
        let start = Instant::now();

        if primitives.is_empty() {
            log::info!("BVH: empty primitive list");
            return Self::default();
        }

        let mut infos: Vec<HittableInfo> = primitives
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let bound = p.bound();
                HittableInfo {
                    bound,
                    centroid: bound.centroid(),
                    primitive: i as u32,
                }
            })
            .collect();

        let nodes = Self::build(&mut infos);
        let hit_tables = std::array::from_fn(|face| Self::build_hit_table(&nodes, face));

        log::info!(
            "BVH: {} primitives, {} nodes, built in {:.2?}",
            primitives.len(),
            nodes.len(),
            start.elapsed()
        );

        Self { nodes, hit_tables }
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bound of everything in the tree.
    pub fn bound(&self) -> Aabb {
        self.nodes.first().map_or(Aabb::EMPTY, |n| n.bound)
    }

    /// SAH build with an explicit work stack. Every task owns the info range
    /// `[start, end)` and writes its subtree at `offset`.
    fn build(infos: &mut [HittableInfo]) -> Vec<BvhNode> {
        let n = infos.len();
        let placeholder = BvhNode {
            bound: Aabb::EMPTY,
            primitive: None,
            subtree_size: 0,
        };
        let mut nodes = vec![placeholder; 2 * n - 1];
        let mut stack = vec![(0usize, n, 0usize)];

        while let Some((start, end, offset)) = stack.pop() {
            let range = &mut infos[start..end];
            let bound = range.iter().fold(Aabb::EMPTY, |acc, info| acc.union(&info.bound));
            let count = range.len();

            if count == 1 {
                nodes[offset] = BvhNode {
                    bound,
                    primitive: Some(range[0].primitive),
                    subtree_size: 1,
                };
                continue;
            }

            let left_count = if count == 2 {
                1
            } else {
                Self::split(range, bound.max_extent())
            };

            nodes[offset] = BvhNode {
                bound,
                primitive: None,
                subtree_size: (2 * count - 1) as u32,
            };
            let mid = start + left_count;
            let left_size = 2 * left_count - 1;
            stack.push((mid, end, offset + 1 + left_size));
            stack.push((start, mid, offset + 1));
        }

        nodes
    }

    /// Partition `range` along `axis` and return the size of the left part,
    /// always in `1..range.len()`.
    fn split(range: &mut [HittableInfo], axis: usize) -> usize {
        let count = range.len();
        let centroid_bound = range
            .iter()
            .fold(Aabb::EMPTY, |acc, info| acc.union_point(info.centroid));

        let bucket_of = |info: &HittableInfo| -> usize {
            let rel = centroid_bound.offset(info.centroid)[axis];
            ((rel * BUCKET_COUNT as f32) as usize).min(BUCKET_COUNT - 1)
        };

        let mut buckets = [Bucket::default(); BUCKET_COUNT];
        for info in range.iter() {
            let b = &mut buckets[bucket_of(info)];
            b.count += 1;
            b.bound = b.bound.union(&info.bound);
        }

        // Suffix sweep first, then a prefix sweep evaluates every boundary
        let mut suffix_cost = [0.0f32; BUCKET_COUNT];
        let mut acc = Bucket::default();
        for i in (1..BUCKET_COUNT).rev() {
            acc.count += buckets[i].count;
            acc.bound = acc.bound.union(&buckets[i].bound);
            suffix_cost[i] = acc.count as f32 * acc.bound.surface_area();
        }

        let mut best: Option<(usize, f32)> = None;
        let mut acc = Bucket::default();
        for i in 0..BUCKET_COUNT - 1 {
            acc.count += buckets[i].count;
            acc.bound = acc.bound.union(&buckets[i].bound);
            if acc.count == 0 || acc.count == count {
                continue;
            }
            let cost = acc.count as f32 * acc.bound.surface_area() + suffix_cost[i + 1];
            if best.map_or(true, |(_, c)| cost < c) {
                best = Some((i, cost));
            }
        }

        match best {
            Some((split_bucket, _)) => partition(range, |info| bucket_of(info) <= split_bucket),
            None => {
                // Every centroid landed in one bucket: split at the median
                let mid = count / 2;
                range.select_nth_unstable_by(mid, |a, b| {
                    a.centroid[axis].total_cmp(&b.centroid[axis])
                });
                mid
            }
        }
    }

    /// Front-to-back DFS order for rays whose reversed direction falls on
    /// cube-map face `face`.
    fn build_hit_table(nodes: &[BvhNode], face: usize) -> Vec<HitEntry> {
        let axis = face / 2;
        // Face +axis means the ray travels towards -axis: visit the larger child first
        let sign = if face % 2 == 0 { -1.0 } else { 1.0 };

        let mut table = Vec::with_capacity(nodes.len());
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &nodes[index];
            let k = table.len() as u32;
            table.push(HitEntry {
                miss_next: k + node.subtree_size,
                node_index: index as u32,
            });
            if node.is_leaf() {
                continue;
            }
            let left = index + 1;
            let right = left + nodes[left].subtree_size as usize;
            let key = |i: usize| sign * nodes[i].bound.centroid()[axis];
            let (first, second) = if key(left) <= key(right) {
                (left, right)
            } else {
                (right, left)
            };
            stack.push(second);
            stack.push(first);
        }
        table
    }

    #[inline]
    fn hit_table(&self, ray: &Ray) -> &[HitEntry] {
        &self.hit_tables[cube_map_face(-ray.direction)]
    }

    /// Closest intersection strictly inside `ray_t`: `(t, primitive index)`.
    pub fn closest_hit<P: Hittable>(
        &self,
        primitives: &[P],
        ray: &Ray,
        ray_t: Interval,
    ) -> Option<(f32, usize)> {
        let table = self.hit_table(ray);
        let mut closest = ray_t.max;
        let mut result = None;

        let mut k = 0;
        while k < table.len() {
            let entry = table[k];
            let node = &self.nodes[entry.node_index as usize];
            match node.bound.hit(ray) {
                Some((t0, t1)) if t0 <= closest && t1 >= ray_t.min => {
                    if let Some(p) = node.primitive {
                        let p = p as usize;
                        if let Some(t) = primitives[p].closest_hit(ray, ray_t.clip_max(closest)) {
                            closest = t;
                            result = Some((t, p));
                        }
                    }
                    k += 1;
                }
                _ => k = entry.miss_next as usize,
            }
        }

        result
    }

    /// Whether anything intersects the ray strictly inside `ray_t`.
    pub fn test_intersec<P: Hittable>(&self, primitives: &[P], ray: &Ray, ray_t: Interval) -> bool {
        let table = self.hit_table(ray);

        let mut k = 0;
        while k < table.len() {
            let entry = table[k];
            let node = &self.nodes[entry.node_index as usize];
            match node.bound.hit(ray) {
                Some((t0, t1)) if t0 <= ray_t.max && t1 >= ray_t.min => {
                    if let Some(p) = node.primitive {
                        if primitives[p as usize].closest_hit(ray, ray_t).is_some() {
                            return true;
                        }
                    }
                    k += 1;
                }
                _ => k = entry.miss_next as usize,
            }
        }

        false
    }
}

/// In-place partition; returns how many elements satisfy `pred` (now at the front).
fn partition<T>(items: &mut [T], pred: impl Fn(&T) -> bool) -> usize {
    let mut first = 0;
    for i in 0..items.len() {
        if pred(&items[i]) {
            items.swap(first, i);
            first += 1;
        }
    }
    first
}
