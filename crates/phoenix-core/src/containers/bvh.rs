//! Fixed-capacity bounding volume hierarchy.
//!
//! A median-split AABB tree rebuilt from scratch over a batch of leaves.
//! The broad phase proper runs on Morton ranges; the BVH serves editor and
//! debug queries (picking, region selection) where rebuild cost does not
//! matter but arbitrary boxes do.

use phoenix_fixed::{Distance, Vec2};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Aabb
// ---------------------------------------------------------------------------

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// The box covering a circle.
    pub fn from_circle(center: Vec2, radius: Distance) -> Self {
        let r = Vec2::new(radius, radius);
        Self {
            min: center - r,
            max: center + r,
        }
    }

    pub fn union(a: Self, b: Self) -> Self {
        Self {
            min: Vec2::new(a.min.x.min(b.min.x), a.min.y.min(b.min.y)),
            max: Vec2::new(a.max.x.max(b.max.x), a.max.y.max(b.max.y)),
        }
    }

    pub fn overlaps(self, other: Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains_point(self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn center(self) -> Vec2 {
        Vec2::from_bits(
            ((self.min.x.to_bits() as i64 + self.max.x.to_bits() as i64) / 2) as i32,
            ((self.min.y.to_bits() as i64 + self.max.y.to_bits() as i64) / 2) as i32,
        )
    }
}

// ---------------------------------------------------------------------------
// FixedBvh
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
struct Node {
    bounds: Aabb,
    /// Leaf: index into `leaves`. Interior: index of the left child; the
    /// right child is `left + 1` is not guaranteed, so both are stored.
    left: u32,
    right: u32,
    leaf: bool,
}

const INVALID_NODE: u32 = u32::MAX;

/// A rebuilt-per-batch AABB tree with fixed node capacity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixedBvh<T> {
    nodes: Vec<Node>,
    leaves: Vec<(Aabb, T)>,
    root: u32,
    max_leaves: usize,
}

impl<T: Copy> FixedBvh<T> {
    pub fn with_capacity(max_leaves: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(max_leaves.saturating_mul(2)),
            leaves: Vec::with_capacity(max_leaves),
            root: INVALID_NODE,
            max_leaves,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.leaves.len() >= self.max_leaves
    }

    /// Stage a leaf for the next [`build`](Self::build). Returns `false`
    /// when the leaf pool is exhausted.
    pub fn insert(&mut self, bounds: Aabb, value: T) -> bool {
        if self.is_full() {
            return false;
        }
        self.leaves.push((bounds, value));
        true
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.leaves.clear();
        self.root = INVALID_NODE;
    }

    /// Build the tree over the staged leaves.
    pub fn build(&mut self) {
        self.nodes.clear();
        self.root = INVALID_NODE;
        if self.leaves.is_empty() {
            return;
        }
        let mut order: Vec<u32> = (0..self.leaves.len() as u32).collect();
        self.root = self.build_range(&mut order, 0);
    }

    fn build_range(&mut self, order: &mut [u32], depth: u32) -> u32 {
        debug_assert!(!order.is_empty());
        if order.len() == 1 {
            let leaf = order[0];
            self.nodes.push(Node {
                bounds: self.leaves[leaf as usize].0,
                left: leaf,
                right: INVALID_NODE,
                leaf: true,
            });
            return (self.nodes.len() - 1) as u32;
        }

        // Alternate split axis by depth; median split keeps the tree
        // balanced without surface-area heuristics.
        let axis_x = depth % 2 == 0;
        order.sort_by_key(|&i| {
            let c = self.leaves[i as usize].0.center();
            if axis_x {
                c.x.to_bits()
            } else {
                c.y.to_bits()
            }
        });
        let mid = order.len() / 2;
        let (lo, hi) = order.split_at_mut(mid);
        let left = self.build_range(lo, depth + 1);
        let right = self.build_range(hi, depth + 1);
        let bounds = Aabb::union(self.nodes[left as usize].bounds, self.nodes[right as usize].bounds);
        self.nodes.push(Node {
            bounds,
            left,
            right,
            leaf: false,
        });
        (self.nodes.len() - 1) as u32
    }

    /// Visit every staged leaf whose bounds overlap `query`.
    pub fn query(&self, query: Aabb, mut visit: impl FnMut(&Aabb, &T)) {
        if self.root == INVALID_NODE {
            return;
        }
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !node.bounds.overlaps(query) {
                continue;
            }
            if node.leaf {
                let (bounds, value) = &self.leaves[node.left as usize];
                visit(bounds, value);
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }
}
