//! Morton-code (Z-order) spatial indexing.
//!
//! World positions quantize to grid cells (raw Q coordinate shifted right
//! by [`GRID_BITS`]) and each axis is biased by `2^15` so the sign lands in
//! the top bit of its 16-bit lane. Interleaving the lanes puts those two
//! sign bits at the top of the 32-bit code -- the quadrant tag -- and gives
//! nearby cells nearby codes, so a sorted-by-code entity array serves range
//! queries with one binary search per range.
//!
//! [`morton_query`] decomposes a query AABB into code intervals by quadtree
//! descent. When the interval budget runs out, a partially covered node is
//! emitted whole: the decomposition trades range count for false positives,
//! which is sound for a broad phase that is always followed by exact
//! narrow-phase tests. It never produces false negatives.

use phoenix_fixed::{Distance, Vec2};

use crate::containers::FixedVec;

/// Right-shift applied to raw Q12 coordinates to get a grid cell
/// (2^13 raw = 2 world units per cell).
pub const GRID_BITS: u32 = 13;

/// Default cap on intervals produced by one query.
pub const MAX_QUERY_RANGES: usize = 16;

/// An interleaved Z-order code.
pub type MortonCode = u32;

/// An inclusive code interval.
pub type MortonRange = (MortonCode, MortonCode);

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Spread the bits of a 16-bit value over the even positions of a u32.
#[inline]
const fn spread16(v: u16) -> u32 {
    let mut x = v as u32;
    x = (x | (x << 8)) & 0x00ff_00ff;
    x = (x | (x << 4)) & 0x0f0f_0f0f;
    x = (x | (x << 2)) & 0x3333_3333;
    x = (x | (x << 1)) & 0x5555_5555;
    x
}

/// Bias a signed grid coordinate into a 16-bit lane.
#[inline]
const fn bias(cell: i32) -> u16 {
    (cell + 0x8000) as u16
}

/// The grid cell of a raw Q12 coordinate.
#[inline]
pub const fn grid_cell(raw: i32) -> i32 {
    raw >> GRID_BITS
}

/// Morton code of a pair of biased 16-bit cells.
#[inline]
pub const fn encode_cells(x: u16, y: u16) -> MortonCode {
    spread16(x) | (spread16(y) << 1)
}

/// Morton code of a world position.
pub fn morton_code(position: Vec2) -> MortonCode {
    let cx = bias(grid_cell(position.x.to_bits()));
    let cy = bias(grid_cell(position.y.to_bits()));
    encode_cells(cx, cy)
}

// ---------------------------------------------------------------------------
// AABB query
// ---------------------------------------------------------------------------

/// A query rectangle in biased grid cells, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MortonAabb {
    pub min_x: u16,
    pub min_y: u16,
    pub max_x: u16,
    pub max_y: u16,
}

/// The grid-cell AABB covering a circle at `center` with `radius`.
pub fn to_morton_aabb(center: Vec2, radius: Distance) -> MortonAabb {
    let r = radius.abs().to_bits();
    let min_x = grid_cell(center.x.to_bits() - r);
    let max_x = grid_cell(center.x.to_bits() + r);
    let min_y = grid_cell(center.y.to_bits() - r);
    let max_y = grid_cell(center.y.to_bits() + r);
    MortonAabb {
        min_x: bias(min_x),
        min_y: bias(min_y),
        max_x: bias(max_x),
        max_y: bias(max_y),
    }
}

/// Decompose `aabb` into at most `ranges.capacity()` inclusive code
/// intervals whose union covers every cell of the AABB.
pub fn morton_query(aabb: MortonAabb, ranges: &mut FixedVec<MortonRange>) {
    ranges.clear();
    if !descend(aabb, 0, 0, 16, ranges) {
        // Budget overflow: fall back to the single bounding interval.
        // `encode_cells` is monotone per axis, so every cell of the rect
        // codes between its min and max corners -- maximal false positives,
        // zero false negatives.
        ranges.clear();
        ranges.push((
            encode_cells(aabb.min_x, aabb.min_y),
            encode_cells(aabb.max_x, aabb.max_y),
        ));
        return;
    }

    // Coalesce intervals the descent emitted back-to-back.
    let slice = ranges.as_mut_slice();
    let mut write = 0;
    for read in 1..slice.len() {
        if slice[read].0 <= slice[write].1.wrapping_add(1) && slice[write].1 != u32::MAX {
            slice[write].1 = slice[write].1.max(slice[read].1);
        } else {
            write += 1;
            slice[write] = slice[read];
        }
    }
    let len = if slice.is_empty() { 0 } else { write + 1 };
    while ranges.len() > len {
        ranges.pop();
    }
}

/// Recursive quadtree descent. A node is a square of `2^level` cells on a
/// side at biased origin `(x0, y0)`; its codes form one contiguous block.
/// Returns `false` if the output ran out of capacity.
fn descend(query: MortonAabb, x0: u32, y0: u32, level: u32, out: &mut FixedVec<MortonRange>) -> bool {
    let size = 1u32 << level;
    let node_max_x = x0 + size - 1;
    let node_max_y = y0 + size - 1;

    // Reject: no overlap with the query rect.
    if x0 > query.max_x as u32
        || node_max_x < query.min_x as u32
        || y0 > query.max_y as u32
        || node_max_y < query.min_y as u32
    {
        return true;
    }

    let base = encode_cells(x0 as u16, y0 as u16);
    let count = 1u64 << (2 * level);
    let node_range = (base, (base as u64 + count - 1) as u32);

    // Accept: node fully inside the query rect.
    let inside = x0 >= query.min_x as u32
        && node_max_x <= query.max_x as u32
        && y0 >= query.min_y as u32
        && node_max_y <= query.max_y as u32;

    // With the budget nearly spent (or at cell level) emit the whole node;
    // the extra cells are false positives the narrow phase filters out.
    if inside || level == 0 || out.len() + 4 > out.capacity() {
        return out.push(node_range);
    }

    // Recurse the four children in code order.
    let half = size / 2;
    descend(query, x0, y0, level - 1, out)
        && descend(query, x0 + half, y0, level - 1, out)
        && descend(query, x0, y0 + half, level - 1, out)
        && descend(query, x0 + half, y0 + half, level - 1, out)
}

// ---------------------------------------------------------------------------
// Range walking
// ---------------------------------------------------------------------------

/// Visit each element of a code-sorted slice whose code falls in one of the
/// ranges: one lower-bound per range, then a forward walk. The visitor
/// returns `true` to stop early; the function reports whether it was
/// stopped.
pub fn for_each_in_ranges<T>(
    sorted: &[T],
    code_of: impl Fn(&T) -> MortonCode,
    ranges: &[MortonRange],
    mut visit: impl FnMut(&T) -> bool,
) -> bool {
    for &(lo, hi) in ranges {
        let start = sorted.partition_point(|item| code_of(item) < lo);
        for item in &sorted[start..] {
            if code_of(item) > hi {
                break;
            }
            if visit(item) {
                return true;
            }
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearby_cells_share_high_bits() {
        let a = morton_code(Vec2::from_int(0, 0));
        let b = morton_code(Vec2::from_int(1, 1));
        let far = morton_code(Vec2::from_int(10_000, 10_000));
        assert_eq!(a, b, "same 2-unit cell");
        assert_ne!(a, far);
    }

    #[test]
    fn negative_coordinates_encode_distinctly() {
        let codes = [
            morton_code(Vec2::from_int(-100, -100)),
            morton_code(Vec2::from_int(-100, 100)),
            morton_code(Vec2::from_int(100, -100)),
            morton_code(Vec2::from_int(100, 100)),
        ];
        // Each quadrant gets a distinct tag in the top interleaved bits.
        let mut unique = codes.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn spread_interleaves() {
        assert_eq!(spread16(0b11), 0b101);
        assert_eq!(encode_cells(0, 0b1), 0b10);
        assert_eq!(encode_cells(0b1, 0), 0b01);
        assert_eq!(encode_cells(0xffff, 0xffff), 0xffff_ffff);
    }

    #[test]
    fn query_covers_every_cell_in_aabb() {
        let aabb = MortonAabb {
            min_x: 0x8000,
            min_y: 0x8000,
            max_x: 0x8007,
            max_y: 0x8005,
        };
        let mut ranges = FixedVec::with_capacity(MAX_QUERY_RANGES);
        morton_query(aabb, &mut ranges);
        assert!(!ranges.is_empty());

        // Soundness: every cell in the AABB is inside some range.
        for x in aabb.min_x..=aabb.max_x {
            for y in aabb.min_y..=aabb.max_y {
                let code = encode_cells(x, y);
                assert!(
                    ranges.iter().any(|&(lo, hi)| code >= lo && code <= hi),
                    "cell ({x:#x},{y:#x}) missing from ranges"
                );
            }
        }
    }

    #[test]
    fn tight_budget_still_covers() {
        let aabb = MortonAabb {
            min_x: 0x7ffa,
            min_y: 0x7ff9,
            max_x: 0x8011,
            max_y: 0x800e,
        };
        // Force coarse emission with a tiny budget.
        let mut ranges = FixedVec::with_capacity(2);
        morton_query(aabb, &mut ranges);
        for x in aabb.min_x..=aabb.max_x {
            for y in aabb.min_y..=aabb.max_y {
                let code = encode_cells(x, y);
                assert!(ranges.iter().any(|&(lo, hi)| code >= lo && code <= hi));
            }
        }
    }

    #[test]
    fn range_walk_visits_members_in_order() {
        let mut items: Vec<u32> = (0..64).map(|i| i * 3).collect();
        items.sort_unstable();
        let ranges = [(10u32, 30u32), (60, 72)];
        let mut seen = Vec::new();
        let stopped = for_each_in_ranges(&items, |&c| c, &ranges, |&c| {
            seen.push(c);
            false
        });
        assert!(!stopped);
        assert_eq!(seen, vec![12, 15, 18, 21, 24, 27, 30, 60, 63, 66, 69, 72]);
    }

    #[test]
    fn range_walk_early_exit() {
        let items: Vec<u32> = (0..100).collect();
        let mut count = 0;
        let stopped = for_each_in_ranges(&items, |&c| c, &[(0, 99)], |_| {
            count += 1;
            count == 5
        });
        assert!(stopped);
        assert_eq!(count, 5);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decomposition_is_sound(
                cx in -500i32..500,
                cy in -500i32..500,
                r in 1i32..64,
            ) {
                let center = Vec2::from_int(cx, cy);
                let radius = Distance::from_int(r);
                let aabb = to_morton_aabb(center, radius);
                let mut ranges = FixedVec::with_capacity(MAX_QUERY_RANGES);
                morton_query(aabb, &mut ranges);

                // Any position inside the circle must fall into a range.
                for (dx, dy) in [(0, 0), (r - 1, 0), (0, r - 1), (-(r - 1), 0), (0, -(r - 1))] {
                    let p = center + Vec2::from_int(dx, dy);
                    let code = morton_code(p);
                    prop_assert!(
                        ranges.iter().any(|&(lo, hi)| code >= lo && code <= hi),
                        "position inside query circle missed by ranges"
                    );
                }
            }
        }
    }
}
