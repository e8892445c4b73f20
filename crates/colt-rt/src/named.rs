// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Named (struct-like) types: an ordered member list, a size/align/
//! lifetime triple, and an optional [`PerfectHash`] for fast member
//! lookup. [`LayoutPolicy`] controls how member offsets are computed
//! when the caller doesn't supply them explicitly.

use crate::phf::PerfectHash;
use crate::types::{Lifetime, LifetimeBits, TypeId};

/// One field of a [`NamedType`].
#[derive(Clone)]
pub struct Member {
    pub name: String,
    pub name_hash: u64,
    pub description: String,
    pub type_id: TypeId,
    pub offset: usize,
}

/// How [`crate::context::RuntimeContext::create_named_computed`] turns
/// member infos into offsets.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LayoutPolicy {
    /// Members in declaration order, padded to each member's own
    /// alignment; final size rounded up to the struct's alignment.
    AsDeclared,
    /// Greedy: at each step, place whichever remaining member incurs
    /// the least padding at the current offset. Ties break by larger
    /// alignment, then larger size, then lower declared index. Not
    /// guaranteed optimal, but cheap and usually close.
    OptimizeSizeFast,
}

/// Input to layout computation: a member's shape, without a
/// predetermined offset.
#[derive(Clone)]
pub struct MemberInfo {
    pub name: String,
    pub description: String,
    pub type_id: TypeId,
    pub size: usize,
    pub align: usize,
}

const fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Computes (offsets in input order, total size, total alignment).
#[must_use]
pub fn compute_layout(policy: LayoutPolicy, members: &[MemberInfo]) -> (Vec<usize>, usize, usize) {
    match policy {
        LayoutPolicy::AsDeclared => layout_as_declared(members),
        LayoutPolicy::OptimizeSizeFast => layout_optimize_size_fast(members),
    }
}

fn layout_as_declared(members: &[MemberInfo]) -> (Vec<usize>, usize, usize) {
    let mut offsets = Vec::with_capacity(members.len());
    let mut offset = 0usize;
    let mut struct_align = 1usize;
    for m in members {
        offset = align_up(offset, m.align);
        offsets.push(offset);
        offset += m.size;
        struct_align = struct_align.max(m.align);
    }
    (offsets, align_up(offset, struct_align), struct_align)
}

fn layout_optimize_size_fast(members: &[MemberInfo]) -> (Vec<usize>, usize, usize) {
    let mut offsets = vec![0usize; members.len()];
    let mut placed = vec![false; members.len()];
    let mut offset = 0usize;
    let mut struct_align = 1usize;

    for _ in 0..members.len() {
        let mut best: Option<usize> = None;
        for (idx, m) in members.iter().enumerate() {
            if placed[idx] {
                continue;
            }
            let candidate_offset = align_up(offset, m.align);
            let padding = candidate_offset - offset;
            best = Some(match best {
                None => idx,
                Some(current) => {
                    let c = &members[current];
                    let c_offset = align_up(offset, c.align);
                    let c_padding = c_offset - offset;
                    if padding < c_padding
                        || (padding == c_padding && m.align > c.align)
                        || (padding == c_padding && m.align == c.align && m.size > c.size)
                    {
                        idx
                    } else {
                        current
                    }
                }
            });
        }
        let idx = best.expect("at least one member remains unplaced");
        let m = &members[idx];
        let candidate_offset = align_up(offset, m.align);
        offsets[idx] = candidate_offset;
        placed[idx] = true;
        offset = candidate_offset + m.size;
        struct_align = struct_align.max(m.align);
    }

    (offsets, align_up(offset, struct_align), struct_align)
}

/// Combines member lifetimes per the aggregation rule: trivially X iff
/// every member is trivially X; X-capable iff every member is
/// trivially X or provides an X function.
#[must_use]
pub fn aggregate_lifetime(member_lifetimes: &[Lifetime]) -> LifetimeBits {
    let mut bits = LifetimeBits::TRIVIAL;
    for lt in member_lifetimes {
        bits.trivially_movable &= lt.bits.trivially_movable;
        bits.trivially_copyable &= lt.bits.trivially_copyable;
        bits.trivially_destructible &= lt.bits.trivially_destructible;
    }
    bits
}

/// A struct-like named type: members, size/align, lifetime, and an
/// optional perfect-hash-function instance for `lookup_fast`.
pub struct NamedType {
    pub name: String,
    pub size: usize,
    pub align: usize,
    pub lifetime: Lifetime,
    pub members: Vec<Member>,
    pub phf: Option<Box<dyn PerfectHash>>,
}

impl NamedType {
    /// Finds a member by exact name match (memcmp-equivalent), used by
    /// the false-positive-free `lookup` tier.
    #[must_use]
    pub fn member_by_name(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Applies the PHF (if present) to `name` and returns the member
    /// at that index without comparing the name, matching
    /// `lookup_fast`'s false-positive-on-collision contract.
    #[must_use]
    pub fn member_by_phf(&self, name: &str) -> Option<&Member> {
        let phf = self.phf.as_ref()?;
        let idx = phf.lookup(name.as_bytes()) as usize;
        self.members.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, size: usize, align: usize) -> MemberInfo {
        MemberInfo {
            name: name.to_string(),
            description: String::new(),
            type_id: TypeId(0),
            size,
            align,
        }
    }

    #[test]
    fn as_declared_pads_between_members() {
        let members = vec![info("a", 1, 1), info("b", 4, 4), info("c", 1, 1)];
        let (offsets, size, align) = compute_layout(LayoutPolicy::AsDeclared, &members);
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(size, 12);
        assert_eq!(align, 4);
    }

    #[test]
    fn optimize_size_fast_reduces_padding() {
        let members = vec![info("a", 1, 1), info("b", 4, 4), info("c", 1, 1)];
        let (offsets, size, _align) = compute_layout(LayoutPolicy::OptimizeSizeFast, &members);
        // `b` (align 4) placed first at 0, then the two byte members
        // pack at 4 and 5 with no padding, rounding to align 4 => size 8.
        assert_eq!(offsets[1], 0);
        assert_eq!(size, 8);
    }

    #[test]
    fn aggregate_lifetime_is_trivial_only_if_all_members_are() {
        let all_trivial = [Lifetime::trivial(), Lifetime::trivial()];
        assert_eq!(aggregate_lifetime(&all_trivial), LifetimeBits::TRIVIAL);

        let mut non_trivial = Lifetime::trivial();
        non_trivial.bits.trivially_movable = false;
        let mixed = [Lifetime::trivial(), non_trivial];
        assert!(!aggregate_lifetime(&mixed).trivially_movable);
    }
}
