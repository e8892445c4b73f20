// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::{Block, Layout};

/// Compile-time facts about an allocator, mirrored by every leaf and
/// combinator in this crate as an associated const.
///
/// `is_fallible` and `is_nothrow_fallible` are linked: an allocator
/// that is not fallible cannot be nothrow-fallible (failure there means
/// "aborts instead", which is not a kind of returning-failure), and
/// `is_nothrow_fallible` implies `is_fallible`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocatorInfo {
    /// `allocate`/`deallocate` may be called from multiple threads
    /// concurrently without external synchronization.
    pub is_thread_safe: bool,
    /// `allocate` can fail, by some channel (null block or a language
    /// fault), rather than only aborting the process.
    pub is_fallible: bool,
    /// A failed `allocate` returns the null block rather than faulting.
    pub is_nothrow_fallible: bool,
    /// `allocate(L)` always returns a block whose size is exactly
    /// `L.size` (never rounded up for bookkeeping).
    pub returns_exact_size: bool,
    /// The alignment every block satisfies, regardless of what was
    /// requested (the allocator's own buffer/page alignment).
    pub alignment: usize,
}

impl AllocatorInfo {
    /// # Panics
    /// Panics (via [`colt_contracts::invariant!`]) if the flag
    /// combination is inconsistent: `is_nothrow_fallible` without
    /// `is_fallible`.
    #[must_use]
    pub fn check(self) -> Self {
        colt_contracts::invariant!(
            !self.is_nothrow_fallible || self.is_fallible,
            "is_nothrow_fallible implies is_fallible"
        );
        self
    }
}

/// The allocator contract: compile-time [`AllocatorInfo`], `allocate`,
/// `deallocate`, and an optional `owns` capability (see [`OwningAllocator`]).
///
/// Implementors whose `AllocatorInfo::is_fallible` is `false` must
/// never return [`Block::null`] from `allocate`; they call into
/// [`colt_contracts::alloc_failure`] instead.
pub trait Allocator {
    const INFO: AllocatorInfo;

    fn allocate(&self, layout: Layout) -> Block;
    fn deallocate(&self, block: Block);
}

/// An allocator that can additionally answer whether a given block
/// belongs to it. Not every allocator can (e.g. a bare system
/// allocator delegating to `malloc` cannot, in general), so this is a
/// separate, optional capability.
pub trait OwningAllocator: Allocator {
    fn owns(&self, block: Block) -> bool;
}
