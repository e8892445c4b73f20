// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::cell::UnsafeCell;
use core::ptr;

use crate::{Allocator, AllocatorInfo, Block, Layout, OwningAllocator};

/// Fit policy used when more than one cached block satisfies a
/// request's size/tolerance window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitPolicy {
    /// Stop at the first acceptable candidate.
    FirstFit,
    /// Scan the whole list and take the smallest acceptable candidate.
    BestFit,
}

#[repr(C)]
struct Node {
    size: usize,
    next: *mut Node,
}

/// Caches deallocated blocks whose size falls in `[MIN_BLOCK,
/// MAX_BLOCK]` instead of immediately returning them to `A`, so that
/// future same-shaped allocations can be satisfied without touching
/// the wrapped allocator.
///
/// `MAX_FREE_LIST` bounds how many blocks are cached at once (`None`
/// for unbounded); `tolerance_percent` allows reusing a cached block up
/// to that percentage oversized rather than requiring an exact match
/// (`0` forces an exact match, which in turn requires `A` to report
/// `returns_exact_size`).
///
/// # Panics
/// Constructing with `MIN_BLOCK < size_of::<Node>()`, `MAX_BLOCK <
/// MIN_BLOCK`, `A::INFO.alignment < align_of::<Node>()`, or
/// `tolerance_percent == 0` while `!A::INFO.returns_exact_size` all
/// panic via [`colt_contracts::invariant!`].
pub struct FreeListAllocator<A, const MIN_BLOCK: usize, const MAX_BLOCK: usize> {
    inner: A,
    head: UnsafeCell<*mut Node>,
    len: UnsafeCell<usize>,
    max_len: Option<usize>,
    tolerance_percent: u32,
    fit: FitPolicy,
}

// SAFETY: like `StackAllocator`, all interior mutability here assumes
// single-accessor-at-a-time use; we only assert `Send`, propagated
// from the wrapped allocator.
unsafe impl<A: Send, const MIN_BLOCK: usize, const MAX_BLOCK: usize> Send
    for FreeListAllocator<A, MIN_BLOCK, MAX_BLOCK>
{
}

impl<A: Allocator, const MIN_BLOCK: usize, const MAX_BLOCK: usize>
    FreeListAllocator<A, MIN_BLOCK, MAX_BLOCK>
{
    #[must_use]
    pub fn new(inner: A, max_len: Option<usize>, tolerance_percent: u32, fit: FitPolicy) -> Self {
        colt_contracts::invariant!(
            MIN_BLOCK >= core::mem::size_of::<Node>(),
            "MIN_BLOCK must be at least as large as the free-list node header"
        );
        colt_contracts::invariant!(MAX_BLOCK >= MIN_BLOCK, "MAX_BLOCK must be >= MIN_BLOCK");
        colt_contracts::invariant!(
            A::INFO.alignment >= core::mem::align_of::<Node>(),
            "wrapped allocator's alignment must cover the free-list node header"
        );
        colt_contracts::invariant!(
            tolerance_percent != 0 || A::INFO.returns_exact_size,
            "tolerance_percent == 0 requires the wrapped allocator to return exact sizes"
        );
        FreeListAllocator {
            inner,
            head: UnsafeCell::new(ptr::null_mut()),
            len: UnsafeCell::new(0),
            max_len,
            tolerance_percent,
            fit,
        }
    }

    fn is_block_valid(&self, block: Block) -> bool {
        let size_ok = (MIN_BLOCK..=MAX_BLOCK).contains(&block.size());
        let room_ok = match self.max_len {
            // SAFETY: sole accessor; see type-level safety note.
            Some(max) => unsafe { *self.len.get() } < max,
            None => true,
        };
        size_ok && room_ok
    }
}

impl<A: Allocator, const MIN_BLOCK: usize, const MAX_BLOCK: usize> Allocator
    for FreeListAllocator<A, MIN_BLOCK, MAX_BLOCK>
{
    const INFO: AllocatorInfo = AllocatorInfo {
        is_thread_safe: false,
        is_fallible: A::INFO.is_fallible,
        is_nothrow_fallible: A::INFO.is_nothrow_fallible,
        returns_exact_size: true,
        alignment: A::INFO.alignment,
    };

    fn allocate(&self, request: Layout) -> Block {
        let requested_size = request.size();
        if requested_size < MIN_BLOCK || requested_size > MAX_BLOCK {
            return self.inner.allocate(request);
        }
        // SAFETY: sole accessor; see type-level safety note.
        if unsafe { (*self.head.get()).is_null() } {
            return self.inner.allocate(request);
        }

        let exact_only = self.tolerance_percent == 0;
        let max_acceptable = requested_size + (requested_size * self.tolerance_percent as usize) / 100;

        let mut prev: *mut Node = ptr::null_mut();
        // SAFETY: sole accessor; see type-level safety note.
        let mut current = unsafe { *self.head.get() };
        let mut best_prev: *mut Node = ptr::null_mut();
        let mut best: *mut Node = ptr::null_mut();

        while !current.is_null() {
            // SAFETY: `current` is a live node in our own singly-linked
            // list, written by a prior `deallocate` call on this allocator.
            let cur_size = unsafe { (*current).size };
            let accept = if exact_only {
                cur_size == requested_size
            } else {
                cur_size >= requested_size && cur_size <= max_acceptable
            };
            if accept {
                let better = best.is_null() || {
                    // SAFETY: `best` is non-null here, same invariant as `current`.
                    unsafe { cur_size < (*best).size }
                };
                if better {
                    best = current;
                    best_prev = prev;
                    if exact_only || self.fit == FitPolicy::FirstFit {
                        break;
                    }
                }
            }
            prev = current;
            // SAFETY: `current` is a live node.
            current = unsafe { (*current).next };
        }

        if best.is_null() {
            return self.inner.allocate(request);
        }

        // SAFETY: `best` and `best_prev` (if non-null) are live nodes
        // from our list; unlink `best`.
        let next = unsafe { (*best).next };
        if best_prev.is_null() {
            // SAFETY: sole accessor.
            unsafe { *self.head.get() = next };
        } else {
            // SAFETY: `best_prev` is live.
            unsafe { (*best_prev).next = next };
        }
        if self.max_len.is_some() {
            // SAFETY: sole accessor.
            unsafe { *self.len.get() -= 1 };
        }

        // SAFETY: `best` is a valid, no-longer-linked node.
        let size = unsafe { (*best).size };
        Block::new(best.cast::<u8>(), size)
    }

    fn deallocate(&self, block: Block) {
        if block.is_null() {
            return;
        }
        if self.is_block_valid(block) {
            let node = block.ptr().cast::<Node>();
            // SAFETY: sole accessor; `block.ptr()` is a live allocation
            // at least `MIN_BLOCK >= size_of::<Node>()` bytes, suitably
            // aligned because `A::INFO.alignment >= align_of::<Node>()`.
            unsafe {
                node.write(Node {
                    size: block.size(),
                    next: *self.head.get(),
                });
                *self.head.get() = node;
            }
            if self.max_len.is_some() {
                // SAFETY: sole accessor.
                unsafe { *self.len.get() += 1 };
            }
        } else {
            self.inner.deallocate(block);
        }
    }
}

impl<A: Allocator, const MIN_BLOCK: usize, const MAX_BLOCK: usize> Drop
    for FreeListAllocator<A, MIN_BLOCK, MAX_BLOCK>
{
    fn drop(&mut self) {
        // SAFETY: `&mut self` guarantees no concurrent access.
        let mut current = unsafe { *self.head.get() };
        while !current.is_null() {
            // SAFETY: `current` is a live node owned by this list.
            let (size, next) = unsafe { ((*current).size, (*current).next) };
            self.inner.deallocate(Block::new(current.cast::<u8>(), size));
            current = next;
        }
    }
}

impl<A: OwningAllocator, const MIN_BLOCK: usize, const MAX_BLOCK: usize> OwningAllocator
    for FreeListAllocator<A, MIN_BLOCK, MAX_BLOCK>
{
    fn owns(&self, block: Block) -> bool {
        // Cached blocks still "belong" to the wrapped allocator by
        // this definition; we never hand out memory `A` didn't give us.
        self.inner.owns(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaves::System;

    #[test]
    fn reuses_exact_size_block() {
        let fl: FreeListAllocator<System, 64, 64> =
            FreeListAllocator::new(System, None, 0, FitPolicy::FirstFit);
        let a = fl.allocate(Layout::new(64, 8));
        fl.deallocate(a);
        let b = fl.allocate(Layout::new(64, 8));
        assert_eq!(a.ptr(), b.ptr());
    }

    #[test]
    fn out_of_range_size_forwards_to_inner() {
        let fl: FreeListAllocator<System, 64, 64> =
            FreeListAllocator::new(System, None, 0, FitPolicy::FirstFit);
        let a = fl.allocate(Layout::new(128, 8));
        assert!(!a.is_null());
        fl.deallocate(a);
        // 128 is outside [64,64], so this never touches the free list.
        let b = fl.allocate(Layout::new(128, 8));
        assert_ne!(a.ptr(), b.ptr());
        fl.deallocate(b);
    }

    #[test]
    fn tolerance_accepts_oversized_block() {
        let fl: FreeListAllocator<System, 64, 128> =
            FreeListAllocator::new(System, None, 50, FitPolicy::FirstFit);
        let a = fl.allocate(Layout::new(100, 8));
        fl.deallocate(a);
        // 80 is within [80, 80*1.5=120], and the cached 100-byte block qualifies.
        let b = fl.allocate(Layout::new(80, 8));
        assert_eq!(a.ptr(), b.ptr());
    }

    #[test]
    fn max_len_bounds_cache_size() {
        let fl: FreeListAllocator<System, 64, 64> =
            FreeListAllocator::new(System, Some(1), 0, FitPolicy::FirstFit);
        let a = fl.allocate(Layout::new(64, 8));
        let b = fl.allocate(Layout::new(64, 8));
        fl.deallocate(a); // cached, len == 1
        fl.deallocate(b); // list full, forwarded to System::deallocate
        let c = fl.allocate(Layout::new(64, 8));
        assert_eq!(c.ptr(), a.ptr());
    }
}
