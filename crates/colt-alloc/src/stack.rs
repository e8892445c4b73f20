// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

use crate::{align_up, Allocator, AllocatorInfo, Block, Layout, OwningAllocator};

/// A bump allocator over a fixed-size inline buffer of `SIZE` bytes
/// aligned to `ALIGN`. `allocate` only ever grows a high-water mark;
/// `deallocate` only retreats it when the freed block is exactly the
/// most recent allocation (LIFO), otherwise it is accepted silently
/// and the memory stays claimed until [`StackAllocator::deallocate_all`].
///
/// Not thread-safe; see [`crate::StackAllocatorMT`] for the atomic
/// variant.
pub struct StackAllocator<const SIZE: usize, const ALIGN: usize> {
    buffer: UnsafeCell<MaybeUninit<[u8; SIZE]>>,
    water: UnsafeCell<usize>,
}

// SAFETY: `StackAllocator` has no internal synchronization and is
// `!Sync`-by-default through `UnsafeCell`; we only assert `Send`,
// which is sound because the buffer and water mark move wholesale
// with the allocator and no aliasing outlives a single thread's
// exclusive access pattern of "one call at a time."
unsafe impl<const SIZE: usize, const ALIGN: usize> Send for StackAllocator<SIZE, ALIGN> {}

impl<const SIZE: usize, const ALIGN: usize> StackAllocator<SIZE, ALIGN> {
    #[must_use]
    pub fn new() -> Self {
        colt_contracts::invariant!(crate::is_power_of_2(ALIGN), "ALIGN must be a power of two");
        StackAllocator {
            buffer: UnsafeCell::new(MaybeUninit::uninit()),
            water: UnsafeCell::new(0),
        }
    }

    /// The backing array itself is only byte-aligned; this returns the
    /// first `ALIGN`-aligned address within it and how many leading
    /// bytes that skipped. Recomputed from the buffer's live address on
    /// every call rather than cached, since a moved allocator's buffer
    /// address changes.
    fn aligned_base(&self) -> (*mut u8, usize) {
        let raw = self.buffer.get().cast::<u8>();
        let addr = raw as usize;
        let offset = align_up(addr, ALIGN) - addr;
        // SAFETY: `offset < ALIGN`, and `usable_size` below never lets
        // `allocate` hand out anything past `SIZE - offset` bytes from
        // here, so this stays within `buffer` or one past its end.
        (unsafe { raw.add(offset) }, offset)
    }

    fn base_ptr(&self) -> *mut u8 {
        self.aligned_base().0
    }

    /// Bytes actually available for allocation once the leading
    /// padding needed to align the buffer's start to `ALIGN` is
    /// subtracted.
    fn usable_size(&self) -> usize {
        let (_, offset) = self.aligned_base();
        SIZE.saturating_sub(offset)
    }

    /// Resets the water mark to zero, making the whole buffer
    /// available again.
    ///
    /// # Safety
    /// The caller asserts that no outstanding block returned by this
    /// allocator is still in use; resetting invalidates all of them.
    pub unsafe fn deallocate_all(&self) {
        // SAFETY: exclusive access is the caller's obligation per the
        // safety comment on this function.
        unsafe {
            *self.water.get() = 0;
        }
    }
}

impl<const SIZE: usize, const ALIGN: usize> Default for StackAllocator<SIZE, ALIGN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize, const ALIGN: usize> Allocator for StackAllocator<SIZE, ALIGN> {
    const INFO: AllocatorInfo = AllocatorInfo {
        is_thread_safe: false,
        is_fallible: true,
        is_nothrow_fallible: true,
        returns_exact_size: true,
        alignment: ALIGN,
    };

    fn allocate(&self, request: Layout) -> Block {
        if request.align() > ALIGN {
            return Block::null();
        }
        // SAFETY: single accessor at a time (see type-level safety note).
        let water = unsafe { *self.water.get() };
        let size = align_up(request.size(), ALIGN);
        if water + size > self.usable_size() {
            return Block::null();
        }
        // SAFETY: `water + size <= SIZE`, so this stays in bounds of `buffer`.
        let ptr = unsafe { self.base_ptr().add(water) };
        // SAFETY: sole accessor; see type-level safety note.
        unsafe {
            *self.water.get() = water + size;
        }
        Block::new(ptr, request.size())
    }

    fn deallocate(&self, block: Block) {
        if block.is_null() {
            return;
        }
        // SAFETY: sole accessor; see type-level safety note.
        let water = unsafe { *self.water.get() };
        // SAFETY: `base_ptr()` plus `water` is always in-bounds or
        // one-past-the-end of `buffer`, same invariant `allocate` keeps.
        let top = unsafe { self.base_ptr().add(water) };
        // SAFETY: `block.ptr()` was produced by a prior `allocate` call
        // within `buffer`'s bounds (or is null, handled above).
        let block_end = unsafe { block.ptr().add(block.size()) };
        if block_end == top {
            // SAFETY: sole accessor; see type-level safety note.
            unsafe {
                *self.water.get() = water - align_up(block.size(), ALIGN);
            }
        }
        // Not the topmost block: silently leak until `deallocate_all`.
    }
}

impl<const SIZE: usize, const ALIGN: usize> OwningAllocator for StackAllocator<SIZE, ALIGN> {
    fn owns(&self, block: Block) -> bool {
        if block.is_null() {
            return false;
        }
        let base = self.base_ptr();
        // SAFETY: sole accessor; see type-level safety note.
        let water = unsafe { *self.water.get() };
        // SAFETY: `base` plus `water` is always in-bounds or
        // one-past-the-end of `buffer`.
        let end = unsafe { base.add(water) };
        (base..end).contains(&block.ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_allocates_sequentially() {
        let alloc: StackAllocator<256, 8> = StackAllocator::new();
        let a = alloc.allocate(Layout::new(16, 8));
        let b = alloc.allocate(Layout::new(16, 8));
        assert!(!a.is_null());
        assert!(!b.is_null());
        assert_eq!(b.ptr() as usize - a.ptr() as usize, 16);
    }

    #[test]
    fn overflow_returns_null() {
        let alloc: StackAllocator<16, 8> = StackAllocator::new();
        assert!(!alloc.allocate(Layout::new(16, 8)).is_null());
        assert!(alloc.allocate(Layout::new(1, 8)).is_null());
    }

    #[test]
    fn over_aligned_request_rejected() {
        let alloc: StackAllocator<256, 8> = StackAllocator::new();
        assert!(alloc.allocate(Layout::new(8, 16)).is_null());
    }

    #[test]
    fn lifo_deallocate_retreats_water() {
        let alloc: StackAllocator<256, 8> = StackAllocator::new();
        let a = alloc.allocate(Layout::new(16, 8));
        let b = alloc.allocate(Layout::new(16, 8));
        alloc.deallocate(b);
        // the freed slot is reusable now that water retreated
        let c = alloc.allocate(Layout::new(16, 8));
        assert_eq!(c.ptr(), b.ptr());
        let _ = a;
    }

    #[test]
    fn non_topmost_deallocate_leaks() {
        let alloc: StackAllocator<256, 8> = StackAllocator::new();
        let a = alloc.allocate(Layout::new(16, 8));
        let _b = alloc.allocate(Layout::new(16, 8));
        alloc.deallocate(a); // not topmost, silently retained
        let c = alloc.allocate(Layout::new(16, 8));
        assert_ne!(c.ptr(), a.ptr());
    }

    #[test]
    fn allocations_are_align_aligned() {
        let alloc: StackAllocator<256, 16> = StackAllocator::new();
        let a = alloc.allocate(Layout::new(3, 1));
        let b = alloc.allocate(Layout::new(16, 8));
        assert_eq!(a.ptr() as usize % 16, 0);
        assert_eq!(b.ptr() as usize % 16, 0);
    }

    #[test]
    fn owns_tracks_water() {
        let alloc: StackAllocator<256, 8> = StackAllocator::new();
        let a = alloc.allocate(Layout::new(16, 8));
        assert!(alloc.owns(a));
        // SAFETY: test-local allocator, no outstanding use.
        unsafe { alloc.deallocate_all() };
        assert!(!alloc.owns(a));
    }
}
