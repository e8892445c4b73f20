// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{align_up, Allocator, AllocatorInfo, Block, Layout, OwningAllocator};

/// The thread-safe twin of [`crate::StackAllocator`]: the water mark is
/// an [`AtomicUsize`], `allocate` advances it with a CAS retry loop,
/// and `deallocate` only retreats it with a CAS that succeeds solely
/// when the freed block is still topmost at the moment of the CAS.
/// Under contention a block that *was* topmost when `deallocate` was
/// called may lose the race and leak instead of retreating; this
/// mirrors the single-threaded variant's "non-topmost leaks" rule,
/// generalized to "anything that stops being topmost mid-call leaks."
pub struct StackAllocatorMT<const SIZE: usize, const ALIGN: usize> {
    buffer: UnsafeCell<MaybeUninit<[u8; SIZE]>>,
    water: AtomicUsize,
}

// SAFETY: all mutable access to `buffer` goes through the atomic
// `water` high-water mark with CAS-guarded bounds checks below, so
// concurrent `allocate`/`deallocate` calls never hand out overlapping
// regions of the buffer.
unsafe impl<const SIZE: usize, const ALIGN: usize> Sync for StackAllocatorMT<SIZE, ALIGN> {}
unsafe impl<const SIZE: usize, const ALIGN: usize> Send for StackAllocatorMT<SIZE, ALIGN> {}

impl<const SIZE: usize, const ALIGN: usize> StackAllocatorMT<SIZE, ALIGN> {
    #[must_use]
    pub fn new() -> Self {
        colt_contracts::invariant!(crate::is_power_of_2(ALIGN), "ALIGN must be a power of two");
        StackAllocatorMT {
            buffer: UnsafeCell::new(MaybeUninit::uninit()),
            water: AtomicUsize::new(0),
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

    /// Resets the water mark to zero.
    ///
    /// # Safety
    /// The caller asserts no outstanding block from this allocator is
    /// still in use.
    pub unsafe fn deallocate_all(&self) {
        self.water.store(0, Ordering::Release);
    }
}

impl<const SIZE: usize, const ALIGN: usize> Default for StackAllocatorMT<SIZE, ALIGN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize, const ALIGN: usize> Allocator for StackAllocatorMT<SIZE, ALIGN> {
    const INFO: AllocatorInfo = AllocatorInfo {
        is_thread_safe: true,
        is_fallible: true,
        is_nothrow_fallible: true,
        returns_exact_size: true,
        alignment: ALIGN,
    };

    fn allocate(&self, request: Layout) -> Block {
        if request.align() > ALIGN {
            return Block::null();
        }
        let size = align_up(request.size(), ALIGN);
        let usable = self.usable_size();
        let mut old = self.water.load(Ordering::Relaxed);
        loop {
            if old + size > usable {
                return Block::null();
            }
            match self.water.compare_exchange_weak(
                old,
                old + size,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    // SAFETY: the successful CAS reserved `[old, old+size)`
                    // exclusively; no other call can claim this range.
                    let ptr = unsafe { self.base_ptr().add(old) };
                    return Block::new(ptr, request.size());
                }
                Err(observed) => old = observed,
            }
        }
    }

    fn deallocate(&self, block: Block) {
        if block.is_null() {
            return;
        }
        let size = align_up(block.size(), ALIGN);
        let mut old = self.water.load(Ordering::Relaxed);
        loop {
            // SAFETY: `base_ptr() + old` is always in-bounds or
            // one-past-the-end, the same invariant `allocate` upholds.
            let top = unsafe { self.base_ptr().add(old) };
            // SAFETY: `block.ptr()` came from a prior successful `allocate`.
            let block_end = unsafe { block.ptr().add(block.size()) };
            if block_end != top {
                return; // no longer topmost: leak until `deallocate_all`.
            }
            match self.water.compare_exchange_weak(
                old,
                old - size,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => old = observed,
            }
        }
    }
}

impl<const SIZE: usize, const ALIGN: usize> OwningAllocator for StackAllocatorMT<SIZE, ALIGN> {
    fn owns(&self, block: Block) -> bool {
        if block.is_null() {
            return false;
        }
        let base = self.base_ptr();
        let water = self.water.load(Ordering::Acquire);
        // SAFETY: `base + water` is in-bounds or one-past-the-end.
        let end = unsafe { base.add(water) };
        (base..end).contains(&block.ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_allocations_never_overlap() {
        let alloc: Arc<StackAllocatorMT<4096, 8>> = Arc::new(StackAllocatorMT::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let alloc = alloc.clone();
            handles.push(thread::spawn(move || {
                let mut blocks = Vec::new();
                for _ in 0..16 {
                    let blk = alloc.allocate(Layout::new(16, 8));
                    if !blk.is_null() {
                        blocks.push(blk);
                    }
                }
                blocks
            }));
        }
        let mut all = Vec::new();
        for h in handles {
            all.extend(h.join().unwrap());
        }
        all.sort_by_key(Block::ptr);
        for pair in all.windows(2) {
            // SAFETY: `pair[0]` is a real allocation from this test; its
            // size never walks past the 4096-byte backing buffer.
            let end = unsafe { pair[0].ptr().add(pair[0].size()) };
            assert!(end <= pair[1].ptr(), "allocations overlapped");
        }
    }

    #[test]
    fn allocations_are_align_aligned() {
        let alloc: StackAllocatorMT<256, 16> = StackAllocatorMT::new();
        let a = alloc.allocate(Layout::new(3, 1));
        let b = alloc.allocate(Layout::new(16, 8));
        assert_eq!(a.ptr() as usize % 16, 0);
        assert_eq!(b.ptr() as usize % 16, 0);
    }

    #[test]
    fn topmost_deallocate_retreats() {
        let alloc: StackAllocatorMT<256, 8> = StackAllocatorMT::new();
        let a = alloc.allocate(Layout::new(16, 8));
        alloc.deallocate(a);
        let b = alloc.allocate(Layout::new(16, 8));
        assert_eq!(a.ptr(), b.ptr());
    }
}
